use tracing::debug;

use super::finder::FinderCandidate;
use super::transform::Point;

// Corner assembly
//------------------------------------------------------------------------------

// Three finders labeled by their role in the symbol
#[derive(Debug, Clone)]
pub(crate) struct Corner {
    pub tl: Point,
    pub tr: Point,
    pub bl: Point,
    pub module_size: f64,
}

// Relative disagreement allowed between the two legs
pub(crate) const CORNER_SIDE_LENGTH_DEV: f64 = 0.3;

// Radians the legs may deviate from a right angle
pub(crate) const CORNER_RIGHT_ANGLE_DEV: f64 = 0.35;

impl Corner {
    pub fn top_leg(&self) -> f64 {
        self.tl.dist(&self.tr)
    }

    pub fn left_leg(&self) -> f64 {
        self.tl.dist(&self.bl)
    }
}

/// Tries every 3-subset of finders; the vertex with the widest enclosed
/// angle is top-left and the more horizontal leg points at top-right.
/// Subsets with unequal legs or a skewed angle are rejected.
pub(crate) fn assemble_corners(finders: &[FinderCandidate]) -> Vec<Corner> {
    let mut corners = Vec::new();

    let points: Vec<(Point, f64)> = finders
        .iter()
        .map(|f| (Point::new(f.center_col, f.center_row), f.module_size))
        .collect();

    for i in 0..points.len() {
        for j in i + 1..points.len() {
            for k in j + 1..points.len() {
                if let Some(corner) = label_triple([points[i], points[j], points[k]]) {
                    corners.push(corner);
                }
            }
        }
    }

    debug!(count = corners.len(), "corner triples assembled");
    corners
}

fn label_triple(triple: [(Point, f64); 3]) -> Option<Corner> {
    // Widest angle marks the corner vertex
    let tl_idx = (0..3)
        .max_by(|&a, &b| {
            let (o1, o2) = others(a);
            let (p1, p2) = others(b);
            let angle_a = angle(&triple[o1].0, &triple[a].0, &triple[o2].0);
            let angle_b = angle(&triple[p1].0, &triple[b].0, &triple[p2].0);
            angle_a.total_cmp(&angle_b)
        })
        .unwrap();

    let (a_idx, b_idx) = others(tl_idx);
    let tl = triple[tl_idx].0;
    let (a, b) = (triple[a_idx].0, triple[b_idx].0);

    // The more horizontal leg leads to the top-right finder
    let (tr, bl) =
        if (a.x - tl.x).abs() >= (a.y - tl.y).abs() { (a, b) } else { (b, a) };

    let top = tl.dist(&tr);
    let left = tl.dist(&bl);
    if (top - left).abs() / top.max(left) > CORNER_SIDE_LENGTH_DEV {
        return None;
    }

    let enclosed = angle(&tr, &tl, &bl);
    if (enclosed - std::f64::consts::FRAC_PI_2).abs() > CORNER_RIGHT_ANGLE_DEV {
        return None;
    }

    let module_size = (triple[0].1 + triple[1].1 + triple[2].1) / 3.0;
    Some(Corner { tl, tr, bl, module_size })
}

fn others(i: usize) -> (usize, usize) {
    match i {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

// Angle between BA and BC in radians
fn angle(a: &Point, b: &Point, c: &Point) -> f64 {
    let ab = (a.x - b.x, a.y - b.y);
    let cb = (c.x - b.x, c.y - b.y);

    let dot = ab.0 * cb.0 + ab.1 * cb.1;
    let mag_ab = (ab.0 * ab.0 + ab.1 * ab.1).sqrt();
    let mag_cb = (cb.0 * cb.0 + cb.1 * cb.1).sqrt();

    if mag_ab == 0.0 || mag_cb == 0.0 {
        return 0.0;
    }

    (dot / (mag_ab * mag_cb)).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod corner_tests {
    use super::{assemble_corners, Corner};
    use crate::reader::finder::FinderCandidate;

    fn candidate(col: f64, row: f64) -> FinderCandidate {
        FinderCandidate {
            center_row: row,
            center_col: col,
            span_start: col as u32,
            span_end: col as u32,
            module_size: 4.0,
            distance: 0.0,
        }
    }

    fn single(finders: &[FinderCandidate]) -> Corner {
        let corners = assemble_corners(finders);
        assert_eq!(corners.len(), 1);
        corners[0].clone()
    }

    #[test]
    fn test_axis_aligned_triple() {
        let corner = single(&[candidate(150.0, 30.0), candidate(30.0, 30.0), candidate(30.0, 150.0)]);
        assert_eq!((corner.tl.x, corner.tl.y), (30.0, 30.0));
        assert_eq!((corner.tr.x, corner.tr.y), (150.0, 30.0));
        assert_eq!((corner.bl.x, corner.bl.y), (30.0, 150.0));
    }

    #[test]
    fn test_rotated_triple() {
        // Rotated 30 degrees, right angle preserved
        let (sin, cos) = 30f64.to_radians().sin_cos();
        let rot = |x: f64, y: f64| (x * cos - y * sin, x * sin + y * cos);
        let (tlx, tly) = rot(0.0, 0.0);
        let (trx, try_) = rot(120.0, 0.0);
        let (blx, bly) = rot(0.0, 120.0);
        let corner = single(&[candidate(blx, bly), candidate(trx, try_), candidate(tlx, tly)]);
        assert!((corner.tl.x - tlx).abs() < 1e-9 && (corner.tl.y - tly).abs() < 1e-9);
        // The top leg stays the more horizontal one at this rotation
        assert!((corner.tr.x - trx).abs() < 1e-9 && (corner.tr.y - try_).abs() < 1e-9);
    }

    #[test]
    fn test_unequal_legs_rejected() {
        assert!(assemble_corners(&[
            candidate(30.0, 30.0),
            candidate(200.0, 30.0),
            candidate(30.0, 90.0),
        ])
        .is_empty());
    }

    #[test]
    fn test_skewed_angle_rejected() {
        assert!(assemble_corners(&[
            candidate(30.0, 30.0),
            candidate(150.0, 80.0),
            candidate(30.0, 150.0),
        ])
        .is_empty());
    }

    #[test]
    fn test_too_few_finders() {
        assert!(assemble_corners(&[candidate(30.0, 30.0), candidate(150.0, 30.0)]).is_empty());
    }
}
