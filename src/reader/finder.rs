use tracing::debug;

use super::binarize::BinaryImage;

// Run-length window scanner
//------------------------------------------------------------------------------

// Feeds pixels one at a time and reports every five-run window matching a
// dark-led signature. Positions are whatever axis the caller walks.
#[derive(Debug)]
pub(crate) struct RunScanner {
    ratios: [f64; 5],
    deviation: f64,
    runs: [u32; 6],
    prev: Option<bool>,
    flips: u32,
    pos: u32,
}

// A matched window: the pixel span of the middle run plus the estimated
// module size
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunMatch {
    pub mid_start: u32,
    pub mid_end: u32,
    pub module_size: f64,
}

impl RunMatch {
    pub fn center(&self) -> f64 {
        (self.mid_start + self.mid_end) as f64 / 2.0
    }
}

impl RunScanner {
    pub fn new(ratios: [f64; 5], deviation: f64) -> Self {
        Self { ratios, deviation, runs: [0; 6], prev: None, flips: 0, pos: 0 }
    }

    pub fn reset(&mut self) {
        self.runs[5] = 0;
        self.prev = None;
        self.flips = 0;
        self.pos = 0;
    }

    /// Advances one pixel; a window can only complete on a color flip.
    pub fn advance(&mut self, dark: bool) -> Option<RunMatch> {
        self.pos += 1;

        if self.prev == Some(dark) {
            self.runs[5] += 1;
            return None;
        }

        self.runs.rotate_left(1);
        self.runs[5] = 1;
        let was_first = self.prev.is_none();
        self.prev = Some(dark);
        self.flips += 1;

        // The window just closed ends on a dark run, so the new run is light
        if was_first || dark || !self.matches_signature() {
            return None;
        }

        let mid_len = self.runs[2];
        let mid_end = self.pos - 2 - self.runs[3] - self.runs[4];
        Some(RunMatch {
            mid_start: mid_end + 1 - mid_len,
            mid_end,
            module_size: self.window_module_size(),
        })
    }

    /// Flushes the trailing run at the end of a line.
    pub fn finish(&mut self) -> Option<RunMatch> {
        self.advance(!self.prev.unwrap_or(false))
    }

    fn window_module_size(&self) -> f64 {
        let total: u32 = self.runs[..5].iter().sum();
        total as f64 / self.ratios.iter().sum::<f64>()
    }

    fn matches_signature(&self) -> bool {
        if self.flips < 6 {
            return false;
        }

        let module = self.window_module_size();
        let tolerance = module * self.deviation;
        self.ratios
            .iter()
            .zip(self.runs[..5].iter())
            .all(|(&r, &run)| (run as f64 - r * module).abs() <= tolerance)
    }
}

// Finder candidate
//------------------------------------------------------------------------------

// Built by the horizontal scan, refined by the vertical scan, pruned during
// reconciliation
#[derive(Debug, Clone, Copy)]
pub(crate) struct FinderCandidate {
    pub center_row: f64,
    pub center_col: f64,
    pub span_start: u32,
    pub span_end: u32,
    pub module_size: f64,
    pub distance: f64,
}

pub(crate) const FINDER_RATIOS: [f64; 5] = [1.0, 1.0, 3.0, 1.0, 1.0];

pub(crate) const SIGNATURE_MAX_DEVIATION: f64 = 0.35;

// Locate finders
//------------------------------------------------------------------------------

/// Two-pass finder location: a horizontal 1:1:3:1:1 sweep proposes
/// candidates, a vertical sweep over the covered columns scores them, and
/// unconfirmed or duplicate candidates are dropped.
pub(crate) fn locate_finders(img: &BinaryImage) -> Vec<FinderCandidate> {
    let mut candidates = scan_rows(img);
    refine_columns(img, &mut candidates);

    let survivors: Vec<_> = candidates.into_iter().filter(|c| c.distance.is_finite()).collect();
    let finders = collapse_overlapping(survivors);
    debug!(count = finders.len(), "finder candidates located");
    finders
}

fn scan_rows(img: &BinaryImage) -> Vec<FinderCandidate> {
    let mut candidates = Vec::new();
    let mut scanner = RunScanner::new(FINDER_RATIOS, SIGNATURE_MAX_DEVIATION);

    for y in 0..img.h {
        scanner.reset();
        let mut push = |m: RunMatch| {
            candidates.push(FinderCandidate {
                center_row: y as f64,
                center_col: m.center(),
                span_start: m.mid_start,
                span_end: m.mid_end,
                module_size: m.module_size,
                distance: f64::INFINITY,
            });
        };
        for x in 0..img.w {
            if let Some(m) = scanner.advance(img.get(x, y).unwrap()) {
                push(m);
            }
        }
        // A symbol flush against the right edge still has to close its window
        if let Some(m) = scanner.finish() {
            push(m);
        }
    }
    candidates
}

fn refine_columns(img: &BinaryImage, candidates: &mut [FinderCandidate]) {
    // Columns worth scanning: those under some candidate's middle run
    let mut covered = vec![false; img.w as usize];
    for c in candidates.iter() {
        for x in c.span_start..=c.span_end.min(img.w - 1) {
            covered[x as usize] = true;
        }
    }

    let mut scanner = RunScanner::new(FINDER_RATIOS, SIGNATURE_MAX_DEVIATION);
    for x in 0..img.w {
        if !covered[x as usize] {
            continue;
        }

        scanner.reset();
        let mut score = |m: RunMatch| score_candidates(candidates, x, &m);
        for y in 0..img.h {
            if let Some(m) = scanner.advance(img.get(x, y).unwrap()) {
                score(m);
            }
        }
        if let Some(m) = scanner.finish() {
            score(m);
        }
    }
}

// Squared-difference match between a vertical hit and every overlapping
// horizontal candidate; each candidate keeps its best
fn score_candidates(candidates: &mut [FinderCandidate], x: u32, m: &RunMatch) {
    let vy = m.center();
    for c in candidates.iter_mut() {
        let overlaps_col = c.span_start <= x && x <= c.span_end;
        let overlaps_row = m.mid_start as f64 <= c.center_row && c.center_row <= m.mid_end as f64;
        if !overlaps_col || !overlaps_row {
            continue;
        }

        let dc = x as f64 - c.center_col;
        let dr = vy - c.center_row;
        let dm = m.module_size - c.module_size;
        let dist = dc * dc + dr * dr + dm * dm;
        if dist < c.distance {
            c.distance = dist;
            c.center_row = vy;
        }
    }
}

// Survivors within a couple of modules of a better-scored survivor are the
// same finder seen from different scan rows
fn collapse_overlapping(mut survivors: Vec<FinderCandidate>) -> Vec<FinderCandidate> {
    survivors.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let mut kept: Vec<FinderCandidate> = Vec::new();
    for c in survivors {
        let dup = kept.iter().any(|k| {
            let limit = 3.0 * k.module_size.min(c.module_size);
            (k.center_row - c.center_row).abs() < limit
                && (k.center_col - c.center_col).abs() < limit
        });
        if !dup {
            kept.push(c);
        }
    }
    kept
}


#[cfg(test)]
mod locate_finder_tests {
    use super::locate_finders;
    use crate::builder::QRBuilder;
    use crate::common::mask::MaskPattern;
    use crate::common::metadata::{ECLevel, Version};
    use crate::reader::binarize::BinaryImage;

    #[test]
    fn test_locate_finders_on_rendered_symbol() {
        let qr = QRBuilder::new(b"Hello, world!")
            .version(Version::new(4))
            .ec_level(ECLevel::L)
            .mask(MaskPattern::new(1))
            .build()
            .unwrap();
        let img = qr.render(10);
        let bin = BinaryImage::from_gray_image(&img).unwrap();

        let finders = locate_finders(&bin);
        assert!(finders.len() >= 3, "Expected at least the three corner finders: {finders:?}");

        // Centres at module 3.5 and 29.5 for v4, quiet zone 40
        let exp = [(74.5, 74.5), (334.5, 74.5), (74.5, 334.5)];
        for (ec, er) in exp {
            assert!(
                finders.iter().any(|f| (f.center_col - ec).abs() < 2.0
                    && (f.center_row - er).abs() < 2.0),
                "No finder near ({ec}, {er}): {finders:?}"
            );
        }
    }

    #[test]
    fn test_no_finders_in_noise_free_blank() {
        let mut img = image::GrayImage::from_pixel(64, 64, image::Luma([255]));
        img.put_pixel(10, 10, image::Luma([0]));
        let bin = BinaryImage::from_gray_image(&img).unwrap();
        assert!(locate_finders(&bin).is_empty());
    }
}
