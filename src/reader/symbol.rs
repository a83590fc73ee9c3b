use tracing::debug;

use super::binarize::BinaryImage;
use super::corner::Corner;
use super::transform::{Point, Transform};
use crate::builder::{Module, QR};
use crate::common::ec::rectify_info;
use crate::common::iter::EncRegionIter;
use crate::common::mask::MaskPattern;
use crate::common::metadata::{
    parse_format_info, Color, ECLevel, Version, FORMAT_ERROR_CAPACITY, FORMAT_INFOS,
    FORMAT_INFO_COORDS_MAIN, FORMAT_INFO_COORDS_SIDE, FORMAT_MASK, VERSION_ERROR_BIT_LEN,
    VERSION_ERROR_CAPACITY, VERSION_INFOS, VERSION_INFO_COORDS_BL, VERSION_INFO_COORDS_TR,
};
use crate::common::{BitStream, QRError, QRResult};

// Symbol
//------------------------------------------------------------------------------

// A located symbol: binary pixels, a module-to-pixel transform and the
// confirmed version. The function map classifies every module so sampling
// can tell data from fixed cells.
pub(crate) struct Symbol<'a> {
    img: &'a BinaryImage,
    xform: Transform,
    ver: Version,
    map: QR,
}

impl<'a> Symbol<'a> {
    pub fn new(img: &'a BinaryImage, xform: Transform, ver: Version) -> Self {
        Self { img, xform, ver, map: QR::function_map(ver) }
    }

    fn resolve(&self, r: i16, c: i16) -> (i16, i16) {
        let w = self.ver.width() as i16;
        debug_assert!(-w <= r && r < w && -w <= c && c < w, "Module out of bounds");
        (if r < 0 { r + w } else { r }, if c < 0 { c + w } else { c })
    }

    /// Samples the module at (row, col) through the active transform.
    pub fn sample(&self, r: i16, c: i16) -> QRResult<bool> {
        let (r, c) = self.resolve(r, c);
        let (px, py) = self.xform.map_to_pixel(c as f64, r as f64)?;
        Ok(self.img.dark_at(px, py))
    }

    fn sample_number(&self, coords: &[(i16, i16)]) -> QRResult<u32> {
        let mut num = 0;
        for &(r, c) in coords {
            num = num << 1 | self.sample(r, c)? as u32;
        }
        Ok(num)
    }
}

// Format info
//------------------------------------------------------------------------------

impl Symbol<'_> {
    /// Reads either format copy, tolerating up to three flipped modules.
    pub fn read_format_info(&self) -> QRResult<(ECLevel, MaskPattern)> {
        for coords in [&FORMAT_INFO_COORDS_MAIN, &FORMAT_INFO_COORDS_SIDE] {
            let num = self.sample_number(coords)?;
            if let Ok(word) = rectify_info(num, &FORMAT_INFOS, FORMAT_ERROR_CAPACITY) {
                let (ecl, mask) = parse_format_info(word ^ FORMAT_MASK);
                debug!(ec_level = ?ecl, mask = *mask, "format info decoded");
                return Ok((ecl, mask));
            }
        }
        Err(QRError::FormatInfoUnreadable)
    }
}

// Version info
//------------------------------------------------------------------------------

/// Confirms a geometric version estimate against the version-info blocks.
/// Estimates below 7 carry no version info and are trusted as-is.
pub(crate) fn read_version(
    img: &BinaryImage,
    xform: &Transform,
    est: Version,
) -> QRResult<Version> {
    if *est < 7 {
        return Ok(est);
    }

    let w = est.width() as i16;
    for coords in [&VERSION_INFO_COORDS_BL, &VERSION_INFO_COORDS_TR] {
        let mut num = 0u32;
        let mut readable = true;
        for &(r, c) in coords.iter() {
            let (r, c) = (if r < 0 { r + w } else { r }, if c < 0 { c + w } else { c });
            match xform.map_to_pixel(c as f64, r as f64) {
                Ok((px, py)) => num = num << 1 | img.dark_at(px, py) as u32,
                Err(_) => {
                    readable = false;
                    break;
                }
            }
        }
        if !readable {
            continue;
        }
        if let Ok(word) = rectify_info(num, &VERSION_INFOS, VERSION_ERROR_CAPACITY) {
            let ver = Version::new((word >> VERSION_ERROR_BIT_LEN) as usize);
            debug!(version = *ver, estimate = *est, "version info decoded");
            return Ok(ver);
        }
    }
    Err(QRError::VersionInfoUnreadable)
}

// Fixed-module verification
//------------------------------------------------------------------------------

impl Symbol<'_> {
    /// Compares sampled finder, timing and alignment cells against the base
    /// matrix; a mismatch fraction beyond the level's recoverable percent
    /// abandons the corner.
    pub fn verify_function_patterns(&self, ecl: ECLevel) -> QRResult<()> {
        let w = self.ver.width() as i16;
        let mut total = 0usize;
        let mut mismatch = 0usize;

        for r in 0..w {
            for c in 0..w {
                if let Module::Func(clr) = self.map.get(r, c) {
                    total += 1;
                    if self.sample(r, c)? != (clr == Color::Dark) {
                        mismatch += 1;
                    }
                }
            }
        }

        if mismatch * 100 > total * ecl.recoverable_percent() {
            debug!(mismatch, total, "function pattern verification failed");
            return Err(QRError::FixedModulesCorrupt);
        }
        Ok(())
    }
}

// Payload extraction
//------------------------------------------------------------------------------

impl Symbol<'_> {
    /// Samples every data module in placement order, undoing the mask.
    pub fn extract_payload(&self, mask: MaskPattern) -> QRResult<BitStream> {
        let total_bits = self.ver.total_codewords() << 3;
        let mask_fn = mask.mask_function();
        let mut payload = BitStream::new(total_bits);

        let mut count = 0;
        for (r, c) in EncRegionIter::new(self.ver) {
            if count == total_bits {
                break;
            }
            if self.map.get(r, c) != Module::Empty {
                continue;
            }
            let bit = self.sample(r, c)? ^ mask_fn(r, c);
            payload.push(bit);
            count += 1;
        }

        if count < total_bits {
            return Err(QRError::PrematureEndOfBits);
        }
        Ok(payload)
    }
}

// Alignment pattern search
//------------------------------------------------------------------------------

/// Looks for the bottom-right alignment centre around its affine estimate.
/// The search square follows the corner legs and widens once on a miss.
pub(crate) fn locate_alignment(
    img: &BinaryImage,
    xform: &Transform,
    ver: Version,
    corner: &Corner,
) -> Option<Point> {
    let d = ver.width() as f64;
    let est = xform.map(d - 7.0, d - 7.0).ok()?;
    let module = corner.module_size;

    for widen in [1.0, 2.0] {
        let half = 0.15 * (corner.top_leg() + corner.left_leg()) * widen;
        if let Some(p) = search_alignment(img, est, half, module) {
            debug!(x = p.x, y = p.y, "alignment pattern located");
            return Some(p);
        }
    }
    None
}

// Scans the square row by row for a dark-light-dark-light-dark ridge whose
// middle runs measure one module, then confirms the column profile
fn search_alignment(img: &BinaryImage, est: Point, half: f64, module: f64) -> Option<Point> {
    let x0 = (est.x - half).floor().max(0.0) as i32;
    let x1 = (est.x + half).ceil().min(img.w as f64 - 1.0) as i32;
    let y0 = (est.y - half).floor().max(0.0) as i32;
    let y1 = (est.y + half).ceil().min(img.h as f64 - 1.0) as i32;
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let tolerance = module * 0.5;
    let mut best: Option<(f64, Point)> = None;

    for y in y0..=y1 {
        let mut x = x0;
        while x <= x1 {
            // Next dark run in this row
            while x <= x1 && !img.dark_at(x, y) {
                x += 1;
            }
            if x > x1 {
                break;
            }
            let start = x;
            while x <= x1 && img.dark_at(x, y) {
                x += 1;
            }
            let len = (x - start) as f64;
            if (len - module).abs() > tolerance {
                continue;
            }

            // One-module light gaps with dark beyond, on both sides
            if !flanked_by_ring(img, start - 1, y, -1, module, tolerance)
                || !flanked_by_ring(img, x, y, 1, module, tolerance)
            {
                continue;
            }

            let cx = (start + x - 1) as f64 / 2.0;
            let Some(cy) = column_center(img, cx.round() as i32, y, module, tolerance) else {
                continue;
            };

            let cand = Point::new(cx, cy);
            let d2 = (cand.x - est.x).powi(2) + (cand.y - est.y).powi(2);
            if best.as_ref().map_or(true, |(bd, _)| d2 < *bd) {
                best = Some((d2, cand));
            }
        }
    }

    best.map(|(_, p)| p)
}

// From `from`, stepping by `dir`, expects a light run of one module and a
// dark pixel after it
fn flanked_by_ring(img: &BinaryImage, from: i32, y: i32, dir: i32, module: f64, tol: f64) -> bool {
    let mut x = from;
    let mut light = 0f64;
    while !img.dark_at(x, y) && light <= module + tol {
        light += 1.0;
        x += dir;
    }
    (light - module).abs() <= tol && img.dark_at(x, y)
}

// Vertical profile through a candidate centre: a one-module dark core with
// one-module light gaps and the dark ring beyond
fn column_center(img: &BinaryImage, x: i32, y: i32, module: f64, tol: f64) -> Option<f64> {
    if !img.dark_at(x, y) {
        return None;
    }

    let mut top = y;
    while img.dark_at(x, top - 1) {
        top -= 1;
    }
    let mut bottom = y;
    while img.dark_at(x, bottom + 1) {
        bottom += 1;
    }
    let core = (bottom - top + 1) as f64;
    if (core - module).abs() > tol {
        return None;
    }

    let up_ok = flanked_by_column_ring(img, x, top - 1, -1, module, tol);
    let down_ok = flanked_by_column_ring(img, x, bottom + 1, 1, module, tol);
    if !(up_ok && down_ok) {
        return None;
    }

    Some((top + bottom) as f64 / 2.0)
}

fn flanked_by_column_ring(
    img: &BinaryImage,
    x: i32,
    from: i32,
    dir: i32,
    module: f64,
    tol: f64,
) -> bool {
    let mut y = from;
    let mut light = 0f64;
    while !img.dark_at(x, y) && light <= module + tol {
        light += 1.0;
        y += dir;
    }
    (light - module).abs() <= tol && img.dark_at(x, y)
}

#[cfg(test)]
mod symbol_tests {
    use super::{locate_alignment, read_version, Symbol};
    use crate::builder::QRBuilder;
    use crate::common::mask::MaskPattern;
    use crate::common::metadata::{ECLevel, Version};
    use crate::reader::binarize::BinaryImage;
    use crate::reader::corner::Corner;
    use crate::reader::transform::{Point, Transform};

    // Exact transform for an upright rendering: module (col, row) centre
    // lands at qz + (col + 0.5) * ms - 0.5
    fn exact_affine(ms: f64, qz: f64, d: f64) -> Transform {
        let centre = |m: f64| qz + (m + 0.5) * ms - 0.5;
        let src = [(3.0, 3.0), (d - 4.0, 3.0), (3.0, d - 4.0)];
        let dst = [
            Point::new(centre(3.0), centre(3.0)),
            Point::new(centre(d - 4.0), centre(3.0)),
            Point::new(centre(3.0), centre(d - 4.0)),
        ];
        Transform::affine(src, dst).unwrap()
    }

    #[test]
    fn test_read_format_info() {
        let ver = Version::new(2);
        let (ecl, mask) = (ECLevel::Q, MaskPattern::new(4));
        let qr = QRBuilder::new(b"format probe")
            .version(ver)
            .ec_level(ecl)
            .mask(mask)
            .build()
            .unwrap();
        let img = qr.render(4);
        let bin = BinaryImage::from_gray_image(&img).unwrap();

        let xform = exact_affine(4.0, 16.0, ver.width() as f64);
        let symbol = Symbol::new(&bin, xform, ver);
        assert_eq!(symbol.read_format_info().unwrap(), (ecl, mask));
    }

    #[test]
    fn test_read_version_info_v7() {
        let ver = Version::new(7);
        let qr =
            QRBuilder::new(b"version probe").version(ver).ec_level(ECLevel::L).build().unwrap();
        let img = qr.render(4);
        let bin = BinaryImage::from_gray_image(&img).unwrap();

        let xform = exact_affine(4.0, 16.0, ver.width() as f64);
        assert_eq!(read_version(&bin, &xform, ver).unwrap(), ver);
    }

    #[test]
    fn test_version_below_7_uses_estimate() {
        let ver = Version::new(3);
        let qr = QRBuilder::new(b"x").version(ver).ec_level(ECLevel::L).build().unwrap();
        let img = qr.render(4);
        let bin = BinaryImage::from_gray_image(&img).unwrap();

        let xform = exact_affine(4.0, 16.0, ver.width() as f64);
        assert_eq!(read_version(&bin, &xform, ver).unwrap(), ver);
    }

    #[test]
    fn test_verify_function_patterns_clean() {
        let ver = Version::new(5);
        let qr = QRBuilder::new(b"fixed cells").version(ver).ec_level(ECLevel::M).build().unwrap();
        let img = qr.render(3);
        let bin = BinaryImage::from_gray_image(&img).unwrap();

        let xform = exact_affine(3.0, 12.0, ver.width() as f64);
        let symbol = Symbol::new(&bin, xform, ver);
        assert!(symbol.verify_function_patterns(ECLevel::M).is_ok());
    }

    #[test]
    fn test_verify_function_patterns_desynced_transform() {
        let ver = Version::new(5);
        let qr = QRBuilder::new(b"fixed cells").version(ver).ec_level(ECLevel::M).build().unwrap();
        let img = qr.render(3);
        let bin = BinaryImage::from_gray_image(&img).unwrap();

        // Shifted by half the symbol: samples land anywhere but home
        let xform = exact_affine(3.0, 60.0, ver.width() as f64);
        let symbol = Symbol::new(&bin, xform, ver);
        assert!(symbol.verify_function_patterns(ECLevel::M).is_err());
    }

    #[test]
    fn test_locate_alignment() {
        let ver = Version::new(2);
        let (ms, qz) = (4.0, 16.0);
        let d = ver.width() as f64;
        let qr = QRBuilder::new(b"align").version(ver).ec_level(ECLevel::L).build().unwrap();
        let img = qr.render(ms as u32);
        let bin = BinaryImage::from_gray_image(&img).unwrap();

        let xform = exact_affine(ms, qz, d);
        let centre = |m: f64| qz + (m + 0.5) * ms - 0.5;
        let corner = Corner {
            tl: Point::new(centre(3.0), centre(3.0)),
            tr: Point::new(centre(d - 4.0), centre(3.0)),
            bl: Point::new(centre(3.0), centre(d - 4.0)),
            module_size: ms,
        };

        let found = locate_alignment(&bin, &xform, ver, &corner).expect("No alignment found");
        let exp = Point::new(centre(d - 7.0), centre(d - 7.0));
        assert!((found.x - exp.x).abs() <= 1.0, "x off: {found:?} vs {exp:?}");
        assert!((found.y - exp.y).abs() <= 1.0, "y off: {found:?} vs {exp:?}");
    }
}
