mod binarize;
mod corner;
mod finder;
mod symbol;
mod transform;

pub use binarize::BinaryImage;

use image::{GrayImage, RgbImage};
use tracing::debug;

use corner::{assemble_corners, Corner};
use finder::locate_finders;
use symbol::{locate_alignment, read_version, Symbol};
use transform::{Point, Transform};

use crate::common::codec::{decode, DecodedPayload};
use crate::common::ec::Block;
use crate::common::metadata::{ECLevel, Version};
use crate::common::{BitStream, QRError, QRResult};

// Decoded symbol
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub payload: Vec<u8>,
    pub version: Version,
    pub ec_level: ECLevel,
    /// ECI assignment announced by the symbol, if any. The payload is
    /// returned as raw bytes either way; transcoding is the caller's call.
    pub eci: Option<u32>,
    /// Codewords the error corrector had to repair.
    pub corrected: usize,
}

impl Decoded {
    /// Lossy UTF-8 view of the payload.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

// Reader
//------------------------------------------------------------------------------

pub struct QRReader;

impl QRReader {
    /// Finds and decodes every symbol in the image, in corner-scan order.
    /// Failures are per-symbol; an empty list means nothing decodable.
    pub fn detect(img: &RgbImage) -> Vec<Decoded> {
        match BinaryImage::from_rgb_image(img) {
            Ok(bin) => Self::detect_binary(&bin),
            Err(e) => {
                debug!(error = %e, "binarization failed");
                Vec::new()
            }
        }
    }

    pub fn detect_gray(img: &GrayImage) -> Vec<Decoded> {
        match BinaryImage::from_gray_image(img) {
            Ok(bin) => Self::detect_binary(&bin),
            Err(e) => {
                debug!(error = %e, "binarization failed");
                Vec::new()
            }
        }
    }

    /// Decodes from a packed RGB24 buffer with `stride` bytes per row.
    pub fn decode_rgb24(pixels: &[u8], width: u32, height: u32, stride: usize) -> Vec<Decoded> {
        match BinaryImage::from_rgb24(pixels, width, height, stride) {
            Ok(bin) => Self::detect_binary(&bin),
            Err(e) => {
                debug!(error = %e, "binarization failed");
                Vec::new()
            }
        }
    }

    pub fn detect_binary(bin: &BinaryImage) -> Vec<Decoded> {
        let finders = locate_finders(bin);
        if finders.len() < 3 {
            debug!(count = finders.len(), "not enough finders");
            return Vec::new();
        }

        let corners = assemble_corners(&finders);
        if corners.is_empty() {
            debug!("no corner passes");
            return Vec::new();
        }

        let mut results = Vec::new();
        let mut claimed: Vec<(Point, f64)> = Vec::new();
        for corner in corners {
            // Skip triples reusing a finder of an already decoded symbol
            let reused = [corner.tl, corner.tr, corner.bl].iter().any(|p| {
                claimed.iter().any(|(q, m)| p.dist(q) < *m * 3.0)
            });
            if reused {
                continue;
            }

            match Self::decode_corner(bin, &corner) {
                Ok(decoded) => {
                    claimed.extend(
                        [corner.tl, corner.tr, corner.bl]
                            .into_iter()
                            .map(|p| (p, corner.module_size)),
                    );
                    results.push(decoded);
                }
                Err(e) => debug!(error = %e, "corner failed"),
            }
        }
        results
    }

    // One corner through the whole pipeline: version, transform, format,
    // fixed-module check, sampling, correction, parsing. The perspective
    // pass is the fallback when the affine one fails.
    fn decode_corner(bin: &BinaryImage, corner: &Corner) -> QRResult<Decoded> {
        let ver_est = estimate_version(corner)?;
        let mut xform = corner_affine(corner, ver_est)?;

        let ver = read_version(bin, &xform, ver_est)?;
        if ver != ver_est {
            xform = corner_affine(corner, ver)?;
        }

        let affine_result = Self::decode_pass(bin, &xform, ver);
        if affine_result.is_ok() || *ver < 2 {
            return affine_result;
        }

        let Some(align) = locate_alignment(bin, &xform, ver, corner) else {
            return affine_result;
        };
        let perspective = corner_perspective(corner, ver, align)?;
        Self::decode_pass(bin, &perspective, ver)
    }

    fn decode_pass(bin: &BinaryImage, xform: &Transform, ver: Version) -> QRResult<Decoded> {
        let symbol = Symbol::new(bin, xform.clone(), ver);

        let (ecl, mask) = symbol.read_format_info()?;
        symbol.verify_function_patterns(ecl)?;

        let payload = symbol.extract_payload(mask)?;

        let blk_info = ver.data_codewords_per_block(ecl);
        let ec_len = ver.ecc_per_block(ecl);
        let mut blocks = Self::deinterleave(payload.data(), blk_info, ec_len);

        let mut corrected = 0;
        let mut enc = BitStream::new(ver.data_codewords(ecl) << 3);
        for block in blocks.iter_mut() {
            corrected += block.rectify()?;
            enc.extend(block.data());
        }
        debug!(version = *ver, corrected, "blocks rectified");

        let DecodedPayload { bytes, eci } = decode(&mut enc, ver)?;
        Ok(Decoded { payload: bytes, version: ver, ec_level: ecl, eci, corrected })
    }

    fn deinterleave(
        data: &[u8],
        blk_info: (usize, usize, usize, usize),
        ec_len: usize,
    ) -> Vec<Block> {
        // b1s = block1_size, b1c = block1_count
        let (b1s, b1c, b2s, b2c) = blk_info;

        let total_blks = b1c + b2c;
        let spl = b1s * total_blks;
        let data_sz = b1s * b1c + b2s * b2c;

        let mut blks = vec![Vec::with_capacity(b2s + ec_len); total_blks];

        // Deinterleave data codewords; group 2 blocks own the excess round
        data[..spl]
            .chunks(total_blks)
            .for_each(|ch| ch.iter().enumerate().for_each(|(i, v)| blks[i].push(*v)));
        if b2c > 0 {
            data[spl..data_sz]
                .chunks(b2c)
                .for_each(|ch| ch.iter().enumerate().for_each(|(i, v)| blks[b1c + i].push(*v)));
        }

        // Deinterleave ecc codewords
        data[data_sz..]
            .chunks(total_blks)
            .for_each(|ch| ch.iter().enumerate().for_each(|(i, v)| blks[i].push(*v)));

        blks.iter().map(|b| Block::with_encoded(b, b.len() - ec_len)).collect()
    }
}

// Corner geometry
//------------------------------------------------------------------------------

// Modules between finder centres plus the 2 * 3.5 overhang; the dimension
// must land on 4v + 17
fn estimate_version(corner: &Corner) -> QRResult<Version> {
    let module = corner.module_size;
    if module <= 0.0 {
        return Err(QRError::NoCornerPasses);
    }

    let top = (corner.top_leg() / module).round();
    let left = (corner.left_leg() / module).round();
    let mut dim = ((top + left) / 2.0).round() as i64 + 7;
    match dim % 4 {
        0 => dim += 1,
        1 => {}
        2 => dim -= 1,
        _ => return Err(QRError::NoCornerPasses),
    }

    Version::from_width(dim as usize).ok_or(QRError::NoCornerPasses)
}

fn corner_affine(corner: &Corner, ver: Version) -> QRResult<Transform> {
    let d = ver.width() as f64;
    Transform::affine(
        [(3.0, 3.0), (d - 4.0, 3.0), (3.0, d - 4.0)],
        [corner.tl, corner.tr, corner.bl],
    )
}

fn corner_perspective(corner: &Corner, ver: Version, align: Point) -> QRResult<Transform> {
    let d = ver.width() as f64;
    Transform::perspective(
        [(3.0, 3.0), (d - 4.0, 3.0), (3.0, d - 4.0), (d - 7.0, d - 7.0)],
        [corner.tl, corner.tr, corner.bl, align],
    )
}
