mod qr;

pub use qr::QR;

pub(crate) use qr::Module;

use std::ops::Deref;

use image::{GrayImage, Luma};
use tracing::debug;

use crate::common::codec::{encode, encode_with_version};
use crate::common::ec::ecc;
use crate::common::error::{QRError, QRResult};
use crate::common::mask::{apply_best_mask, MaskPattern};
use crate::common::metadata::{ECLevel, Version};
use crate::common::BitStream;

// Builder
//------------------------------------------------------------------------------

pub struct QRBuilder<'a> {
    data: &'a [u8],
    version: Option<Version>,
    ec_level: ECLevel,
    eci: Option<u32>,
    mask: Option<MaskPattern>,
}

impl<'a> QRBuilder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, version: None, ec_level: ECLevel::M, eci: None, mask: None }
    }

    pub fn data(&mut self, data: &'a [u8]) -> &mut Self {
        self.data = data;
        self
    }

    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = Some(version);
        self
    }

    pub fn unset_version(&mut self) -> &mut Self {
        self.version = None;
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = ec_level;
        self
    }

    /// Declares the character encoding of the payload via an ECI assignment
    /// number, emitted ahead of the data segments.
    pub fn eci(&mut self, assignment: u32) -> &mut Self {
        self.eci = Some(assignment);
        self
    }

    pub fn mask(&mut self, mask: MaskPattern) -> &mut Self {
        self.mask = Some(mask);
        self
    }
}

impl QRBuilder<'_> {
    pub fn build(&self) -> QRResult<QR> {
        if self.data.is_empty() {
            return Err(QRError::EmptyData);
        }
        if let Some(assignment) = self.eci {
            // ECI designators stop at 999999
            if assignment > 999_999 {
                return Err(QRError::UnsupportedMode);
            }
        }

        let (encoded, ver) = match self.version {
            Some(v) => (encode_with_version(self.data, v, self.ec_level, self.eci)?, v),
            None => encode(self.data, self.ec_level, self.eci)?,
        };
        debug!(version = *ver, data_len = self.data.len(), "payload segmented");

        // Error correction and interleaving
        let mut payload = BitStream::new(ver.total_codewords() << 3);
        let (data_blocks, ecc_blocks) = Self::compute_ecc(encoded.data(), ver, self.ec_level);
        payload.extend(&Self::interleave(&data_blocks));
        payload.extend(&Self::interleave(&ecc_blocks));

        let mut qr = QR::new(ver, self.ec_level);
        qr.draw_all_function_patterns();
        qr.draw_encoding_region(&payload);

        let mask = match self.mask {
            Some(m) => {
                qr.mask(m);
                m
            }
            None => apply_best_mask(&mut qr),
        };
        debug!(version = *ver, ec_level = ?self.ec_level, mask = *mask, "symbol built");

        Ok(qr)
    }

    fn compute_ecc(data: &[u8], ver: Version, ecl: ECLevel) -> (Vec<&[u8]>, Vec<Vec<u8>>) {
        let data_blocks = Self::blockify(data, ver, ecl);

        let ecc_size_per_block = ver.ecc_per_block(ecl);
        let ecc_blocks =
            data_blocks.iter().map(|b| ecc(b, ecc_size_per_block)).collect::<Vec<_>>();

        (data_blocks, ecc_blocks)
    }

    pub(crate) fn blockify(data: &[u8], ver: Version, ecl: ECLevel) -> Vec<&[u8]> {
        let (block1_size, block1_count, block2_size, block2_count) =
            ver.data_codewords_per_block(ecl);

        let total_blocks = block1_count + block2_count;
        let total_block1_size = block1_size * block1_count;
        let total_size = total_block1_size + block2_size * block2_count;

        debug_assert!(
            total_size == data.len(),
            "Data len doesn't match total size of blocks: Data len {}, Total block size {}",
            data.len(),
            total_size
        );

        let mut data_blocks = Vec::with_capacity(total_blocks);
        data_blocks.extend(data[..total_block1_size].chunks(block1_size));
        if block2_size > 0 {
            data_blocks.extend(data[total_block1_size..].chunks(block2_size));
        }
        data_blocks
    }

    /// Codewords the symbol can lose and still decode.
    pub fn ec_capacity(ver: Version, ecl: ECLevel) -> usize {
        // Small symbols reserve a few ecc codewords for misdecode
        // protection instead of correction
        let p = match (*ver, ecl) {
            (1, ECLevel::L) => 3,
            (2, ECLevel::L) | (1, ECLevel::M) => 2,
            (1, _) | (3, ECLevel::L) => 1,
            _ => 0,
        };

        let ec_bytes_per_block = ver.ecc_per_block(ecl);
        let (_, count1, _, count2) = ver.data_codewords_per_block(ecl);
        let ec_bytes = (count1 + count2) * ec_bytes_per_block;

        (ec_bytes - p) / 2
    }

    pub(crate) fn interleave<T: Copy, V: Deref<Target = [T]>>(blocks: &[V]) -> Vec<T> {
        let max_block_size = blocks.iter().map(|b| b.len()).max().expect("Blocks is empty");
        let total_size = blocks.iter().map(|b| b.len()).sum::<usize>();
        let mut res = Vec::with_capacity(total_size);
        for i in 0..max_block_size {
            for b in blocks {
                if i < b.len() {
                    res.push(b[i]);
                }
            }
        }
        res
    }
}

// Raster adapter for raw module matrices
//------------------------------------------------------------------------------

/// Renders a bare module matrix (`true` = dark) produced by [`QR::to_matrix`]
/// or elsewhere, validating the shape against the QR dimension rule.
pub fn render_matrix(matrix: &[Vec<bool>], module_size: u32, quiet_zone: u32) -> QRResult<GrayImage> {
    let w = matrix.len();
    if Version::from_width(w).is_none() || matrix.iter().any(|row| row.len() != w) {
        return Err(QRError::InvalidMatrixShape);
    }
    if !(1..=100).contains(&module_size) || quiet_zone > 400 {
        return Err(QRError::InvalidMatrixShape);
    }

    let qr_size = w as u32 * module_size;
    let total_size = quiet_zone + qr_size + quiet_zone;
    let mut canvas = GrayImage::from_pixel(total_size, total_size, Luma([255]));
    for i in 0..qr_size {
        for j in 0..qr_size {
            let dark = matrix[(i / module_size) as usize][(j / module_size) as usize];
            if dark {
                canvas.put_pixel(quiet_zone + j, quiet_zone + i, Luma([0]));
            }
        }
    }
    Ok(canvas)
}

#[cfg(test)]
mod render_matrix_tests {
    use super::render_matrix;

    #[test]
    fn test_rejects_bad_shapes() {
        let not_square = vec![vec![false; 21]; 20];
        assert!(render_matrix(&not_square, 2, 8).is_err());
        let bad_dimension = vec![vec![false; 22]; 22];
        assert!(render_matrix(&bad_dimension, 2, 8).is_err());
        let ragged: Vec<Vec<bool>> =
            (0..21).map(|i| vec![false; if i == 7 { 20 } else { 21 }]).collect();
        assert!(render_matrix(&ragged, 2, 8).is_err());
    }

    #[test]
    fn test_renders_valid_matrix() {
        let matrix = vec![vec![true; 21]; 21];
        let img = render_matrix(&matrix, 2, 8).unwrap();
        assert_eq!(img.dimensions(), (21 * 2 + 16, 21 * 2 + 16));
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert_eq!(img.get_pixel(8, 8)[0], 0);
    }
}
