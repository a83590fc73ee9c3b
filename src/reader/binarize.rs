use image::{GrayImage, RgbImage};

use crate::common::{QRError, QRResult};

// Binary image
//------------------------------------------------------------------------------

// One bool per pixel, `true` for dark, produced by global-histogram
// thresholding
#[derive(Debug)]
pub struct BinaryImage {
    buf: Vec<bool>,
    pub w: u32,
    pub h: u32,
}

impl BinaryImage {
    /// Binarizes a packed RGB24 buffer with `stride` bytes per row.
    pub fn from_rgb24(pixels: &[u8], width: u32, height: u32, stride: usize) -> QRResult<Self> {
        debug_assert!(stride >= width as usize * 3, "Stride smaller than a pixel row");
        debug_assert!(
            pixels.len() >= stride * height as usize,
            "Pixel buffer shorter than stride * height"
        );

        let mut lumas = Vec::with_capacity((width * height) as usize);
        for y in 0..height as usize {
            let row = &pixels[y * stride..];
            for x in 0..width as usize {
                let (r, g, b) = (row[x * 3], row[x * 3 + 1], row[x * 3 + 2]);
                lumas.push(luma(r, g, b));
            }
        }
        Self::from_lumas(lumas, width, height)
    }

    pub fn from_rgb_image(img: &RgbImage) -> QRResult<Self> {
        let (w, h) = img.dimensions();
        let lumas = img.pixels().map(|p| luma(p[0], p[1], p[2])).collect();
        Self::from_lumas(lumas, w, h)
    }

    pub fn from_gray_image(img: &GrayImage) -> QRResult<Self> {
        let (w, h) = img.dimensions();
        let lumas = img.pixels().map(|p| p[0]).collect();
        Self::from_lumas(lumas, w, h)
    }

    // Global threshold from the populated ends of the histogram
    fn from_lumas(lumas: Vec<u8>, w: u32, h: u32) -> QRResult<Self> {
        let mut histogram = [0u32; 256];
        for &l in lumas.iter() {
            histogram[l as usize] += 1;
        }

        let first = histogram.iter().position(|&n| n > 0);
        let last = histogram.iter().rposition(|&n| n > 0);
        let (first, last) = match (first, last) {
            (Some(f), Some(l)) if f != l => (f, l),
            // A flat image holds no symbol
            _ => return Err(QRError::NoFinders),
        };

        let cutoff = (first + last + 1) / 2;
        let buf = lumas.iter().map(|&l| (l as usize) < cutoff).collect();
        Ok(Self { buf, w, h })
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<bool> {
        if x >= self.w || y >= self.h {
            return None;
        }
        Some(self.buf[(y * self.w + x) as usize])
    }

    /// Pixel lookup for signed coordinates; anything outside the raster
    /// reads as light, like the quiet zone.
    #[inline]
    pub fn dark_at(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        self.get(x as u32, y as u32).unwrap_or(false)
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((30 * r as u32 + 59 * g as u32 + 11 * b as u32) / 100) as u8
}

#[cfg(test)]
mod binarize_tests {
    use super::BinaryImage;
    use image::{GrayImage, Luma};

    #[test]
    fn test_flat_image_fails() {
        let img = GrayImage::from_pixel(32, 32, Luma([200]));
        assert!(BinaryImage::from_gray_image(&img).is_err());
    }

    #[test]
    fn test_cutoff_splits_extremes() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([230]));
        img.put_pixel(1, 1, Luma([20]));
        img.put_pixel(2, 2, Luma([120]));
        // Cutoff lands at (20 + 230 + 1) / 2 = 125
        let bin = BinaryImage::from_gray_image(&img).unwrap();
        assert_eq!(bin.get(1, 1), Some(true));
        assert_eq!(bin.get(2, 2), Some(true));
        assert_eq!(bin.get(0, 0), Some(false));
    }

    #[test]
    fn test_rgb24_stride() {
        // 2x2 image padded to a 10-byte stride
        let mut pixels = vec![255u8; 20];
        // Dark pixel at (1, 1)
        pixels[10 + 3] = 0;
        pixels[10 + 4] = 0;
        pixels[10 + 5] = 0;
        let bin = BinaryImage::from_rgb24(&pixels, 2, 2, 10).unwrap();
        assert_eq!(bin.get(1, 1), Some(true));
        assert_eq!(bin.get(0, 0), Some(false));
        assert_eq!(bin.get(0, 1), Some(false));
    }

    #[test]
    fn test_out_of_bounds_reads_light() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([255]));
        img.put_pixel(0, 0, Luma([0]));
        let bin = BinaryImage::from_gray_image(&img).unwrap();
        assert!(!bin.dark_at(-1, 0));
        assert!(!bin.dark_at(0, 4));
        assert!(bin.dark_at(0, 0));
    }
}
