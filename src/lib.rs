//! QR code encoder and image decoder.
//!
//! The builder side turns a byte payload into a standards-conforming module
//! matrix and renders it; the reader side recovers payloads from raster
//! images, correcting errors along the way.
//!
//! ```
//! use qrcodec::{ECLevel, QRBuilder, QRReader};
//!
//! let qr = QRBuilder::new(b"HELLO WORLD").ec_level(ECLevel::Q).build().unwrap();
//! let img = qr.render(4);
//!
//! let decoded = QRReader::detect_gray(&img);
//! assert_eq!(decoded[0].payload, b"HELLO WORLD");
//! ```

pub mod builder;
mod common;
pub mod reader;

pub use builder::{render_matrix, QRBuilder, QR};
pub use common::codec::Mode;
pub use common::error::{QRError, QRResult};
pub use common::mask::MaskPattern;
pub use common::metadata::{ECLevel, Version};
pub use reader::{BinaryImage, Decoded, QRReader};
