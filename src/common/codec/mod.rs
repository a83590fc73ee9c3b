mod decoder;
mod encoder;
mod types;

pub use types::Mode;

pub(crate) use decoder::{decode, DecodedPayload};
pub(crate) use encoder::{encode, encode_with_version};
pub(crate) use types::{Segment, MODES, PADDING_CODEWORDS};
