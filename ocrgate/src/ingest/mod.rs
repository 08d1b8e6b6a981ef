//! Image ingestion: acquiring bytes from a URL, base64 payload or local file,
//! then decoding them into a normalised RGB pixel grid.

mod decode;
mod source;

pub use decode::{decode, DecodedImage};
pub(crate) use decode::encode_png;
pub use source::{
    check_base64_size, classify, decode_base64, decoded_base64_len, read_local, ImageFetcher,
    ImageInput, RawImage,
};
