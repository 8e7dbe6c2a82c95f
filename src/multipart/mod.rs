//! Hand-rolled multipart/form-data decoding.

mod content_type;
mod decoder;

pub use content_type::{extract_boundary, is_multipart_form};
pub use decoder::{decode, DecodedForm, FileAttachment};
