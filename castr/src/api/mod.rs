//! High level encode pipelines.
mod encode;

pub use encode::{encode_archive, encode_blob, EncodeError, EncodeOptions, EncodeResult};
