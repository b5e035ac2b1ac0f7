//! Error taxonomy for decoding, geometry and encoding.
//!
//! Single-image operations return these directly. The batch coordinator
//! turns them into per-item messages via `Display`.

use crate::format::Format;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown image format: {0}")]
    UnknownFormat(String),
    #[error("Crop error: {0}")]
    Crop(String),
    #[error("Extend error: {0}")]
    Extend(String),
    #[error("Resize error: {0}")]
    Resize(String),
    #[error("Encoding not supported for {0}")]
    EncodeUnsupported(Format),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Invalid pixel buffer: {0}")]
    InvalidBuffer(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
