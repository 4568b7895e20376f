//! Error types for image loading.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Unsupported image source: {0}")]
    UnsupportedSource(String),
}

pub type Result<T> = std::result::Result<T, ImageError>;
