//! Custom error types for alphamix.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the alphamix library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to list the input directory.
    #[error("failed to read input directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to encode an image for the generation backend.
    #[error("failed to encode image: {source}")]
    ImageEncode {
        #[source]
        source: image::ImageError,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The HTTP request to the generation backend failed.
    #[error("request to generation backend failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },

    /// The generation backend answered with a non-success status.
    #[error("generation backend returned {status}: {body}")]
    Backend {
        status: reqwest::StatusCode,
        body: String,
    },

    /// An image payload returned by the backend could not be decoded.
    #[error("malformed image payload: {reason}")]
    Payload { reason: String },

    /// The backend produced no images.
    #[error("generation backend returned no images")]
    NoImages,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for alphamix operations.
pub type Result<T> = std::result::Result<T, Error>;
