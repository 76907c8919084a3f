use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main library error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid model or runtime configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Download returned something other than a complete file.
    #[error("unexpected response code {status} for {url}")]
    Download { url: String, status: u16 },

    /// Transport-level HTTP error.
    #[error(transparent)]
    Http(#[from] Box<ureq::Error>),

    /// Image decoding or encoding error.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// No saved model at the given location.
    #[error("\"{}\" not found, save a model there first", .0.display())]
    MissingModel(PathBuf),

    /// Malformed safetensors file.
    #[error("invalid safetensors file {path}: {reason}")]
    SafeTensors { path: PathBuf, reason: String },

    /// Invalid shape.
    #[error("invalid shape: {0}")]
    Shape(String),

    /// Errors returned by libtorch.
    #[error(transparent)]
    Torch(#[from] tch::TchError),
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        Error::Http(Box::new(err))
    }
}

impl Error {
    /// Prefixes the message of a libtorch error with the file it relates to.
    pub fn path_context(self, path: &std::path::Path) -> Self {
        match self {
            Error::Torch(err) => {
                Error::Torch(tch::TchError::Torch(format!("{}: {}", path.display(), err)))
            }
            err => err,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
