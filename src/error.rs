use std::io;
use std::path::PathBuf;

use thiserror::Error;


pub type Result<T> = std::result::Result<T, ComposeError>;

/// Failure of a single compose attempt. None of these is fatal to the process.
#[derive(Error, Debug)]
pub enum ComposeError {

    #[error("failed to read `{}`: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("canvas unavailable: {0}")]
    CanvasUnavailable(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    /// Every overlay candidate failed; carries the failure of the last one tried.
    #[error("no overlay asset for style `{style}` could be loaded: {source}")]
    OverlayUnavailable {
        style: String,
        source: Box<ComposeError>,
    },
}

impl ComposeError {

    /// Errors caused by the submitted data rather than by this process.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::FileRead { .. } | Self::Decode(_) => true,
            Self::CanvasUnavailable(_) | Self::Encode(_) | Self::OverlayUnavailable { .. } => false,
        }
    }
}
