//! Error types for the detection pipeline.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A pipeline stage whose output another stage depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Image,
    Background,
    Signal,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Stage::Image => "image not loaded",
            Stage::Background => "background not calculated",
            Stage::Signal => "signal not calculated",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "Signal and background shapes differ: signal {signal:?}, background {background:?}"
    )]
    InputShapeMismatch {
        signal: (usize, usize),
        background: (usize, usize),
    },

    #[error("Precondition failed: {0}")]
    Precondition(Stage),

    #[error("Sensitivity factor must be finite and positive, got {0}")]
    InvalidSigma(f64),

    #[error("Blur window must be odd and positive, got {0}")]
    InvalidKernel(usize),

    #[error("Invalid image dimensions {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("Failed to decode image '{path}': {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode image '{path}': {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Truncated .pic file '{path}': expected {expected} bytes, found {actual}")]
    TruncatedPic {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Opening '{0}' requires a .pic format (rows and cols)")]
    PicFormatRequired(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
