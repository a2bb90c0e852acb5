use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is {bytes} bytes, above the {limit} byte limit")]
    TooLarge {
        path: PathBuf,
        bytes: u64,
        limit: u64,
    },
    #[error("Invalid audio: {message}")]
    Invalid { message: String },
    #[error("Sample error: {source}")]
    Sample { source: hound::Error },
    #[error("Unsupported audio: {message}")]
    Unsupported { message: String },
    #[error("Decoded 0 samples from {path}")]
    Empty { path: PathBuf },
    /// The decoder observed the cancellation flag and stopped early.
    #[error("Decoding aborted")]
    Aborted,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
