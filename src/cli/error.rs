//! CLI-specific error types

use std::path::PathBuf;

use thiserror::Error;

use crate::error::DiscoveryError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to serialize output: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("{0}")]
    Discovery(#[from] DiscoveryError),
}
