use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] triplog_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No token provided")]
    EmptyToken,
    #[error("Invalid trace on line {line}: {message}")]
    InvalidTrace { line: usize, message: String },
}
