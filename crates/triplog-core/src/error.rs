//! Error types for triplog-core

use crate::models::TripGuid;
use thiserror::Error;

/// Result type alias using triplog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in triplog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No trip row exists for the referenced guid
    #[error("Unknown trip: {0}")]
    UnknownTrip(TripGuid),

    /// Guid collision on trip creation
    #[error("Trip already exists: {0}")]
    DuplicateTrip(TripGuid),

    /// Storage error; multi-row operations roll back fully before this
    /// surfaces
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Transport-level upload failure (timeout, refused connection,
    /// non-success status)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server response that could not be decoded
    #[error("Malformed server response: {0}")]
    MalformedResponse(String),

    /// Operation requires a logged-in user
    #[error("No authenticated user")]
    AuthenticationMissing,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
