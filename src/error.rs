//! Error types for loading and normalizing leads.

use thiserror::Error;

/// Failure while retrieving a lead batch.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("lead API returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// Payload was not valid JSON or had an unexpected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reason a raw lead was rejected at ingestion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Lead carries no quality label
    #[error("lead {id} has no quality label")]
    MissingQuality { id: String },

    /// Lead carries a quality label outside the four known tiers
    #[error("lead {id} has unknown quality label '{label}'")]
    UnknownQuality { id: String, label: String },

    /// Entry in the payload is not a JSON object
    #[error("entry #{index} is not a lead object")]
    NotAnObject { index: usize },

    /// Entry is an object but could not be decoded as a lead
    #[error("entry #{index} could not be decoded: {reason}")]
    Malformed { index: usize, reason: String },
}
