//! Error types for the simulation engine

use thiserror::Error;

/// Simulation result type
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while loading configuration or writing results
#[derive(Error, Debug)]
pub enum SimError {
    /// Configuration error (invalid value, missing row, bad schema version)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A probability vector does not sum to 1
    #[error("{what} probabilities sum to {sum:.4}, expected 1.0")]
    InvalidProbabilities { what: &'static str, sum: f64 },

    /// Base carbon intensity must be strictly positive
    #[error("Region {region} has non-positive base carbon intensity {value}")]
    NonPositiveCarbon { region: String, value: f64 },

    /// A required set (regions, workloads, user locations) is empty
    #[error("No {0} configured")]
    EmptySet(&'static str),

    /// Sampling distribution could not be constructed
    #[error("Distribution error: {0}")]
    Distribution(String),

    /// A concurrent policy task panicked or was cancelled
    #[error("Policy task failed: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SimError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a distribution error
    pub fn distribution(msg: impl std::fmt::Display) -> Self {
        Self::Distribution(msg.to_string())
    }
}
