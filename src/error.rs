//! Error types for the swap tracker

use thiserror::Error;

/// Main error type for the tracker
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("Cannot {operation} while action is {from}")]
    InvalidTransition { from: String, operation: String },

    #[error("Stale observation: previously seen events missing: {missing}")]
    StaleObservation { missing: String },

    #[error("Ledger action detail fetch failed: {0}")]
    DetailFetch(String),

    #[error("Action execution failed: {0}")]
    Execution(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Swap {id} not found")]
    SwapNotFound { id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    /// Check if error is retryable on the next poll
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::Http(_)
                | TrackerError::DetailFetch(_)
                | TrackerError::Timeout { .. }
        )
    }

    /// Label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            TrackerError::Config(_) => "config",
            TrackerError::Http(_) => "http",
            TrackerError::Payload(_) => "payload",
            TrackerError::UnsupportedProtocol(_) => "unsupported_protocol",
            TrackerError::InvalidTransition { .. } => "invalid_transition",
            TrackerError::StaleObservation { .. } => "stale_observation",
            TrackerError::DetailFetch(_) => "detail_fetch",
            TrackerError::Execution(_) => "execution",
            TrackerError::Timeout { .. } => "timeout",
            TrackerError::SwapNotFound { .. } => "swap_not_found",
            TrackerError::Internal(_) => "internal",
        }
    }
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;
