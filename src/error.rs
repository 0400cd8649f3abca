//! Error types for the trade engine

use thiserror::Error;

use crate::config::ConfigReport;
use crate::trading::venue::{VenueKind, VenueResult};

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the trade engine
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigReport),

    // Session gate errors
    #[error("Daily buy budget exceeded: requested {requested} lamports, {remaining} lamports remaining")]
    BudgetExceeded { requested: u64, remaining: u64 },

    #[error("Outside trading window")]
    OutsideTradingWindow,

    #[error("Buys paused: event source unavailable")]
    IngestPaused,

    // Venue errors
    #[error("{venue} submission failed: {reason}")]
    VenueFailure { venue: VenueKind, reason: String },

    #[error("{venue} rejected transaction: {reason}")]
    VenueRejected { venue: VenueKind, reason: String },

    #[error("All venues failed for intent {intent_id} ({} attempts)", attempts.len())]
    AllVenuesFailed {
        intent_id: uuid::Uuid,
        attempts: Vec<VenueResult>,
    },

    #[error("Order too small: {0}")]
    OrderTooSmall(String),

    #[error("Intent {0} deadline already passed")]
    DeadlineExpired(uuid::Uuid),

    // Signing errors (external signer)
    #[error("Signing failed: {0}")]
    Signer(String),

    // Position management errors
    #[error("Position already open: {0}")]
    PositionExists(String),

    #[error("Stage sell failed for {mint} stage {stage}: {reason}")]
    StageSellFailure {
        mint: String,
        stage: usize,
        reason: String,
    },

    // Notification errors
    #[error("Notification failed: {0}")]
    Notify(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::VenueFailure { .. } | Error::Http(_) | Error::StageSellFailure { .. }
        )
    }

    /// Check if this error is a session gate refusal (buy rejected before dispatch)
    pub fn is_gate_refusal(&self) -> bool {
        matches!(
            self,
            Error::BudgetExceeded { .. } | Error::OutsideTradingWindow | Error::IngestPaused
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let venue = Error::VenueFailure {
            venue: VenueKind::Jito,
            reason: "timeout".to_string(),
        };
        assert!(venue.is_retryable());

        let rejected = Error::VenueRejected {
            venue: VenueKind::Rpc,
            reason: "blockhash not found".to_string(),
        };
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn test_gate_refusals() {
        assert!(Error::OutsideTradingWindow.is_gate_refusal());
        assert!(Error::BudgetExceeded {
            requested: 2,
            remaining: 1
        }
        .is_gate_refusal());
        assert!(!Error::Internal("x".into()).is_gate_refusal());
    }
}
