use crate::domain::order::OrderId;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the purchase-verification backend or the path to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum PurchaseError {
    #[error("Purchase already in progress for order {0}")]
    AlreadyInProgress(OrderId),
    #[error("Platform store integration is unavailable")]
    PlatformUnavailable,
    #[error("Purchase orchestrator has shut down")]
    OrchestratorClosed,
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PurchaseError>;
