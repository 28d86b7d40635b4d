// src/error.rs

use crate::types::ApproachId;

pub type Result<T> = std::result::Result<T, SignalError>;

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Fewer usable images than approaches; the cycle cannot start
    #[error("Not enough images! Needed {needed}, but found {found}.")]
    InsufficientInput { needed: usize, found: usize },

    /// Missing approach key, wrong approach count or invalid parameter
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The detector could not produce detections for an approach's image
    #[error("Detection failed for {approach}: {message}")]
    Detection {
        approach: ApproachId,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SignalError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn detection(approach: ApproachId, message: impl ToString) -> Self {
        Self::Detection {
            approach,
            message: message.to_string(),
        }
    }
}
