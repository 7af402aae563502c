//! Harness error types.

use cellgraph_core::{GraphError, TrackingError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input in frame {frame}: {reason}")]
    InvalidInput { frame: usize, reason: String },
}
