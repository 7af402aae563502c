//! Error types for graph construction and tracking passes.
//!
//! Only structural problems surface here. Ambiguous matches are reported
//! through [`TrackId`](crate::cell::TrackId) statuses and log warnings.

use crate::cell::CellRef;

/// Structural errors raised by frame and spatio-temporal graph operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Frame index {index} out of range (graph has {size} frames)")]
    OutOfRange { index: usize, size: usize },

    #[error("Frame number mismatch: expected {expected}, found {found}")]
    FrameNumberMismatch { expected: usize, found: usize },

    #[error("Unknown cell: {0}")]
    UnknownCell(CellRef),

    #[error("Duplicate track id {track_id} in frame {frame}")]
    DuplicateTrackId { frame: usize, track_id: u32 },

    #[error("Cell in frame {frame} has no usable geometry")]
    DegenerateGeometry { frame: usize },

    #[error("Edge would connect a cell to itself")]
    SelfLoop,

    #[error("Track id space exhausted")]
    TrackIdExhausted,

    #[error("Lineage violation: {0}")]
    LineageViolation(String),
}

/// Errors that abort a tracking, edge-tracking or transition pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackingError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Spatio-temporal graph has no frames")]
    EmptyGraph,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cell tracking must run before edge tracking")]
    TrackingRequired,

    #[error("Track {track_id} missing from frame {frame}")]
    MissingCell { track_id: u32, frame: usize },
}
