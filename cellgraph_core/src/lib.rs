//! CellGraph Core - Spatio-Temporal Tracking of Segmented Tissue
//!
//! Follows cells through a time-lapse of polygon tilings and detects the
//! topological events that reshape the tissue:
//! 1. **Identity**: containment candidates resolved by stable matching
//! 2. **Lineage**: divisions, eliminations and first/previous/next chains
//! 3. **Rearrangement**: edge presence timelines and T1 neighbor exchanges
//!
//! Typical pipeline:
//! polygons → [`FrameGraph`] → [`SpatioTemporalGraph`] → [`StableMarriageTracker`]
//! → [`EdgeTracker`] → [`PolygonalCellTiles`] → [`detect_transitions`]

pub mod border;
pub mod cell;
pub mod cell_tile;
pub mod edge_tracking;
pub mod error;
pub mod frame_graph;
pub mod geometry;
pub mod pairing;
pub mod st_graph;
pub mod stable_marriage;
pub mod t1_transition;
pub mod tracking;

// Re-export key types for convenience
pub use border::mark_border_cells;
pub use cell::{Cell, CellRef, Division, Elimination, TrackId};
pub use cell_tile::{PolygonalCellTile, PolygonalCellTiles};
pub use edge_tracking::{EdgeTimelines, EdgeTracker};
pub use error::{GraphError, TrackingError};
pub use frame_graph::{Edge, FrameGraph};
pub use st_graph::SpatioTemporalGraph;
pub use t1_transition::{detect_transitions, T1Transition, TransitionFilter};
pub use tracking::{StableMarriageTracker, TrackingConfig, TrackingReport};
