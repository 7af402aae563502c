//! CellGraph Deterministic Simulation Harness
//!
//! Generates synthetic time-lapses with known ground truth and runs the full
//! CellGraph pipeline on them. All randomness derives from a single 64-bit
//! seed, so a failing run can be replayed exactly.
//!
//! ```text
//! SyntheticTissue ──► polygons ──► build_graph ──► run_pipeline ──► evaluate
//!   (ground truth)                 (adjacency,      (tracking, edges,
//!                                   border flags)    T1 detection)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cellgraph_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Division);
//! assert!(result.passed);
//! ```

mod error;
mod runner;
mod tissue;
pub mod exporter;
pub mod input;
pub mod pipeline;
pub mod scenarios;

pub use error::SimError;
pub use exporter::{CellExport, FrameExport, TrackingExport};
pub use input::{FrameInput, TissueInput};
pub use pipeline::{build_graph, run_pipeline, PipelineConfig, PipelineOutput};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRun, ScenarioRunner};
pub use tissue::{SyntheticFrame, SyntheticTissue};
