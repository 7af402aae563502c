//! Full analysis pipeline: border marking, tracking, edge timelines, T1s.

use cellgraph_core::geometry::DEFAULT_TOLERANCE;
use cellgraph_core::{
    detect_transitions, mark_border_cells, EdgeTimelines, EdgeTracker, FrameGraph, GraphError,
    PolygonalCellTiles, SpatioTemporalGraph, StableMarriageTracker, T1Transition, TrackingConfig,
    TrackingError, TrackingReport, TransitionFilter,
};
use geo::Polygon;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Settings for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub tracking: TrackingConfig,

    /// First frame of edge tracking (default: 0)
    pub t1_start: usize,

    pub filter: TransitionFilter,

    /// Coordinate tolerance for shared boundaries
    pub tolerance: f64,

    /// Unshared perimeter above which a cell counts as border
    pub min_exposed_length: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            t1_start: 0,
            filter: TransitionFilter::default(),
            tolerance: DEFAULT_TOLERANCE,
            min_exposed_length: 1e-6,
        }
    }
}

/// Everything the pipeline produces besides the mutated graph.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub report: TrackingReport,
    pub timelines: EdgeTimelines,
    /// Transitions that passed the filter
    pub transitions: Vec<T1Transition>,
    /// Transitions rejected by the filter
    pub filtered_out: usize,
}

/// Builds a graph from polygon frames, deriving adjacency and border flags.
pub fn build_graph<I>(frames: I, config: &PipelineConfig) -> Result<SpatioTemporalGraph, GraphError>
where
    I: IntoIterator<Item = Vec<Polygon<f64>>>,
{
    let mut built = Vec::new();
    for (t, polygons) in frames.into_iter().enumerate() {
        let mut frame = FrameGraph::from_polygons(t, polygons, config.tolerance)?;
        mark_border_cells(&mut frame, config.min_exposed_length)?;
        built.push(frame);
    }
    SpatioTemporalGraph::from_frames(built)
}

/// Tracks cells, follows edges from `t1_start` and detects T1 transitions.
pub fn run_pipeline(
    graph: &mut SpatioTemporalGraph,
    config: &PipelineConfig,
) -> Result<PipelineOutput, TrackingError> {
    let report = StableMarriageTracker::new(config.tracking.clone()).track(graph)?;
    graph.validate_lineages()?;

    let timelines = EdgeTracker::new(config.t1_start).track_edges(graph)?;
    let tiles = PolygonalCellTiles::build_from(graph, config.t1_start);
    let detected = detect_transitions(graph, &tiles, &timelines)?;
    let total = detected.len();
    let transitions = config.filter.apply(detected);
    debug!(detected = total, kept = transitions.len(), "Filtered T1 transitions");

    info!(
        frames = report.frames,
        links = report.links,
        divisions = report.divisions,
        eliminations = report.eliminations,
        edges = timelines.len(),
        transitions = transitions.len(),
        "Pipeline finished"
    );

    Ok(PipelineOutput {
        report,
        timelines,
        filtered_out: total - transitions.len(),
        transitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn strip(t: usize) -> Vec<Polygon<f64>> {
        let dx = t as f64 * 0.05;
        (0..3)
            .map(|i| {
                let x = i as f64 + dx;
                polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0)]
            })
            .collect()
    }

    #[test]
    fn test_build_graph_derives_adjacency_and_border() {
        let graph = build_graph((0..2).map(strip), &PipelineConfig::default()).unwrap();
        assert_eq!(graph.size(), 2);
        let frame = graph.frame(0).unwrap();
        assert_eq!(frame.edge_count(), 2);
        assert!(frame.cells().all(|(_, c)| c.on_boundary()));
    }

    #[test]
    fn test_pipeline_on_stable_strip() {
        let config = PipelineConfig::default();
        let mut graph = build_graph((0..4).map(strip), &config).unwrap();
        let output = run_pipeline(&mut graph, &config).unwrap();

        assert_eq!(output.report.links, 9);
        assert_eq!(output.timelines.len(), 2);
        assert!(output.transitions.is_empty());
        assert_eq!(output.filtered_out, 0);
    }

    #[test]
    fn test_pipeline_rejects_late_start() {
        let config = PipelineConfig {
            t1_start: 5,
            ..Default::default()
        };
        let mut graph = build_graph((0..2).map(strip), &config).unwrap();
        assert!(matches!(
            run_pipeline(&mut graph, &config),
            Err(TrackingError::Graph(GraphError::OutOfRange { index: 5, size: 2 }))
        ));
    }
}
