//! JSON input of segmented frames.
//!
//! ```json
//! { "frames": [ { "polygons": [[[0,0],[1,0],[1,1],[0,1]], ...],
//!                 "adjacency": [[0,1], ...],
//!                 "boundary": [true, false, ...] } ] }
//! ```
//!
//! `adjacency` and `boundary` are optional per frame. Without them adjacency
//! comes from shared boundaries and border flags from border marking.

use cellgraph_core::{mark_border_cells, Cell, FrameGraph, SpatioTemporalGraph};
use geo::{LineString, Polygon};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::info;

use crate::error::SimError;
use crate::pipeline::PipelineConfig;

/// One segmented frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameInput {
    /// Exterior rings, one per cell
    pub polygons: Vec<Vec<[f64; 2]>>,

    /// Explicit neighbor pairs by polygon index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacency: Option<Vec<[usize; 2]>>,

    /// Explicit border flags by polygon index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<Vec<bool>>,
}

/// A whole time-lapse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TissueInput {
    pub frames: Vec<FrameInput>,
}

impl TissueInput {
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON file.
    pub fn load(path: &str) -> Result<Self, SimError> {
        let json = fs::read_to_string(path)?;
        let input = Self::from_json(&json)?;
        info!("Loaded {} frames from {}", input.frames.len(), path);
        Ok(input)
    }

    /// Builds the spatio-temporal graph, honoring explicit adjacency and flags.
    pub fn build_graph(&self, config: &PipelineConfig) -> Result<SpatioTemporalGraph, SimError> {
        let mut frames = Vec::with_capacity(self.frames.len());
        for (t, input) in self.frames.iter().enumerate() {
            frames.push(input.build(t, config)?);
        }
        Ok(SpatioTemporalGraph::from_frames(frames)?)
    }
}

impl FrameInput {
    fn polygon(ring: &[[f64; 2]]) -> Polygon<f64> {
        let coords: Vec<(f64, f64)> = ring.iter().map(|p| (p[0], p[1])).collect();
        Polygon::new(LineString::from(coords), vec![])
    }

    fn build(&self, t: usize, config: &PipelineConfig) -> Result<FrameGraph, SimError> {
        let polygons = self.polygons.iter().map(|ring| Self::polygon(ring));

        let mut frame = match &self.adjacency {
            None => FrameGraph::from_polygons(t, polygons, config.tolerance)?,
            Some(pairs) => {
                let mut frame = FrameGraph::new(t);
                let mut nodes = Vec::with_capacity(self.polygons.len());
                for polygon in polygons {
                    nodes.push(frame.add_cell(Cell::new(polygon, t)?)?);
                }
                for &[a, b] in pairs {
                    let (Some(&na), Some(&nb)) = (nodes.get(a), nodes.get(b)) else {
                        return Err(SimError::InvalidInput {
                            frame: t,
                            reason: format!("adjacency ({}, {}) refers to a missing polygon", a, b),
                        });
                    };
                    frame.add_edge(na, nb)?;
                }
                frame
            }
        };

        match &self.boundary {
            None => {
                mark_border_cells(&mut frame, config.min_exposed_length)?;
            }
            Some(flags) => {
                if flags.len() != frame.size() {
                    return Err(SimError::InvalidInput {
                        frame: t,
                        reason: format!("{} boundary flags for {} polygons", flags.len(), frame.size()),
                    });
                }
                let nodes: Vec<_> = frame.nodes().collect();
                for (node, &flag) in nodes.into_iter().zip(flags) {
                    frame.set_boundary(node, flag)?;
                }
            }
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgraph_core::GraphError;

    const TWO_SQUARES: &str = r#"{
        "frames": [
            { "polygons": [ [[0,0],[1,0],[1,1],[0,1]], [[1,0],[2,0],[2,1],[1,1]] ] },
            { "polygons": [ [[0,0],[1,0],[1,1],[0,1]], [[1,0],[2,0],[2,1],[1,1]] ],
              "adjacency": [],
              "boundary": [false, true] }
        ]
    }"#;

    #[test]
    fn test_derived_and_explicit_frames() {
        let input = TissueInput::from_json(TWO_SQUARES).unwrap();
        let graph = input.build_graph(&PipelineConfig::default()).unwrap();

        let derived = graph.frame(0).unwrap();
        assert_eq!(derived.edge_count(), 1);
        assert!(derived.cells().all(|(_, c)| c.on_boundary()));

        let explicit = graph.frame(1).unwrap();
        assert_eq!(explicit.edge_count(), 0);
        let flags: Vec<bool> = explicit.cells().map(|(_, c)| c.on_boundary()).collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_bad_adjacency_index() {
        let json = r#"{ "frames": [ { "polygons": [ [[0,0],[1,0],[1,1]] ], "adjacency": [[0, 3]] } ] }"#;
        let err = TissueInput::from_json(json)
            .unwrap()
            .build_graph(&PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidInput { frame: 0, .. }));
    }

    #[test]
    fn test_flag_count_mismatch() {
        let json = r#"{ "frames": [ { "polygons": [ [[0,0],[1,0],[1,1]] ], "boundary": [] } ] }"#;
        let err = TissueInput::from_json(json)
            .unwrap()
            .build_graph(&PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidInput { frame: 0, .. }));
    }

    #[test]
    fn test_degenerate_polygon() {
        let json = r#"{ "frames": [ { "polygons": [ [] ], "adjacency": [] } ] }"#;
        let err = TissueInput::from_json(json)
            .unwrap()
            .build_graph(&PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(err, SimError::Graph(GraphError::DegenerateGeometry { frame: 0 })));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(TissueInput::from_json("{ \"frames\": 3 }"), Err(SimError::Json(_))));
    }
}
