//! Edge Tracking - presence timelines of neighbor relationships.
//!
//! Each edge of the starting frame is followed through later frames by the
//! pair code of its endpoint track ids. A missing edge only counts as a gap
//! while both endpoint cells are still present. When an endpoint vanishes:
//! - from the tissue border, the timeline is truncated (inconclusive)
//! - from the interior, the edge is abandoned (a tracking problem, not a T1)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{GraphError, TrackingError};
use crate::pairing;
use crate::st_graph::SpatioTemporalGraph;

// ============================================================================
// TIMELINES
// ============================================================================

/// Presence timelines keyed by pair code. Index 0 is the starting frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTimelines {
    starting_frame: usize,
    timelines: BTreeMap<u64, Vec<bool>>,
}

impl EdgeTimelines {
    pub fn starting_frame(&self) -> usize {
        self.starting_frame
    }

    pub fn get(&self, pair_code: u64) -> Option<&[bool]> {
        self.timelines.get(&pair_code).map(Vec::as_slice)
    }

    /// Timeline of the edge between two track ids, in either order.
    pub fn get_pair(&self, a: u32, b: u32) -> Option<&[bool]> {
        self.get(pairing::encode(a, b))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[bool])> + '_ {
        self.timelines.iter().map(|(code, tl)| (*code, tl.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<u64, Vec<bool>> {
        self.timelines
    }
}

// ============================================================================
// TRACKER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeTracker {
    starting_frame: usize,
}

impl EdgeTracker {
    pub fn new(starting_frame: usize) -> Self {
        Self { starting_frame }
    }

    pub fn starting_frame(&self) -> usize {
        self.starting_frame
    }

    /// Builds presence timelines for every tracked edge of the starting frame.
    pub fn track_edges(&self, graph: &SpatioTemporalGraph) -> Result<EdgeTimelines, TrackingError> {
        if !graph.has_tracking() {
            return Err(TrackingError::TrackingRequired);
        }
        let start = self.starting_frame;
        let size = graph.size();
        if start >= size {
            return Err(GraphError::OutOfRange { index: start, size }.into());
        }
        let length = size - start;

        let mut timelines: BTreeMap<u64, Vec<bool>> = BTreeMap::new();
        let first = graph.frame(start)?;
        for e in first.edges() {
            if let Some(code) = first.pair_code(e) {
                let mut tl = vec![false; length];
                tl[0] = true;
                timelines.insert(code, tl);
            }
        }
        info!(start, edges = timelines.len(), "Tracking edges");

        for i in start + 1..size {
            let offset = i - start;
            let frame = graph.frame(i)?;
            let previous = graph.frame(i - 1)?;

            for e in frame.edges() {
                if let Some(code) = frame.pair_code(e) {
                    if let Some(tl) = timelines.get_mut(&code) {
                        // Truncated timelines stop recording
                        if offset < tl.len() {
                            tl[offset] = true;
                        }
                    }
                }
            }

            let mut abandoned = Vec::new();
            for (&code, tl) in timelines.iter_mut() {
                if offset >= tl.len() {
                    continue;
                }
                let (a, b) = pairing::decode(code);
                let mut missing_interior = false;
                let mut missing_border = false;
                for id in [a, b] {
                    if frame.has_track_id(id) {
                        continue;
                    }
                    let cell = previous
                        .cell_by_track_id(id)
                        .ok_or(TrackingError::MissingCell { track_id: id, frame: i - 1 })?;
                    if cell.on_boundary() {
                        missing_border = true;
                    } else {
                        missing_interior = true;
                    }
                }

                if missing_interior {
                    abandoned.push(code);
                } else if missing_border {
                    tl.truncate(offset);
                }
            }

            if !abandoned.is_empty() {
                debug!(frame = i, count = abandoned.len(), "Abandoning edges with vanished interior cells");
            }
            for code in abandoned {
                timelines.remove(&code);
            }
        }

        Ok(EdgeTimelines {
            starting_frame: start,
            timelines,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, TrackId};
    use crate::frame_graph::FrameGraph;
    use geo::polygon;
    use petgraph::graph::NodeIndex;

    /// Frame with cells carrying the given track ids and explicit adjacency.
    fn frame(t: usize, ids: &[u32], edges: &[(u32, u32)], border: &[u32]) -> FrameGraph {
        let mut frame = FrameGraph::new(t);
        for (i, &id) in ids.iter().enumerate() {
            let x = i as f64;
            let poly = polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0)];
            let node = frame.add_cell(Cell::new(poly, t).unwrap()).unwrap();
            frame.set_track_id(node, TrackId::Valid(id)).unwrap();
            frame.set_boundary(node, border.contains(&id)).unwrap();
        }
        for &(a, b) in edges {
            let na = frame.node_by_track_id(a).unwrap();
            let nb = frame.node_by_track_id(b).unwrap();
            frame.add_edge(na, nb).unwrap();
        }
        frame
    }

    fn tracked(frames: Vec<FrameGraph>) -> SpatioTemporalGraph {
        let mut graph = SpatioTemporalGraph::from_frames(frames).unwrap();
        graph.set_tracking(true);
        graph
    }

    #[test]
    fn test_requires_tracking_and_valid_start() {
        let mut graph = SpatioTemporalGraph::from_frames(vec![frame(0, &[1, 2], &[(1, 2)], &[])]).unwrap();
        assert_eq!(EdgeTracker::new(0).track_edges(&graph), Err(TrackingError::TrackingRequired));
        graph.set_tracking(true);
        assert_eq!(
            EdgeTracker::new(1).track_edges(&graph),
            Err(TrackingError::Graph(GraphError::OutOfRange { index: 1, size: 1 }))
        );
    }

    #[test]
    fn test_edge_survival_timeline() {
        // 1 and 2 are adjacent for three frames, then separated but both present
        let adjacent = |t| frame(t, &[1, 2, 3], &[(1, 2), (2, 3), (1, 3)], &[]);
        let apart = |t| frame(t, &[1, 2, 3], &[(2, 3), (1, 3)], &[]);
        let graph = tracked(vec![adjacent(0), adjacent(1), adjacent(2), apart(3), apart(4)]);

        let timelines = EdgeTracker::new(0).track_edges(&graph).unwrap();
        assert_eq!(timelines.get_pair(1, 2), Some(&[true, true, true, false, false][..]));
        assert_eq!(timelines.get_pair(2, 3), Some(&[true; 5][..]));
        assert_eq!(timelines.len(), 3);
    }

    #[test]
    fn test_boundary_disappearance_truncates() {
        let with_two = |t| frame(t, &[1, 2, 3], &[(1, 2), (1, 3)], &[2]);
        let without_two = |t| frame(t, &[1, 3], &[(1, 3)], &[]);
        let graph = tracked(vec![with_two(0), with_two(1), with_two(2), without_two(3), without_two(4)]);

        let timelines = EdgeTracker::new(0).track_edges(&graph).unwrap();
        assert_eq!(timelines.get_pair(1, 2), Some(&[true, true, true][..]));
        assert_eq!(timelines.get_pair(1, 3), Some(&[true; 5][..]));
    }

    #[test]
    fn test_interior_disappearance_abandons() {
        let with_two = |t| frame(t, &[1, 2, 3], &[(1, 2), (1, 3)], &[]);
        let without_two = |t| frame(t, &[1, 3], &[(1, 3)], &[]);
        let graph = tracked(vec![with_two(0), with_two(1), without_two(2)]);

        let timelines = EdgeTracker::new(0).track_edges(&graph).unwrap();
        assert_eq!(timelines.get_pair(1, 2), None);
        assert_eq!(timelines.len(), 1);
    }

    #[test]
    fn test_untracked_endpoints_are_ignored() {
        let mut f0 = frame(0, &[1, 2], &[(1, 2)], &[]);
        let extra = f0
            .add_cell(Cell::new(polygon![(x: 5.0, y: 0.0), (x: 6.0, y: 0.0), (x: 6.0, y: 1.0)], 0).unwrap())
            .unwrap();
        f0.add_edge(NodeIndex::new(0), extra).unwrap();
        let graph = tracked(vec![f0]);

        let timelines = EdgeTracker::new(0).track_edges(&graph).unwrap();
        assert_eq!(timelines.len(), 1);
    }

    #[test]
    fn test_starting_frame_offsets_timelines() {
        let adjacent = |t| frame(t, &[1, 2], &[(1, 2)], &[]);
        let apart = |t| frame(t, &[1, 2], &[], &[]);
        let graph = tracked(vec![apart(0), adjacent(1), apart(2)]);

        let timelines = EdgeTracker::new(1).track_edges(&graph).unwrap();
        assert_eq!(timelines.starting_frame(), 1);
        assert_eq!(timelines.get_pair(2, 1), Some(&[true, false][..]));
    }

    #[test]
    fn test_rerun_is_identical() {
        let adjacent = |t| frame(t, &[1, 2, 3], &[(1, 2), (2, 3)], &[3]);
        let apart = |t| frame(t, &[1, 2], &[], &[]);
        let graph = tracked(vec![adjacent(0), adjacent(1), apart(2), apart(3)]);

        let tracker = EdgeTracker::new(0);
        let first = tracker.track_edges(&graph).unwrap();
        let second = tracker.track_edges(&graph).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
