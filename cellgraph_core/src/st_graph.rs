//! Spatio-Temporal Graph - the ordered frames of one tracking session.
//!
//! Owns every [`FrameGraph`], the running track-id counter and the event
//! records. Lineage links between cells of different frames are only changed
//! through the methods here, so both ends of a link are always updated
//! together.

use std::collections::HashSet;

use crate::cell::{Cell, CellRef, Division, Elimination, TrackId};
use crate::error::GraphError;
use crate::frame_graph::FrameGraph;
use crate::pairing::MAX_TRACK_ID;

#[derive(Debug, Clone, Default)]
pub struct SpatioTemporalGraph {
    frames: Vec<FrameGraph>,
    has_tracking: bool,
    has_voronoi: bool,
    /// Next id to hand out
    running_track_id: u64,
    divisions: Vec<Division>,
    eliminations: Vec<Elimination>,
}

impl SpatioTemporalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from frames numbered `0..n` in order.
    pub fn from_frames(frames: Vec<FrameGraph>) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for (t, frame) in frames.into_iter().enumerate() {
            graph.set_frame(frame, t)?;
        }
        Ok(graph)
    }

    // ========================================================================
    // FRAMES
    // ========================================================================

    pub fn size(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, t: usize) -> Result<&FrameGraph, GraphError> {
        self.frames.get(t).ok_or(GraphError::OutOfRange {
            index: t,
            size: self.frames.len(),
        })
    }

    pub fn frame_mut(&mut self, t: usize) -> Result<&mut FrameGraph, GraphError> {
        let size = self.frames.len();
        self.frames
            .get_mut(t)
            .ok_or(GraphError::OutOfRange { index: t, size })
    }

    pub fn frames(&self) -> &[FrameGraph] {
        &self.frames
    }

    /// Replaces frame `t`, or appends it when `t == size()`.
    pub fn set_frame(&mut self, frame: FrameGraph, t: usize) -> Result<(), GraphError> {
        if frame.frame_no() != t {
            return Err(GraphError::FrameNumberMismatch {
                expected: t,
                found: frame.frame_no(),
            });
        }
        match t.cmp(&self.frames.len()) {
            std::cmp::Ordering::Less => self.frames[t] = frame,
            std::cmp::Ordering::Equal => self.frames.push(frame),
            std::cmp::Ordering::Greater => {
                return Err(GraphError::OutOfRange {
                    index: t,
                    size: self.frames.len(),
                })
            }
        }
        Ok(())
    }

    // ========================================================================
    // METADATA
    // ========================================================================

    pub fn has_tracking(&self) -> bool {
        self.has_tracking
    }

    pub fn set_tracking(&mut self, has_tracking: bool) {
        self.has_tracking = has_tracking;
    }

    pub fn has_voronoi(&self) -> bool {
        self.has_voronoi
    }

    pub fn set_voronoi(&mut self, has_voronoi: bool) {
        self.has_voronoi = has_voronoi;
    }

    /// Hands out the next unused track id. Ids are never reused.
    pub fn allocate_track_id(&mut self) -> Result<u32, GraphError> {
        if self.running_track_id > MAX_TRACK_ID as u64 {
            return Err(GraphError::TrackIdExhausted);
        }
        let id = self.running_track_id as u32;
        self.running_track_id += 1;
        Ok(id)
    }

    /// Raises the counter past `highest`, e.g. after loading external tracks.
    pub fn update_running_track_id(&mut self, highest: u32) {
        self.running_track_id = self.running_track_id.max(highest as u64 + 1);
    }

    pub fn running_track_id(&self) -> u64 {
        self.running_track_id
    }

    pub fn divisions(&self) -> &[Division] {
        &self.divisions
    }

    pub fn eliminations(&self) -> &[Elimination] {
        &self.eliminations
    }

    // ========================================================================
    // CELLS & LINEAGES
    // ========================================================================

    pub fn cell(&self, r: CellRef) -> Result<&Cell, GraphError> {
        self.frame(r.frame)?
            .cell(r.node_index())
            .ok_or(GraphError::UnknownCell(r))
    }

    pub(crate) fn cell_mut(&mut self, r: CellRef) -> Result<&mut Cell, GraphError> {
        self.frame_mut(r.frame)?
            .cell_mut(r.node_index())
            .ok_or(GraphError::UnknownCell(r))
    }

    pub fn set_track_id(&mut self, r: CellRef, track_id: TrackId) -> Result<(), GraphError> {
        self.frame_mut(r.frame)?.set_track_id(r.node_index(), track_id)
    }

    /// Gives a cell a fresh track id and makes it the root of its lineage.
    pub fn start_lineage(&mut self, r: CellRef) -> Result<u32, GraphError> {
        self.cell(r)?;
        let id = self.allocate_track_id()?;
        self.set_track_id(r, TrackId::Valid(id))?;
        self.cell_mut(r)?.first = Some(r);
        Ok(id)
    }

    /// Continues the lineage of `previous` with `next`.
    pub fn link(&mut self, previous: CellRef, next: CellRef) -> Result<(), GraphError> {
        if previous.frame >= next.frame {
            return Err(GraphError::LineageViolation(format!(
                "cannot link {} to earlier or same-frame cell {}",
                previous, next
            )));
        }
        let prev_cell = self.cell(previous)?;
        let (id, root) = match (prev_cell.track_id(), prev_cell.first()) {
            (TrackId::Valid(id), Some(root)) => (id, root),
            _ => {
                return Err(GraphError::LineageViolation(format!(
                    "{} has no lineage to continue",
                    previous
                )))
            }
        };
        if prev_cell.next().is_some_and(|n| n != next) {
            return Err(GraphError::LineageViolation(format!("{} already has a successor", previous)));
        }
        if self.cell(next)?.previous().is_some_and(|p| p != previous) {
            return Err(GraphError::LineageViolation(format!("{} already has a predecessor", next)));
        }

        self.set_track_id(next, TrackId::Valid(id))?;
        let next_cell = self.cell_mut(next)?;
        next_cell.previous = Some(previous);
        next_cell.first = Some(root);
        self.cell_mut(previous)?.next = Some(next);
        Ok(())
    }

    /// Removes the link between two cells. The track id of `next` is kept.
    pub fn unlink(&mut self, previous: CellRef, next: CellRef) -> Result<(), GraphError> {
        if self.cell(previous)?.next() != Some(next) || self.cell(next)?.previous() != Some(previous) {
            return Err(GraphError::LineageViolation(format!(
                "{} and {} are not linked",
                previous, next
            )));
        }
        self.cell_mut(previous)?.next = None;
        let next_cell = self.cell_mut(next)?;
        next_cell.previous = None;
        next_cell.first = None;
        Ok(())
    }

    pub fn record_division(&mut self, mother: CellRef, children: [CellRef; 2]) -> Result<usize, GraphError> {
        let index = self.divisions.len();
        for r in [mother, children[0], children[1]] {
            self.cell_mut(r)?.division = Some(index);
        }
        self.divisions.push(Division {
            mother,
            children,
            time: children[0].frame,
        });
        Ok(index)
    }

    pub fn record_elimination(&mut self, cell: CellRef) -> Result<usize, GraphError> {
        let index = self.eliminations.len();
        self.cell_mut(cell)?.elimination = Some(index);
        self.eliminations.push(Elimination { cell, time: cell.frame });
        Ok(index)
    }

    /// Cells of the lineage starting at `root`, following `next` links.
    pub fn lineage(&self, root: CellRef) -> Result<Vec<CellRef>, GraphError> {
        let mut chain = vec![root];
        let mut current = root;
        while let Some(next) = self.cell(current)?.next() {
            if chain.len() > self.frames.len() {
                return Err(GraphError::LineageViolation(format!("cycle after {}", root)));
            }
            chain.push(next);
            current = next;
        }
        Ok(chain)
    }

    /// Last cell of the lineage starting at `root`.
    pub fn lineage_end(&self, root: CellRef) -> Result<CellRef, GraphError> {
        self.lineage(root)?
            .last()
            .copied()
            .ok_or(GraphError::UnknownCell(root))
    }

    /// Clears every track id, link and event so a tracking pass can start over.
    ///
    /// The running counter is kept, so ids from an earlier pass are not reused.
    pub fn reset_tracking(&mut self) -> Result<(), GraphError> {
        for t in 0..self.frames.len() {
            let nodes: Vec<_> = self.frames[t].nodes().collect();
            for node in nodes {
                self.frames[t].set_track_id(node, TrackId::Untracked)?;
                let cell = self.frames[t]
                    .cell_mut(node)
                    .ok_or(GraphError::UnknownCell(CellRef::new(t, node)))?;
                cell.previous = None;
                cell.next = None;
                cell.first = None;
                cell.division = None;
                cell.elimination = None;
            }
        }
        self.divisions.clear();
        self.eliminations.clear();
        self.has_tracking = false;
        Ok(())
    }

    /// Checks link symmetry, root consistency and per-frame id uniqueness.
    pub fn validate_lineages(&self) -> Result<(), GraphError> {
        for (t, frame) in self.frames.iter().enumerate() {
            let mut seen = HashSet::new();
            for (node, cell) in frame.cells() {
                let here = CellRef::new(t, node);

                if let Some(id) = cell.track_id().value() {
                    if !seen.insert(id) {
                        return Err(GraphError::DuplicateTrackId { frame: t, track_id: id });
                    }
                }

                if let Some(next) = cell.next() {
                    if self.cell(next)?.previous() != Some(here) {
                        return Err(GraphError::LineageViolation(format!(
                            "{} points to {} which does not point back",
                            here, next
                        )));
                    }
                }

                if let Some(prev) = cell.previous() {
                    if prev.frame >= t || self.cell(prev)?.next() != Some(here) {
                        return Err(GraphError::LineageViolation(format!(
                            "{} has inconsistent predecessor {}",
                            here, prev
                        )));
                    }
                }

                // Walk back to the root; frames strictly decrease so this ends
                let mut root = here;
                while let Some(prev) = self.cell(root)?.previous() {
                    root = prev;
                }
                match cell.first() {
                    Some(first) if first == root => {}
                    None if cell.previous().is_none() => {}
                    other => {
                        return Err(GraphError::LineageViolation(format!(
                            "{} has root {:?} but its chain starts at {}",
                            here, other, root
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use petgraph::graph::NodeIndex;

    fn single_cell_frame(t: usize) -> FrameGraph {
        let mut frame = FrameGraph::new(t);
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        frame.add_cell(Cell::new(poly, t).unwrap()).unwrap();
        frame
    }

    fn r(frame: usize) -> CellRef {
        CellRef::new(frame, NodeIndex::new(0))
    }

    #[test]
    fn test_set_frame_append_replace_and_reject() {
        let mut graph = SpatioTemporalGraph::new();
        graph.set_frame(single_cell_frame(0), 0).unwrap();
        graph.set_frame(single_cell_frame(1), 1).unwrap();
        assert_eq!(graph.size(), 2);

        graph.set_frame(single_cell_frame(1), 1).unwrap();
        assert_eq!(graph.size(), 2);

        assert_eq!(
            graph.set_frame(single_cell_frame(3), 3),
            Err(GraphError::OutOfRange { index: 3, size: 2 })
        );
        assert_eq!(
            graph.set_frame(single_cell_frame(0), 2),
            Err(GraphError::FrameNumberMismatch { expected: 2, found: 0 })
        );
        assert!(matches!(graph.frame(5), Err(GraphError::OutOfRange { index: 5, size: 2 })));
    }

    #[test]
    fn test_track_ids_are_monotonic() {
        let mut graph = SpatioTemporalGraph::new();
        assert_eq!(graph.allocate_track_id().unwrap(), 0);
        assert_eq!(graph.allocate_track_id().unwrap(), 1);
        graph.update_running_track_id(10);
        assert_eq!(graph.allocate_track_id().unwrap(), 11);
        graph.update_running_track_id(3);
        assert_eq!(graph.allocate_track_id().unwrap(), 12);
    }

    #[test]
    fn test_track_id_exhaustion() {
        let mut graph = SpatioTemporalGraph::new();
        graph.update_running_track_id(MAX_TRACK_ID - 1);
        assert_eq!(graph.allocate_track_id().unwrap(), MAX_TRACK_ID);
        assert_eq!(graph.allocate_track_id(), Err(GraphError::TrackIdExhausted));
    }

    #[test]
    fn test_link_builds_consistent_chain() {
        let frames = (0..3).map(single_cell_frame).collect();
        let mut graph = SpatioTemporalGraph::from_frames(frames).unwrap();

        let id = graph.start_lineage(r(0)).unwrap();
        graph.link(r(0), r(1)).unwrap();
        graph.link(r(1), r(2)).unwrap();

        assert_eq!(graph.lineage(r(0)).unwrap(), vec![r(0), r(1), r(2)]);
        assert_eq!(graph.lineage_end(r(0)).unwrap(), r(2));
        assert_eq!(graph.cell(r(2)).unwrap().track_id(), TrackId::Valid(id));
        assert_eq!(graph.cell(r(2)).unwrap().first(), Some(r(0)));
        assert!(graph.frame(2).unwrap().has_track_id(id));
        graph.validate_lineages().unwrap();
    }

    #[test]
    fn test_link_rejects_bad_input() {
        let frames = (0..3).map(single_cell_frame).collect();
        let mut graph = SpatioTemporalGraph::from_frames(frames).unwrap();

        // Untracked cells carry no lineage
        assert!(matches!(graph.link(r(0), r(1)), Err(GraphError::LineageViolation(_))));

        graph.start_lineage(r(0)).unwrap();
        assert!(matches!(graph.link(r(1), r(0)), Err(GraphError::LineageViolation(_))));

        graph.link(r(0), r(1)).unwrap();
        // A second successor is refused
        assert!(matches!(graph.link(r(0), r(2)), Err(GraphError::LineageViolation(_))));
    }

    #[test]
    fn test_unlink_and_restart() {
        let frames = (0..2).map(single_cell_frame).collect();
        let mut graph = SpatioTemporalGraph::from_frames(frames).unwrap();
        let first = graph.start_lineage(r(0)).unwrap();
        graph.link(r(0), r(1)).unwrap();

        graph.unlink(r(0), r(1)).unwrap();
        let second = graph.start_lineage(r(1)).unwrap();
        assert_ne!(first, second);
        assert_eq!(graph.cell(r(1)).unwrap().first(), Some(r(1)));
        assert!(graph.cell(r(0)).unwrap().next().is_none());
        graph.validate_lineages().unwrap();

        assert!(graph.unlink(r(0), r(1)).is_err());
    }

    #[test]
    fn test_events_are_recorded_on_cells() {
        let frames = (0..2).map(single_cell_frame).collect();
        let mut graph = SpatioTemporalGraph::from_frames(frames).unwrap();
        let idx = graph.record_elimination(r(1)).unwrap();
        assert_eq!(graph.eliminations()[idx].time, 1);
        assert_eq!(graph.cell(r(1)).unwrap().elimination(), Some(idx));
    }

    #[test]
    fn test_reset_keeps_counter() {
        let frames = (0..2).map(single_cell_frame).collect();
        let mut graph = SpatioTemporalGraph::from_frames(frames).unwrap();
        graph.start_lineage(r(0)).unwrap();
        graph.link(r(0), r(1)).unwrap();
        graph.set_tracking(true);

        graph.reset_tracking().unwrap();
        assert!(!graph.has_tracking());
        assert_eq!(graph.cell(r(1)).unwrap().track_id(), TrackId::Untracked);
        assert!(graph.cell(r(0)).unwrap().next().is_none());
        assert_eq!(graph.start_lineage(r(0)).unwrap(), 1);
    }
}
