//! Frame Graph - the planar cell adjacency graph of one time point.
//!
//! Vertices are [`Cell`]s, edges are shared boundaries. Two indices sit next
//! to the petgraph storage:
//! 1. track id -> node, for O(1) identity lookup across frames
//! 2. pair code -> edge, for O(1) neighbor-relationship lookup
//!
//! Both indices are rewritten inside the same call that changes a track id or
//! adds an edge, so they never go stale. Nodes and edges are never removed,
//! which keeps `NodeIndex` values (and therefore [`CellRef`]s) stable.

use geo::{MultiLineString, Point};
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::cell::OnceCell;
use std::collections::HashMap;

use crate::cell::{Cell, CellRef, TrackId};
use crate::error::GraphError;
use crate::geometry::{self, DEFAULT_TOLERANCE};
use crate::pairing;

// ============================================================================
// EDGE
// ============================================================================

/// Neighbor relationship between two cells of the same frame.
#[derive(Debug, Clone, Default)]
pub struct Edge {
    /// Shared boundary, computed on first request
    geometry: OnceCell<MultiLineString<f64>>,
}

impl Edge {
    fn with_geometry(geometry: MultiLineString<f64>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(geometry);
        Self { geometry: cell }
    }
}

// ============================================================================
// FRAME GRAPH
// ============================================================================

#[derive(Debug, Clone)]
pub struct FrameGraph {
    frame_no: usize,
    graph: UnGraph<Cell, Edge>,
    track_index: HashMap<u32, NodeIndex>,
    pair_index: HashMap<u64, EdgeIndex>,
    tolerance: f64,
}

impl FrameGraph {
    pub fn new(frame_no: usize) -> Self {
        Self {
            frame_no,
            graph: UnGraph::default(),
            track_index: HashMap::new(),
            pair_index: HashMap::new(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Builds a frame from polygons, deriving adjacency from shared boundaries.
    ///
    /// Cells keep the order of `polygons`, so node `i` is polygon `i`.
    pub fn from_polygons<I>(frame_no: usize, polygons: I, tolerance: f64) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = geo::Polygon<f64>>,
    {
        let mut frame = Self::new(frame_no);
        frame.tolerance = tolerance;
        for polygon in polygons {
            frame.add_cell(Cell::new(polygon, frame_no)?)?;
        }

        let nodes: Vec<NodeIndex> = frame.graph.node_indices().collect();
        for (i, &a) in nodes.iter().enumerate() {
            for &b in &nodes[i + 1..] {
                let shared = geometry::shared_boundary(
                    frame.graph[a].geometry(),
                    frame.graph[b].geometry(),
                    tolerance,
                );
                if geometry::boundary_length(&shared) > tolerance {
                    let e = frame.graph.add_edge(a, b, Edge::with_geometry(shared));
                    frame.index_edge(e);
                }
            }
        }
        Ok(frame)
    }

    pub fn frame_no(&self) -> usize {
        self.frame_no
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Number of cells.
    pub fn size(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Adds a cell. A cell carrying a valid track id is indexed immediately.
    pub fn add_cell(&mut self, cell: Cell) -> Result<NodeIndex, GraphError> {
        if let Some(id) = cell.track_id().value() {
            if self.track_index.contains_key(&id) {
                return Err(GraphError::DuplicateTrackId {
                    frame: self.frame_no,
                    track_id: id,
                });
            }
        }
        let node = self.graph.add_node(cell);
        if let Some(id) = self.graph[node].track_id().value() {
            self.track_index.insert(id, node);
        }
        Ok(node)
    }

    /// Connects two cells. Adding an existing edge returns it unchanged.
    pub fn add_edge(&mut self, a: NodeIndex, b: NodeIndex) -> Result<EdgeIndex, GraphError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if a == b {
            return Err(GraphError::SelfLoop);
        }
        if let Some(e) = self.graph.find_edge(a, b) {
            return Ok(e);
        }
        let e = self.graph.add_edge(a, b, Edge::default());
        self.index_edge(e);
        Ok(e)
    }

    /// Assigns a track id and refreshes both indices.
    pub fn set_track_id(&mut self, node: NodeIndex, track_id: TrackId) -> Result<(), GraphError> {
        self.check_node(node)?;
        if let Some(id) = track_id.value() {
            if let Some(&owner) = self.track_index.get(&id) {
                if owner != node {
                    return Err(GraphError::DuplicateTrackId {
                        frame: self.frame_no,
                        track_id: id,
                    });
                }
            }
        }

        let incident: Vec<EdgeIndex> = self.graph.edges(node).map(|e| e.id()).collect();

        // Drop entries keyed by the old id
        if let Some(old) = self.graph[node].track_id().value() {
            self.track_index.remove(&old);
            for &e in &incident {
                if let Some(code) = self.pair_code(e) {
                    if self.pair_index.get(&code) == Some(&e) {
                        self.pair_index.remove(&code);
                    }
                }
            }
        }

        self.graph[node].track_id = track_id;
        if let Some(id) = track_id.value() {
            self.track_index.insert(id, node);
        }
        for e in incident {
            self.index_edge(e);
        }
        Ok(())
    }

    pub fn set_boundary(&mut self, node: NodeIndex, on_boundary: bool) -> Result<(), GraphError> {
        self.check_node(node)?;
        self.graph[node].on_boundary = on_boundary;
        Ok(())
    }

    pub(crate) fn cell_mut(&mut self, node: NodeIndex) -> Option<&mut Cell> {
        self.graph.node_weight_mut(node)
    }

    fn index_edge(&mut self, e: EdgeIndex) {
        if let Some(code) = self.pair_code(e) {
            self.pair_index.insert(code, e);
        }
    }

    fn check_node(&self, node: NodeIndex) -> Result<(), GraphError> {
        if node.index() < self.graph.node_count() {
            Ok(())
        } else {
            Err(GraphError::UnknownCell(CellRef::new(self.frame_no, node)))
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn cell(&self, node: NodeIndex) -> Option<&Cell> {
        self.graph.node_weight(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn cells(&self) -> impl Iterator<Item = (NodeIndex, &Cell)> + '_ {
        self.graph.node_indices().map(move |n| (n, &self.graph[n]))
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    /// Neighbors of a cell, sorted by node index.
    pub fn neighbors_of(&self, node: NodeIndex) -> Vec<NodeIndex> {
        if node.index() >= self.graph.node_count() {
            return Vec::new();
        }
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        neighbors.sort();
        neighbors.dedup();
        neighbors
    }

    pub fn edge_between(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    pub fn edge_endpoints(&self, e: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(e)
    }

    /// Both endpoints carry valid track ids.
    pub fn is_tracked(&self, e: EdgeIndex) -> bool {
        self.pair_code(e).is_some()
    }

    /// Cantor code of the endpoint track ids, if both are valid.
    pub fn pair_code(&self, e: EdgeIndex) -> Option<u64> {
        let (a, b) = self.graph.edge_endpoints(e)?;
        let ia = self.graph[a].track_id().value()?;
        let ib = self.graph[b].track_id().value()?;
        Some(pairing::encode(ia, ib))
    }

    /// Shared boundary of an edge, computed lazily from the endpoint polygons.
    pub fn edge_geometry(&self, e: EdgeIndex) -> Option<&MultiLineString<f64>> {
        let (a, b) = self.graph.edge_endpoints(e)?;
        let edge = self.graph.edge_weight(e)?;
        Some(edge.geometry.get_or_init(|| {
            geometry::shared_boundary(self.graph[a].geometry(), self.graph[b].geometry(), self.tolerance)
        }))
    }

    pub fn has_track_id(&self, track_id: u32) -> bool {
        self.track_index.contains_key(&track_id)
    }

    pub fn node_by_track_id(&self, track_id: u32) -> Option<NodeIndex> {
        self.track_index.get(&track_id).copied()
    }

    pub fn cell_by_track_id(&self, track_id: u32) -> Option<&Cell> {
        self.node_by_track_id(track_id).map(|n| &self.graph[n])
    }

    pub fn edge_by_pair_code(&self, code: u64) -> Option<EdgeIndex> {
        self.pair_index.get(&code).copied()
    }

    /// True if the point lies inside or on the edge of any cell.
    pub fn covers(&self, point: &Point<f64>) -> bool {
        self.graph
            .node_weights()
            .any(|cell| geometry::covers_point(cell.geometry(), point))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Polygon};

    fn square(x: f64, y: f64) -> Polygon<f64> {
        polygon![(x: x, y: y), (x: x + 1.0, y: y), (x: x + 1.0, y: y + 1.0), (x: x, y: y + 1.0)]
    }

    /// 2x2 block of unit squares: 0 1 on the bottom row, 2 3 on top.
    fn block() -> FrameGraph {
        FrameGraph::from_polygons(
            0,
            vec![square(0.0, 0.0), square(1.0, 0.0), square(0.0, 1.0), square(1.0, 1.0)],
            DEFAULT_TOLERANCE,
        )
        .unwrap()
    }

    #[test]
    fn test_adjacency_from_polygons() {
        let frame = block();
        assert_eq!(frame.size(), 4);
        // Diagonal squares only touch at a corner
        assert_eq!(frame.edge_count(), 4);
        assert_eq!(frame.neighbors_of(NodeIndex::new(0)), vec![NodeIndex::new(1), NodeIndex::new(2)]);
        assert!(frame.edge_between(NodeIndex::new(0), NodeIndex::new(3)).is_none());
    }

    #[test]
    fn test_neighbor_index_matches_edges() {
        let frame = block();
        for n in frame.nodes() {
            for m in frame.neighbors_of(n) {
                assert!(frame.edge_between(n, m).is_some());
            }
        }
        for e in frame.edges() {
            let (a, b) = frame.edge_endpoints(e).unwrap();
            assert!(frame.neighbors_of(a).contains(&b));
            assert!(frame.neighbors_of(b).contains(&a));
        }
    }

    #[test]
    fn test_add_edge_rules() {
        let mut frame = FrameGraph::new(2);
        let a = frame.add_cell(Cell::new(square(0.0, 0.0), 2).unwrap()).unwrap();
        let b = frame.add_cell(Cell::new(square(1.0, 0.0), 2).unwrap()).unwrap();
        let e = frame.add_edge(a, b).unwrap();
        assert_eq!(frame.add_edge(b, a).unwrap(), e);
        assert_eq!(frame.edge_count(), 1);
        assert_eq!(frame.add_edge(a, a), Err(GraphError::SelfLoop));
        assert_eq!(
            frame.add_edge(a, NodeIndex::new(9)),
            Err(GraphError::UnknownCell(CellRef { frame: 2, node: 9 }))
        );
    }

    #[test]
    fn test_track_and_pair_indices() {
        let mut frame = block();
        let n = |i| NodeIndex::new(i);
        assert!(!frame.is_tracked(frame.edge_between(n(0), n(1)).unwrap()));

        for (i, id) in [10u32, 11, 12, 13].iter().enumerate() {
            frame.set_track_id(n(i), TrackId::Valid(*id)).unwrap();
        }
        assert!(frame.has_track_id(12));
        assert_eq!(frame.node_by_track_id(12), Some(n(2)));
        assert!(frame.cell_by_track_id(99).is_none());

        let e = frame.edge_between(n(0), n(1)).unwrap();
        let code = pairing::encode(10, 11);
        assert_eq!(frame.pair_code(e), Some(code));
        assert_eq!(frame.edge_by_pair_code(code), Some(e));

        // Re-keying a cell moves both indices
        frame.set_track_id(n(0), TrackId::Valid(20)).unwrap();
        assert!(!frame.has_track_id(10));
        assert_eq!(frame.edge_by_pair_code(code), None);
        assert_eq!(frame.edge_by_pair_code(pairing::encode(20, 11)), Some(e));

        // Status tags drop the cell out of both indices
        frame.set_track_id(n(0), TrackId::MissingNext).unwrap();
        assert!(!frame.has_track_id(20));
        assert_eq!(frame.edge_by_pair_code(pairing::encode(20, 11)), None);
        assert!(!frame.is_tracked(e));
    }

    #[test]
    fn test_duplicate_track_id_rejected() {
        let mut frame = block();
        frame.set_track_id(NodeIndex::new(0), TrackId::Valid(5)).unwrap();
        assert_eq!(
            frame.set_track_id(NodeIndex::new(1), TrackId::Valid(5)),
            Err(GraphError::DuplicateTrackId { frame: 0, track_id: 5 })
        );
        // Unchanged after the failed call
        assert_eq!(frame.cell(NodeIndex::new(1)).unwrap().track_id(), TrackId::Untracked);
        assert!(frame.set_track_id(NodeIndex::new(0), TrackId::Valid(5)).is_ok());
    }

    #[test]
    fn test_lazy_edge_geometry() {
        let mut frame = FrameGraph::new(0);
        let a = frame.add_cell(Cell::new(square(0.0, 0.0), 0).unwrap()).unwrap();
        let b = frame.add_cell(Cell::new(square(1.0, 0.0), 0).unwrap()).unwrap();
        let e = frame.add_edge(a, b).unwrap();
        let shared = frame.edge_geometry(e).unwrap();
        assert_eq!(shared.0.len(), 1);
    }

    #[test]
    fn test_covers() {
        let frame = block();
        assert!(frame.covers(&Point::new(1.5, 1.5)));
        assert!(frame.covers(&Point::new(2.0, 2.0)));
        assert!(!frame.covers(&Point::new(2.5, 0.5)));
    }
}
