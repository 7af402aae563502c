//! Polygonal cell tiles: per cell, the boundary shared with each neighbor.

use geo::MultiLineString;
use petgraph::graph::NodeIndex;
use std::collections::BTreeMap;

use crate::cell::CellRef;
use crate::st_graph::SpatioTemporalGraph;

/// Shared boundaries of one cell, keyed by neighbor node.
#[derive(Debug, Clone, Default)]
pub struct PolygonalCellTile {
    edges: BTreeMap<NodeIndex, MultiLineString<f64>>,
}

impl PolygonalCellTile {
    pub fn edge_with(&self, neighbor: NodeIndex) -> Option<&MultiLineString<f64>> {
        self.edges.get(&neighbor)
    }

    pub fn neighbors(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.edges.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Tiles for every cell of a graph.
#[derive(Debug, Clone, Default)]
pub struct PolygonalCellTiles {
    tiles: BTreeMap<CellRef, PolygonalCellTile>,
}

impl PolygonalCellTiles {
    /// Precomputes tiles for all frames.
    pub fn build(graph: &SpatioTemporalGraph) -> Self {
        Self::build_from(graph, 0)
    }

    /// Precomputes tiles for frames `start..`.
    pub fn build_from(graph: &SpatioTemporalGraph, start: usize) -> Self {
        let mut tiles = BTreeMap::new();
        for frame in graph.frames().iter().skip(start) {
            for node in frame.nodes() {
                let mut tile = PolygonalCellTile::default();
                for neighbor in frame.neighbors_of(node) {
                    let shared = frame
                        .edge_between(node, neighbor)
                        .and_then(|e| frame.edge_geometry(e));
                    // Degenerate overlaps carry no geometry
                    if let Some(shared) = shared.filter(|s| !s.0.is_empty()) {
                        tile.edges.insert(neighbor, shared.clone());
                    }
                }
                tiles.insert(CellRef::new(frame.frame_no(), node), tile);
            }
        }
        Self { tiles }
    }

    pub fn tile(&self, cell: CellRef) -> Option<&PolygonalCellTile> {
        self.tiles.get(&cell)
    }

    /// Shared boundary between two cells of the same frame.
    pub fn edge_between(&self, frame: usize, a: NodeIndex, b: NodeIndex) -> Option<&MultiLineString<f64>> {
        self.tile(CellRef::new(frame, a))?.edge_with(b)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_graph::FrameGraph;
    use crate::geometry::{boundary_length, DEFAULT_TOLERANCE};
    use approx::assert_relative_eq;
    use geo::polygon;

    #[test]
    fn test_tiles_hold_shared_boundaries() {
        let polys = vec![
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 2.0), (x: 0.0, y: 2.0)],
            polygon![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 1.0, y: 1.0)],
            polygon![(x: 1.0, y: 1.0), (x: 2.0, y: 1.0), (x: 2.0, y: 2.0), (x: 1.0, y: 2.0)],
        ];
        let frame = FrameGraph::from_polygons(0, polys, DEFAULT_TOLERANCE).unwrap();
        let graph = SpatioTemporalGraph::from_frames(vec![frame]).unwrap();
        let tiles = PolygonalCellTiles::build(&graph);

        assert_eq!(tiles.len(), 3);
        let left = tiles.tile(CellRef { frame: 0, node: 0 }).unwrap();
        assert_eq!(left.len(), 2);

        let shared = tiles.edge_between(0, NodeIndex::new(0), NodeIndex::new(1)).unwrap();
        assert_relative_eq!(boundary_length(shared), 1.0, epsilon = 1e-9);
        assert!(tiles.edge_between(0, NodeIndex::new(0), NodeIndex::new(0)).is_none());
    }
}
