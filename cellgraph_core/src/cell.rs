//! Cell entities and their lineage bookkeeping.
//!
//! Cells never hold pointers to each other. Temporal links (`previous`,
//! `next`, `first`) are [`CellRef`] addresses resolved through the owning
//! [`SpatioTemporalGraph`](crate::st_graph::SpatioTemporalGraph).

use geo::{Centroid, Point, Polygon};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GraphError;

// ============================================================================
// CELL ADDRESS
// ============================================================================

/// Address of a cell: frame index plus node index within that frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub frame: usize,
    pub node: usize,
}

impl CellRef {
    pub fn new(frame: usize, node: NodeIndex) -> Self {
        Self {
            frame,
            node: node.index(),
        }
    }

    pub fn node_index(&self) -> NodeIndex {
        NodeIndex::new(self.node)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}#{}", self.frame, self.node)
    }
}

// ============================================================================
// TRACK IDENTITY
// ============================================================================

/// Tracking state of a cell: a lineage id or the reason tracking failed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackId {
    /// Never tracked (entered the field of view, or tracking not run yet)
    #[default]
    Untracked,
    /// No correspondence in the previous frame
    MissingPrevious,
    /// No correspondence in the next frame
    MissingNext,
    /// No correspondence in either direction
    MissingBoth,
    /// Mother cell of a division
    Dividing,
    /// Division candidate whose sibling could not be found
    SiblingMissing,
    /// Lineage ended inside the tissue
    Eliminated,
    /// Division candidate whose mother lineage was eliminated
    SiblingEliminated,
    Valid(u32),
}

impl TrackId {
    /// Integer code: the id itself, or `-1..=-8` for the status variants.
    pub fn code(&self) -> i64 {
        match self {
            TrackId::Untracked => -1,
            TrackId::MissingPrevious => -2,
            TrackId::MissingNext => -3,
            TrackId::MissingBoth => -4,
            TrackId::Dividing => -5,
            TrackId::SiblingMissing => -6,
            TrackId::Eliminated => -7,
            TrackId::SiblingEliminated => -8,
            TrackId::Valid(id) => *id as i64,
        }
    }

    /// Inverse of [`TrackId::code`]. Returns `None` for unknown codes.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(TrackId::Untracked),
            -2 => Some(TrackId::MissingPrevious),
            -3 => Some(TrackId::MissingNext),
            -4 => Some(TrackId::MissingBoth),
            -5 => Some(TrackId::Dividing),
            -6 => Some(TrackId::SiblingMissing),
            -7 => Some(TrackId::Eliminated),
            -8 => Some(TrackId::SiblingEliminated),
            c if c >= 0 && c <= crate::pairing::MAX_TRACK_ID as i64 => Some(TrackId::Valid(c as u32)),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<u32> {
        match self {
            TrackId::Valid(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TrackId::Valid(_))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackId::Valid(id) => write!(f, "{}", id),
            other => write!(f, "{:?}", other),
        }
    }
}

// ============================================================================
// CELL
// ============================================================================

/// One segmented cell in one frame.
#[derive(Debug, Clone)]
pub struct Cell {
    geometry: Polygon<f64>,
    centroid: Point<f64>,
    pub(crate) track_id: TrackId,
    pub(crate) on_boundary: bool,
    pub(crate) previous: Option<CellRef>,
    pub(crate) next: Option<CellRef>,
    pub(crate) first: Option<CellRef>,
    pub(crate) division: Option<usize>,
    pub(crate) elimination: Option<usize>,
}

impl Cell {
    /// Creates an untracked cell, caching its centroid.
    ///
    /// Fails for polygons without a centroid (empty rings).
    pub fn new(geometry: Polygon<f64>, frame: usize) -> Result<Self, GraphError> {
        let centroid = geometry
            .centroid()
            .filter(|c| c.x().is_finite() && c.y().is_finite())
            .ok_or(GraphError::DegenerateGeometry { frame })?;
        Ok(Self {
            geometry,
            centroid,
            track_id: TrackId::Untracked,
            on_boundary: false,
            previous: None,
            next: None,
            first: None,
            division: None,
            elimination: None,
        })
    }

    pub fn geometry(&self) -> &Polygon<f64> {
        &self.geometry
    }

    pub fn centroid(&self) -> Point<f64> {
        self.centroid
    }

    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    pub fn on_boundary(&self) -> bool {
        self.on_boundary
    }

    pub fn previous(&self) -> Option<CellRef> {
        self.previous
    }

    pub fn next(&self) -> Option<CellRef> {
        self.next
    }

    pub fn first(&self) -> Option<CellRef> {
        self.first
    }

    /// Index into the graph's division records.
    pub fn division(&self) -> Option<usize> {
        self.division
    }

    /// Index into the graph's elimination records.
    pub fn elimination(&self) -> Option<usize> {
        self.elimination
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// A mother cell split into two children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Division {
    pub mother: CellRef,
    pub children: [CellRef; 2],
    /// Frame in which the children first appear
    pub time: usize,
}

/// A lineage ended inside the tissue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elimination {
    /// Last cell of the lineage
    pub cell: CellRef,
    /// Frame after which the lineage has no successor
    pub time: usize,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, LineString};

    #[test]
    fn test_track_id_codes() {
        for code in -8..=-1 {
            let id = TrackId::from_code(code).unwrap();
            assert_eq!(id.code(), code);
            assert!(!id.is_valid());
            assert_eq!(id.value(), None);
        }
        assert_eq!(TrackId::from_code(42), Some(TrackId::Valid(42)));
        assert_eq!(TrackId::Valid(42).code(), 42);
        assert_eq!(TrackId::from_code(-9), None);
        assert_eq!(TrackId::default(), TrackId::Untracked);
    }

    #[test]
    fn test_cell_caches_centroid() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 2.0), (x: 0.0, y: 2.0)];
        let cell = Cell::new(poly, 0).unwrap();
        assert_relative_eq!(cell.centroid().x(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(cell.centroid().y(), 1.0, epsilon = 1e-9);
        assert_eq!(cell.track_id(), TrackId::Untracked);
        assert!(cell.first().is_none());
    }

    #[test]
    fn test_empty_polygon_is_rejected() {
        let poly = Polygon::new(LineString::new(Vec::new()), Vec::new());
        assert_eq!(
            Cell::new(poly, 3).unwrap_err(),
            GraphError::DegenerateGeometry { frame: 3 }
        );
    }
}
