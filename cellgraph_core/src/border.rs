//! Border cell marking.
//!
//! Interior cells are surrounded by neighbors, so their whole perimeter is
//! shared. Any perimeter left unshared faces the outside of the tissue.

use tracing::debug;

use crate::error::GraphError;
use crate::frame_graph::FrameGraph;
use crate::geometry;

/// Flags every cell whose unshared perimeter exceeds `min_exposed_length`.
///
/// Returns the number of border cells.
pub fn mark_border_cells(frame: &mut FrameGraph, min_exposed_length: f64) -> Result<usize, GraphError> {
    let mut flags = Vec::with_capacity(frame.size());
    for (node, cell) in frame.cells() {
        let shared: f64 = frame
            .neighbors_of(node)
            .into_iter()
            .filter_map(|other| frame.edge_between(node, other))
            .filter_map(|e| frame.edge_geometry(e))
            .map(geometry::boundary_length)
            .sum();
        let exposed = geometry::perimeter(cell.geometry()) - shared;
        flags.push((node, exposed > min_exposed_length));
    }

    let mut count = 0;
    for (node, on_boundary) in flags {
        frame.set_boundary(node, on_boundary)?;
        if on_boundary {
            count += 1;
        }
    }
    debug!(frame = frame.frame_no(), border_cells = count, "Marked border cells");
    Ok(count)
}
