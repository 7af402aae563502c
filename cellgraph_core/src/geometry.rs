//! Polygon helpers shared by the frame graph, tiles and transition detector.
//!
//! Segmented cells tile the plane, so two neighbors share stretches of their
//! exterior rings. A shared boundary is recovered by overlapping collinear
//! ring segments rather than by a general polygon intersection.

use geo::{BoundingRect, Coord, EuclideanDistance, EuclideanLength, Intersects, Line, LineString, MultiLineString, Point, Polygon, Rect};

/// Distance under which two coordinates are treated as coincident.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

// ============================================================================
// SHARED BOUNDARIES
// ============================================================================

/// Returns the stretches of boundary shared by two polygons.
///
/// An empty result means the polygons are not adjacent.
pub fn shared_boundary(a: &Polygon<f64>, b: &Polygon<f64>, tolerance: f64) -> MultiLineString<f64> {
    if !rects_overlap(a.bounding_rect(), b.bounding_rect(), tolerance) {
        return MultiLineString::new(Vec::new());
    }

    let mut pieces = Vec::new();
    for seg_a in a.exterior().lines() {
        for seg_b in b.exterior().lines() {
            if let Some(piece) = segment_overlap(&seg_a, &seg_b, tolerance) {
                pieces.push(LineString::from(vec![piece.start, piece.end]));
            }
        }
    }
    MultiLineString::new(pieces)
}

/// Overlap of two segments lying on the same line, if longer than `tolerance`.
fn segment_overlap(a: &Line<f64>, b: &Line<f64>, tolerance: f64) -> Option<Line<f64>> {
    let d = a.delta();
    let len_sq = d.x * d.x + d.y * d.y;
    if len_sq <= tolerance * tolerance {
        return None;
    }
    let len = len_sq.sqrt();

    // Both endpoints of b must lie on a's supporting line
    let off_line = |p: Coord<f64>| {
        let r = p - a.start;
        (d.x * r.y - d.y * r.x).abs() / len > tolerance
    };
    if off_line(b.start) || off_line(b.end) {
        return None;
    }

    let project = |p: Coord<f64>| {
        let r = p - a.start;
        (d.x * r.x + d.y * r.y) / len_sq
    };
    let (t1, t2) = (project(b.start), project(b.end));
    let lo = t1.min(t2).max(0.0);
    let hi = t1.max(t2).min(1.0);
    if (hi - lo) * len <= tolerance {
        return None;
    }

    Some(Line::new(a.start + d * lo, a.start + d * hi))
}

fn rects_overlap(a: Option<Rect<f64>>, b: Option<Rect<f64>>, tolerance: f64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            a.min().x <= b.max().x + tolerance
                && b.min().x <= a.max().x + tolerance
                && a.min().y <= b.max().y + tolerance
                && b.min().y <= a.max().y + tolerance
        }
        _ => false,
    }
}

// ============================================================================
// MEASURES & PREDICATES
// ============================================================================

/// Length of a polygon's exterior ring.
pub fn perimeter(polygon: &Polygon<f64>) -> f64 {
    polygon.exterior().euclidean_length()
}

/// Total length of a shared boundary.
pub fn boundary_length(boundary: &MultiLineString<f64>) -> f64 {
    boundary.euclidean_length()
}

/// True if the polygon comes within `tolerance` of any segment of `boundary`.
///
/// Exact intersection misses vertices that drifted a few ulps off the edge.
pub fn touches_boundary(polygon: &Polygon<f64>, boundary: &MultiLineString<f64>, tolerance: f64) -> bool {
    boundary
        .0
        .iter()
        .flat_map(|ls| ls.lines())
        .any(|line| polygon.intersects(&line) || polygon.euclidean_distance(&line) <= tolerance)
}

/// True if the point lies inside or on the edge of the polygon.
pub fn covers_point(polygon: &Polygon<f64>, point: &Point<f64>) -> bool {
    polygon.intersects(&point.0)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    #[test]
    fn test_adjacent_squares_share_one_edge() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(1.0, 0.0, 1.0);
        let shared = shared_boundary(&a, &b, DEFAULT_TOLERANCE);
        assert_eq!(shared.0.len(), 1);
        assert_relative_eq!(boundary_length(&shared), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_partial_overlap() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(2.0, 1.0, 2.0);
        let shared = shared_boundary(&a, &b, DEFAULT_TOLERANCE);
        assert_relative_eq!(boundary_length(&shared), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_corner_contact_is_not_adjacency() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(1.0, 1.0, 1.0);
        assert!(shared_boundary(&a, &b, DEFAULT_TOLERANCE).0.is_empty());
    }

    #[test]
    fn test_distant_polygons() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(5.0, 5.0, 1.0);
        assert!(shared_boundary(&a, &b, DEFAULT_TOLERANCE).0.is_empty());
    }

    #[test]
    fn test_perimeter_and_cover() {
        let a = square(0.0, 0.0, 2.0);
        assert_relative_eq!(perimeter(&a), 8.0, epsilon = 1e-9);
        assert!(covers_point(&a, &Point::new(1.0, 1.0)));
        assert!(covers_point(&a, &Point::new(2.0, 1.0)));
        assert!(!covers_point(&a, &Point::new(3.0, 1.0)));
    }

    #[test]
    fn test_touches_boundary() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(1.0, 0.0, 1.0);
        let far = square(4.0, 0.0, 1.0);
        let shared = shared_boundary(&a, &b, DEFAULT_TOLERANCE);
        assert!(touches_boundary(&b, &shared, DEFAULT_TOLERANCE));
        assert!(!touches_boundary(&far, &shared, DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_touch_survives_rounding() {
        // Vertex one ulp-scale step off the vertical edge x = 1.5
        let edge = MultiLineString::new(vec![LineString::from(vec![(1.5, 1.0), (1.5, 2.0)])]);
        let top = polygon![(x: 0.0, y: 3.0), (x: 1.5 - 2e-16, y: 2.0), (x: 3.0, y: 3.0)];
        assert!(touches_boundary(&top, &edge, DEFAULT_TOLERANCE));

        let gap = polygon![(x: 0.0, y: 3.0), (x: 1.5, y: 2.01), (x: 3.0, y: 3.0)];
        assert!(!touches_boundary(&gap, &edge, DEFAULT_TOLERANCE));
    }
}
