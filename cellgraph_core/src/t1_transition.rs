//! T1-Transition Detector - neighbor exchanges from edge timelines.
//!
//! A T1 transition is an edge lost by one cell pair (the losers) while the
//! two cells at the ends of that edge (the winners) become neighbors. For
//! every timeline with a gap:
//! 1. Timing (longest run of absence, its start and the survival before it)
//! 2. Losers (decoded from the pair code)
//! 3. Boundary Flag (either loser on the border just before detection)
//! 4. Winners (loser-1 neighbors touching the lost edge just before detection)

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cell::TrackId;
use crate::cell_tile::PolygonalCellTiles;
use crate::edge_tracking::EdgeTimelines;
use crate::error::TrackingError;
use crate::geometry;
use crate::pairing;
use crate::st_graph::SpatioTemporalGraph;

// ============================================================================
// TRANSITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct T1Transition {
    /// Track ids that lost their shared edge, ascending
    pub loser_nodes: [u32; 2],
    /// Track ids that gained the new edge, ascending, when resolved
    pub winner_nodes: Option<[u32; 2]>,
    /// First frame of the longest absence
    pub detection_time: usize,
    /// Frames in the longest absence
    pub transition_length: usize,
    /// Frames the old edge was present before the absence
    pub old_edge_survival_length: usize,
    /// Either loser touched the tissue border just before detection
    pub on_boundary: bool,
}

impl T1Transition {
    pub fn has_winners(&self) -> bool {
        self.winner_nodes.is_some()
    }
}

/// Position of the longest run of `false` entries; the earliest wins ties.
///
/// Returns `(start index, length)`, or `None` without gaps.
pub fn longest_gap(timeline: &[bool]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut run_start = 0;
    let mut run_len = 0;
    for (i, &present) in timeline.iter().enumerate() {
        if present {
            run_len = 0;
            continue;
        }
        if run_len == 0 {
            run_start = i;
        }
        run_len += 1;
        if best.map_or(true, |(_, len)| run_len > len) {
            best = Some((run_start, run_len));
        }
    }
    best
}

// ============================================================================
// DETECTION
// ============================================================================

/// Detects one transition per timeline that contains a gap.
///
/// No filtering happens here; see [`TransitionFilter`].
pub fn detect_transitions(
    graph: &SpatioTemporalGraph,
    tiles: &PolygonalCellTiles,
    timelines: &EdgeTimelines,
) -> Result<Vec<T1Transition>, TrackingError> {
    let start = timelines.starting_frame();
    let mut transitions = Vec::new();

    for (code, timeline) in timelines.iter() {
        let Some((gap_start, gap_len)) = longest_gap(timeline) else {
            continue;
        };
        // Index 0 is always present, so the gap never starts at 0
        if gap_start == 0 {
            continue;
        }
        let detection_time = start + gap_start;
        let survival = timeline[..gap_start].iter().filter(|p| **p).count();
        let (l1, l2) = pairing::decode(code);

        let before = graph.frame(detection_time - 1)?;
        let n1 = before
            .node_by_track_id(l1)
            .ok_or(TrackingError::MissingCell { track_id: l1, frame: detection_time - 1 })?;
        let n2 = before
            .node_by_track_id(l2)
            .ok_or(TrackingError::MissingCell { track_id: l2, frame: detection_time - 1 })?;

        let on_boundary = [n1, n2]
            .iter()
            .filter_map(|n| before.cell(*n))
            .any(|c| c.on_boundary());

        let winner_nodes = match tiles.edge_between(detection_time - 1, n1, n2) {
            Some(lost_edge) => {
                let touching: Vec<TrackId> = before
                    .neighbors_of(n1)
                    .into_iter()
                    .filter(|&n| n != n2)
                    .filter_map(|n| before.cell(n))
                    .filter(|c| geometry::touches_boundary(c.geometry(), lost_edge, before.tolerance()))
                    .map(|c| c.track_id())
                    .collect();
                match pick_winners(&touching) {
                    Ok(winners) => Some(winners),
                    Err(WinnerShortfall { valid, tagged }) if tagged > 0 => {
                        warn!(
                            losers = ?(l1, l2),
                            detection_time,
                            valid,
                            tagged,
                            "Winner cells carry a status tag instead of a track id"
                        );
                        None
                    }
                    Err(WinnerShortfall { valid, .. }) => {
                        warn!(
                            losers = ?(l1, l2),
                            detection_time,
                            winners = valid,
                            "Expected exactly two winner cells"
                        );
                        None
                    }
                }
            }
            None => {
                warn!(losers = ?(l1, l2), detection_time, "No tile geometry for lost edge");
                None
            }
        };

        transitions.push(T1Transition {
            loser_nodes: [l1, l2],
            winner_nodes,
            detection_time,
            transition_length: gap_len,
            old_edge_survival_length: survival,
            on_boundary,
        });
    }

    debug!(count = transitions.len(), "Detected T1 transitions");
    Ok(transitions)
}

/// Touching cells that could not be resolved to two winners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WinnerShortfall {
    valid: usize,
    tagged: usize,
}

/// Ascending winner ids, if exactly two touching cells carry a valid id and
/// none carries a status tag.
fn pick_winners(touching: &[TrackId]) -> Result<[u32; 2], WinnerShortfall> {
    let ids: Vec<u32> = touching.iter().filter_map(TrackId::value).collect();
    let tagged = touching.len() - ids.len();
    match ids.as_slice() {
        [a, b] if tagged == 0 => Ok([(*a).min(*b), (*a).max(*b)]),
        _ => Err(WinnerShortfall { valid: ids.len(), tagged }),
    }
}

// ============================================================================
// FILTERING
// ============================================================================

/// Caller-side thresholds for reporting transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionFilter {
    /// Minimal number of frames the edge must stay lost (default: 1)
    pub min_transition_length: usize,
    /// Minimal number of frames the old edge must have existed (default: 1)
    pub min_old_edge_survival: usize,
}

impl Default for TransitionFilter {
    fn default() -> Self {
        Self {
            min_transition_length: 1,
            min_old_edge_survival: 1,
        }
    }
}

impl TransitionFilter {
    pub fn accepts(&self, transition: &T1Transition) -> bool {
        transition.transition_length >= self.min_transition_length
            && transition.old_edge_survival_length >= self.min_old_edge_survival
    }

    pub fn apply(&self, transitions: Vec<T1Transition>) -> Vec<T1Transition> {
        transitions.into_iter().filter(|t| self.accepts(t)).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
