//! The "TRACKING" Engine - frame-to-frame cell correspondence.
//!
//! Links every cell to its predecessor using containment candidates and a
//! stable matching between lineages and cells. Per frame:
//! 1. Candidate Evaluation (group containment candidates by lineage root)
//! 2. Stable Matching (roots propose to cells, nearest centroid first)
//! 3. Rescue (re-link a free lineage, or detect a division)
//! 4. Loss Bookkeeping (lineages without a successor)
//!
//! Status tags are applied only after every frame is linked, so tagging never
//! changes which lineages later frames can see.

use geo::{Contains, EuclideanDistance};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::cell::{CellRef, TrackId};
use crate::error::{GraphError, TrackingError};
use crate::stable_marriage::{order_candidates, stable_match, Candidate};
use crate::st_graph::SpatioTemporalGraph;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the StableMarriageTracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Frames to search ahead for a correspondence (default: 1)
    pub link_range: usize,

    /// Turn interior lineage ends into Elimination events (default: false)
    pub detect_eliminations: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            link_range: 1,
            detect_eliminations: false,
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// Summary of one tracking pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingReport {
    pub frames: usize,
    pub lineages_started: usize,
    pub links: usize,
    pub rescues: usize,
    pub divisions: usize,
    pub missing_previous: usize,
    pub missing_next: usize,
    pub missing_both: usize,
    pub sibling_missing: usize,
    pub sibling_eliminated: usize,
    pub eliminations: usize,
    pub untracked: usize,
}

// ============================================================================
// PASS STATE
// ============================================================================

/// Build-phase side tables, dropped when the pass ends.
#[derive(Debug, Default)]
struct PassState {
    /// cell -> earlier cells whose centroid it contains
    candidates: BTreeMap<CellRef, Vec<CellRef>>,
    /// lineage root -> most recent cell of that lineage
    latest: BTreeMap<CellRef, CellRef>,
    /// roots whose last cell divided
    closed: BTreeSet<CellRef>,
    /// cells that were a candidate of some later cell
    voted: BTreeSet<CellRef>,
    lost_previous: Vec<CellRef>,
    lost_next: BTreeSet<CellRef>,
    /// (cell, rescued root) pairs whose sibling was not found
    sibling_missing: Vec<(CellRef, CellRef)>,
    mothers: Vec<CellRef>,
    /// cells linked by a rescue rather than by the matching
    rescued: BTreeSet<CellRef>,
}

impl PassState {
    fn latest(&self, root: CellRef) -> Result<CellRef, TrackingError> {
        self.latest
            .get(&root)
            .copied()
            .ok_or_else(|| GraphError::UnknownCell(root).into())
    }
}

// ============================================================================
// TRACKER
// ============================================================================

/// Nearest-neighbor tracker resolving ambiguity with stable matching.
#[derive(Debug, Clone)]
pub struct StableMarriageTracker {
    config: TrackingConfig,
}

impl StableMarriageTracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(TrackingConfig::default())
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Tracks every frame of the graph, replacing any earlier tracking.
    pub fn track(&self, graph: &mut SpatioTemporalGraph) -> Result<TrackingReport, TrackingError> {
        if graph.size() == 0 {
            return Err(TrackingError::EmptyGraph);
        }
        if self.config.link_range == 0 {
            return Err(TrackingError::InvalidConfig("link_range must be at least 1".into()));
        }

        info!(
            frames = graph.size(),
            link_range = self.config.link_range,
            "Starting cell tracking"
        );

        graph.reset_tracking()?;
        let mut state = PassState::default();
        let mut report = TrackingReport {
            frames: graph.size(),
            ..Default::default()
        };

        // Frame 0: every cell starts a lineage
        let roots: Vec<CellRef> = graph.frame(0)?.nodes().map(|n| CellRef::new(0, n)).collect();
        for r in roots {
            graph.start_lineage(r)?;
            state.latest.insert(r, r);
            report.lineages_started += 1;
        }
        self.collect_candidates(graph, 0, &mut state)?;

        for t in 1..graph.size() {
            self.track_frame(graph, t, &mut state, &mut report)?;
            self.collect_candidates(graph, t, &mut state)?;
        }

        self.expire_lineages(graph, &mut state)?;
        self.apply_tags(graph, &state, &mut report)?;
        graph.set_tracking(true);

        info!(
            links = report.links,
            divisions = report.divisions,
            missing_previous = report.missing_previous,
            missing_next = report.missing_next,
            eliminations = report.eliminations,
            "Cell tracking complete"
        );
        Ok(report)
    }

    /// Records frame-`t` cells as parent candidates of later cells containing their centroid.
    fn collect_candidates(
        &self,
        graph: &SpatioTemporalGraph,
        t: usize,
        state: &mut PassState,
    ) -> Result<(), TrackingError> {
        let current = graph.frame(t)?;
        let last = (t + self.config.link_range).min(graph.size() - 1);
        for future in t + 1..=last {
            let next_frame = graph.frame(future)?;
            for (next_node, next_cell) in next_frame.cells() {
                for (node, cell) in current.cells() {
                    if next_cell.geometry().contains(&cell.centroid()) {
                        let parent = CellRef::new(t, node);
                        state
                            .candidates
                            .entry(CellRef::new(future, next_node))
                            .or_default()
                            .push(parent);
                        state.voted.insert(parent);
                    }
                }
            }
        }
        Ok(())
    }

    fn track_frame(
        &self,
        graph: &mut SpatioTemporalGraph,
        t: usize,
        state: &mut PassState,
        report: &mut TrackingReport,
    ) -> Result<(), TrackingError> {
        // ====================================================================
        // STAGE 1: CANDIDATE EVALUATION
        // ====================================================================

        let mut grooms: BTreeMap<CellRef, Vec<Candidate<CellRef>>> = BTreeMap::new();
        let mut brides: BTreeMap<CellRef, Vec<Candidate<CellRef>>> = BTreeMap::new();
        {
            let frame = graph.frame(t)?;
            let origin = graph.frame(0)?;
            for (node, cell) in frame.cells() {
                let here = CellRef::new(t, node);
                let parents = state.candidates.remove(&here).unwrap_or_default();

                // Cells born outside the first frame's tissue stay untracked
                if parents.is_empty() {
                    if origin.covers(&cell.centroid()) {
                        brides.entry(here).or_default();
                    }
                    continue;
                }

                let mut nearest: BTreeMap<CellRef, f64> = BTreeMap::new();
                for parent in parents {
                    let parent_cell = graph.cell(parent)?;
                    match parent_cell.first().filter(|root| !state.closed.contains(root)) {
                        Some(root) => {
                            let d = parent_cell.centroid().euclidean_distance(&cell.centroid());
                            let best = nearest.entry(root).or_insert(f64::INFINITY);
                            if d < *best {
                                *best = d;
                            }
                        }
                        None => {
                            if origin.covers(&parent_cell.centroid()) {
                                brides.entry(here).or_default();
                            }
                        }
                    }
                }

                for (root, d) in nearest {
                    grooms.entry(root).or_default().push(Candidate::new(here, d));
                    brides.entry(here).or_default().push(Candidate::new(root, d));
                }
            }
        }

        // ====================================================================
        // STAGE 2: STABLE MATCHING
        // ====================================================================

        for list in grooms.values_mut() {
            order_candidates(list);
        }
        for list in brides.values_mut() {
            order_candidates(list);
        }
        let matching = stable_match(&grooms, &brides);

        // Containment checks during rescue see lineages as they were before this frame
        let latest_before = state.latest.clone();
        let mut married: BTreeSet<CellRef> = BTreeSet::new();

        for (&bride, &root) in &matching.pairs {
            let previous = state.latest(root)?;
            graph.link(previous, bride)?;
            state.latest.insert(root, bride);
            married.insert(root);
            report.links += 1;
        }

        // ====================================================================
        // STAGE 3: RESCUE
        // ====================================================================

        for &bride in &matching.unmatched_brides {
            self.rescue(graph, bride, &latest_before, &mut married, state, report)?;
        }

        // ====================================================================
        // STAGE 4: LOSS BOOKKEEPING
        // ====================================================================

        for root in &matching.unmatched_grooms {
            if !married.contains(root) && !state.closed.contains(root) {
                let last = state.latest(*root)?;
                state.lost_next.insert(last);
            }
        }

        debug!(
            frame = t,
            grooms = grooms.len(),
            brides = brides.len(),
            married = matching.pairs.len(),
            unmatched_brides = matching.unmatched_brides.len(),
            "Frame matched"
        );
        Ok(())
    }

    /// Resolves a cell that won no stable match.
    fn rescue(
        &self,
        graph: &mut SpatioTemporalGraph,
        bride: CellRef,
        latest_before: &BTreeMap<CellRef, CellRef>,
        married: &mut BTreeSet<CellRef>,
        state: &mut PassState,
        report: &mut TrackingReport,
    ) -> Result<(), TrackingError> {
        let centroid = graph.cell(bride)?.centroid();

        // Lineage whose last known cell contains the lost centroid, nearest first
        let mut rescued: Option<(f64, CellRef, CellRef)> = None;
        for (&root, &last) in latest_before {
            if state.closed.contains(&root) || bride.frame.saturating_sub(last.frame) > self.config.link_range {
                continue;
            }
            let last_cell = graph.cell(last)?;
            if !last_cell.geometry().contains(&centroid) {
                continue;
            }
            let d = last_cell.centroid().euclidean_distance(&centroid);
            if rescued.map_or(true, |(best, _, _)| d < best) {
                rescued = Some((d, root, last));
            }
        }

        let Some((_, root, mother)) = rescued else {
            state.lost_previous.push(bride);
            return Ok(());
        };

        // Lineage not continued in this frame: plain re-link
        if !married.contains(&root) {
            let previous = state.latest(root)?;
            graph.link(previous, bride)?;
            state.latest.insert(root, bride);
            married.insert(root);
            state.rescued.insert(bride);
            report.rescues += 1;
            report.links += 1;
            debug!(cell = %bride, root = %root, "Rescued cell into free lineage");
            return Ok(());
        }

        // Lineage already continued: look for a division sibling
        let mother_geometry = graph.cell(mother)?.geometry().clone();
        let frame = graph.frame(bride.frame)?;
        // The mother has one successor, so at most one sibling qualifies
        let sibling = frame
            .neighbors_of(bride.node_index())
            .into_iter()
            .find_map(|n| {
                let cell = frame.cell(n)?;
                let matches = cell.first() == Some(root)
                    && cell.previous() == Some(mother)
                    && mother_geometry.contains(&cell.centroid());
                matches.then(|| CellRef::new(bride.frame, n))
            });

        let Some(sibling) = sibling else {
            state.sibling_missing.push((bride, root));
            return Ok(());
        };

        graph.unlink(mother, sibling)?;
        graph.start_lineage(sibling)?;
        graph.start_lineage(bride)?;
        let children = if sibling < bride { [sibling, bride] } else { [bride, sibling] };
        graph.record_division(mother, children)?;

        state.closed.insert(root);
        state.latest.insert(root, mother);
        state.latest.insert(sibling, sibling);
        state.latest.insert(bride, bride);
        state.mothers.push(mother);
        report.links -= 1;
        if state.rescued.remove(&sibling) {
            report.rescues -= 1;
        }
        report.lineages_started += 2;
        report.divisions += 1;
        debug!(mother = %mother, first = %children[0], second = %children[1], "Division detected");
        Ok(())
    }

    /// Lineages that stopped before the last frame are lost in the next frame.
    fn expire_lineages(&self, graph: &SpatioTemporalGraph, state: &mut PassState) -> Result<(), TrackingError> {
        let last_frame = graph.size() - 1;
        for (root, &last) in &state.latest {
            if state.closed.contains(root) || last.frame == last_frame {
                continue;
            }
            if graph.cell(last)?.next().is_none() {
                state.lost_next.insert(last);
            }
        }
        Ok(())
    }

    fn apply_tags(
        &self,
        graph: &mut SpatioTemporalGraph,
        state: &PassState,
        report: &mut TrackingReport,
    ) -> Result<(), TrackingError> {
        let last_frame = graph.size() - 1;

        for &cell in &state.lost_previous {
            let tag = if !state.voted.contains(&cell) && cell.frame != last_frame {
                report.missing_both += 1;
                TrackId::MissingBoth
            } else {
                report.missing_previous += 1;
                TrackId::MissingPrevious
            };
            graph.set_track_id(cell, tag)?;
        }

        for &cell in &state.lost_next {
            if graph.cell(cell)?.next().is_some() || state.mothers.contains(&cell) {
                continue;
            }
            if self.config.detect_eliminations && !graph.cell(cell)?.on_boundary() {
                graph.record_elimination(cell)?;
                graph.set_track_id(cell, TrackId::Eliminated)?;
                report.eliminations += 1;
            } else {
                graph.set_track_id(cell, TrackId::MissingNext)?;
                report.missing_next += 1;
            }
        }

        for &(cell, root) in &state.sibling_missing {
            let end = graph.lineage_end(root)?;
            let tag = if graph.cell(end)?.elimination().is_some() {
                report.sibling_eliminated += 1;
                TrackId::SiblingEliminated
            } else {
                report.sibling_missing += 1;
                TrackId::SiblingMissing
            };
            graph.set_track_id(cell, tag)?;
        }

        for &mother in &state.mothers {
            graph.set_track_id(mother, TrackId::Dividing)?;
        }

        report.untracked = graph
            .frames()
            .iter()
            .flat_map(|f| f.cells())
            .filter(|(_, c)| c.track_id() == TrackId::Untracked)
            .count();
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
