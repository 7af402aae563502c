//! Scenario runner - executes synthetic tissue scenarios against ground truth.

use cellgraph_core::{CellRef, SpatioTemporalGraph, TrackId, TrackingError};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::SimError;
use crate::pipeline::{build_graph, run_pipeline, PipelineConfig, PipelineOutput};
use crate::scenarios::ScenarioId;
use crate::tissue::{SyntheticFrame, SyntheticTissue};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Frames generated
    pub frames: usize,

    /// Number of cells in the last frame
    pub final_cell_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    pub links: usize,
    pub rescues: usize,
    pub divisions: usize,
    pub eliminations: usize,
    /// MissingPrevious + MissingNext + MissingBoth
    pub missing: usize,
    pub untracked: usize,
    pub edge_timelines: usize,
    pub transitions: usize,
}

impl ScenarioMetrics {
    fn from_output(output: &PipelineOutput) -> Self {
        let r = &output.report;
        Self {
            links: r.links,
            rescues: r.rescues,
            divisions: r.divisions,
            eliminations: r.eliminations,
            missing: r.missing_previous + r.missing_next + r.missing_both,
            untracked: r.untracked,
            edge_timelines: output.timelines.len(),
            transitions: output.transitions.len(),
        }
    }
}

/// A finished simulation: truth, tracked graph and pipeline output.
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub scenario: ScenarioId,
    pub seed: u64,
    pub truth: Vec<SyntheticFrame>,
    pub graph: SpatioTemporalGraph,
    pub output: PipelineOutput,
    /// Frame where the scenario's event happens
    pub event_frame: usize,
}

/// Runs synthetic scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Grid size for grid-based scenarios
    rows: usize,
    cols: usize,

    /// Number of frames to generate
    frames: usize,

    /// Pipeline settings
    config: PipelineConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rows: 5,
            cols: 5,
            frames: 6,
            config: PipelineConfig::default(),
        }
    }

    /// Sets the grid size.
    pub fn with_grid(mut self, rows: usize, cols: usize) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Sets the number of frames.
    pub fn with_frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    /// Sets the pipeline configuration.
    pub fn with_pipeline(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Generates the tissue and runs the pipeline without judging the result.
    pub fn simulate(&self, scenario: ScenarioId) -> Result<ScenarioRun, SimError> {
        if self.frames < 3 {
            return Err(TrackingError::InvalidConfig("scenarios need at least 3 frames".to_string()).into());
        }
        if self.rows < 3 || self.cols < 3 {
            return Err(TrackingError::InvalidConfig("grid needs an interior cell".to_string()).into());
        }

        let physics_seed = self.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let mut tissue = SyntheticTissue::new(physics_seed);
        let event_frame = self.frames / 2;
        let mut config = self.config.clone();

        let truth = match scenario {
            ScenarioId::Drift => tissue.drift(self.rows, self.cols, self.frames),
            ScenarioId::Division => tissue.division(self.rows, self.cols, self.frames, event_frame),
            ScenarioId::Elimination => {
                config.tracking.detect_eliminations = true;
                tissue.elimination(self.rows, self.cols, self.frames, event_frame)
            }
            ScenarioId::Intercalation => tissue.intercalation(self.frames, event_frame),
        };
        debug!(scenario = %scenario, frames = truth.len(), event_frame, "Generated tissue");

        let mut graph = build_graph(truth.iter().map(|f| f.polygons.clone()), &config)?;
        let output = run_pipeline(&mut graph, &config)?;

        Ok(ScenarioRun {
            scenario,
            seed: self.seed,
            truth,
            graph,
            output,
            event_frame,
        })
    }

    /// Runs a scenario and checks it against ground truth.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Running scenario: {} - {}", scenario.name(), scenario.description());

        let run = match self.simulate(scenario) {
            Ok(run) => run,
            Err(e) => {
                warn!("Scenario {} aborted: {}", scenario.name(), e);
                return ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: false,
                    frames: self.frames,
                    final_cell_count: 0,
                    failure_reason: Some(e.to_string()),
                    metrics: ScenarioMetrics::default(),
                };
            }
        };

        self.judge(&run)
    }

    /// Builds the result of a finished run.
    pub fn judge(&self, run: &ScenarioRun) -> ScenarioResult {
        let verdict = self.evaluate(run);
        ScenarioResult {
            scenario: run.scenario,
            seed: run.seed,
            passed: verdict.is_ok(),
            frames: run.truth.len(),
            final_cell_count: run.truth.last().map_or(0, |f| f.polygons.len()),
            failure_reason: verdict.err(),
            metrics: ScenarioMetrics::from_output(&run.output),
        }
    }

    /// Checks a finished run against its ground truth.
    pub fn evaluate(&self, run: &ScenarioRun) -> Result<(), String> {
        let ids = check_identities(run)?;
        let report = &run.output.report;
        if report.untracked > 0 {
            return Err(format!("{} cells were never tracked", report.untracked));
        }

        let at = run.event_frame;
        let graph = &run.graph;
        let center = SyntheticTissue::center(self.rows, self.cols);

        match run.scenario {
            ScenarioId::Drift => {
                let expected = run.truth[0].polygons.len() * (run.truth.len() - 1);
                if report.links != expected {
                    return Err(format!("Expected {} links, got {}", expected, report.links));
                }
                expect_quiet(run)?;
            }

            ScenarioId::Division => {
                let [division] = graph.divisions() else {
                    return Err(format!("Expected 1 division, got {}", graph.divisions().len()));
                };
                let mother = CellRef { frame: at - 1, node: center };
                if division.mother != mother {
                    return Err(format!("Division mother {} should be {}", division.mother, mother));
                }
                let daughters = [
                    CellRef { frame: at, node: center },
                    CellRef { frame: at, node: self.rows * self.cols },
                ];
                if division.children != daughters {
                    return Err(format!("Unexpected daughters {:?}", division.children));
                }
                expect_tag(graph, mother, TrackId::Dividing)?;
                if !graph.eliminations().is_empty() || !run.output.transitions.is_empty() {
                    return Err("Division produced extra events".to_string());
                }
            }

            ScenarioId::Elimination => {
                let [elimination] = graph.eliminations() else {
                    return Err(format!("Expected 1 elimination, got {}", graph.eliminations().len()));
                };
                let lost = CellRef { frame: at - 1, node: center };
                if elimination.cell != lost {
                    return Err(format!("Eliminated {} instead of {}", elimination.cell, lost));
                }
                expect_tag(graph, lost, TrackId::Eliminated)?;
                if !graph.divisions().is_empty() || !run.output.transitions.is_empty() {
                    return Err("Elimination produced extra events".to_string());
                }
            }

            ScenarioId::Intercalation => {
                let start = self.config.t1_start;
                if start >= at {
                    return Err(format!("Edge tracking starts at {} after the exchange at {}", start, at));
                }
                let id = |label: usize| ids.get(&label).copied().ok_or(format!("Label {} lost its track", label));
                let pair = |a: u32, b: u32| [a.min(b), a.max(b)];
                let losers = pair(id(2)?, id(3)?);
                let winners = pair(id(0)?, id(1)?);

                let [t1] = run.output.transitions.as_slice() else {
                    return Err(format!("Expected 1 transition, got {}", run.output.transitions.len()));
                };
                if t1.loser_nodes != losers || t1.winner_nodes != Some(winners) {
                    return Err(format!("Unexpected T1 cells {:?} / {:?}", t1.loser_nodes, t1.winner_nodes));
                }
                let timing = (t1.detection_time, t1.transition_length, t1.old_edge_survival_length);
                let expected = (at, run.truth.len() - at, at - start);
                if timing != expected {
                    return Err(format!("T1 timing {:?} should be {:?}", timing, expected));
                }
                if t1.on_boundary {
                    return Err("Interior T1 flagged as boundary".to_string());
                }
            }
        }

        Ok(())
    }
}

/// Every truth label maps to one track id and no id is shared between labels.
fn check_identities(run: &ScenarioRun) -> Result<HashMap<usize, u32>, String> {
    let mut ids: HashMap<usize, u32> = HashMap::new();
    let mut owners: HashMap<u32, usize> = HashMap::new();

    for (t, truth) in run.truth.iter().enumerate() {
        let frame = run.graph.frame(t).map_err(|e| e.to_string())?;
        for ((_, cell), &label) in frame.cells().zip(&truth.labels) {
            let Some(id) = cell.track_id().value() else {
                continue;
            };
            if *ids.entry(label).or_insert(id) != id {
                return Err(format!("Cell {} switched identity at frame {}", label, t));
            }
            if *owners.entry(id).or_insert(label) != label {
                return Err(format!("Track {} shared by two cells at frame {}", id, t));
            }
        }
    }
    Ok(ids)
}

fn expect_tag(graph: &SpatioTemporalGraph, cell: CellRef, tag: TrackId) -> Result<(), String> {
    let found = graph.cell(cell).map_err(|e| e.to_string())?.track_id();
    if found != tag {
        return Err(format!("{} should be {} but is {}", cell, tag, found));
    }
    Ok(())
}

fn expect_quiet(run: &ScenarioRun) -> Result<(), String> {
    let graph = &run.graph;
    if !graph.divisions().is_empty() || !graph.eliminations().is_empty() {
        return Err("Unexpected division or elimination".to_string());
    }
    if run.output.report.missing_next + run.output.report.missing_previous > 0 {
        return Err("Unexpected lost cells".to_string());
    }
    if !run.output.transitions.is_empty() {
        return Err(format!("Unexpected {} transitions", run.output.transitions.len()));
    }
    Ok(())
}
