//! Synthetic tissue generator - ground truth for scenario runs.
//!
//! The generator knows which physical cell every polygon belongs to:
//! - Cell layouts (grids, divisions, vanishing cells, neighbor exchanges)
//! - Global drift of the whole tissue between frames (seeded noise)
//! - A truth label per polygon, stable for the lifetime of a cell

use geo::{polygon, Coord, Polygon, Translate};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Fraction of the mother's width taken by the left daughter.
const DIVISION_SPLIT: f64 = 0.4;

/// One generated frame with truth labels aligned to `polygons`.
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    pub polygons: Vec<Polygon<f64>>,
    pub labels: Vec<usize>,
}

/// Seeded generator of time-lapse tissues.
pub struct SyntheticTissue {
    /// Drift RNG (seeded for reproducibility)
    rng: ChaCha8Rng,

    /// Standard deviation of the per-frame drift
    drift_std: f64,

    /// Largest drift allowed on either axis per frame
    max_step: f64,
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
}

impl SyntheticTissue {
    /// Creates a generator. Cells are unit squares, drift is a few percent of that.
    pub fn new(physics_seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(physics_seed),
            drift_std: 0.02,
            max_step: 0.05,
        }
    }

    /// Sets the drift noise.
    pub fn with_drift(mut self, std: f64, max_step: f64) -> Self {
        self.drift_std = std;
        self.max_step = max_step;
        self
    }

    /// Label of the cell closest to the grid center.
    pub fn center(rows: usize, cols: usize) -> usize {
        (rows / 2) * cols + cols / 2
    }

    /// Cumulative offsets for every frame; frame 0 is not shifted.
    fn offsets(&mut self, frames: usize) -> Vec<Coord<f64>> {
        let normal = Normal::new(0.0, self.drift_std).ok();
        let mut current = Coord { x: 0.0, y: 0.0 };
        let mut offsets = Vec::with_capacity(frames);
        for t in 0..frames {
            if t > 0 {
                if let Some(normal) = &normal {
                    let dx: f64 = normal.sample(&mut self.rng);
                    let dy: f64 = normal.sample(&mut self.rng);
                    current.x += dx.clamp(-self.max_step, self.max_step);
                    current.y += dy.clamp(-self.max_step, self.max_step);
                }
            }
            offsets.push(current);
        }
        offsets
    }

    fn shifted(polygons: Vec<Polygon<f64>>, labels: Vec<usize>, offset: Coord<f64>) -> SyntheticFrame {
        SyntheticFrame {
            polygons: polygons
                .into_iter()
                .map(|p| p.translate(offset.x, offset.y))
                .collect(),
            labels,
        }
    }

    fn grid(rows: usize, cols: usize) -> (Vec<Polygon<f64>>, Vec<usize>) {
        let mut polygons = Vec::with_capacity(rows * cols);
        let mut labels = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let (x, y) = (c as f64, r as f64);
                polygons.push(rect(x, y, x + 1.0, y + 1.0));
                labels.push(r * cols + c);
            }
        }
        (polygons, labels)
    }

    // ========================================================================
    // LAYOUTS
    // ========================================================================

    /// A grid drifting as a whole. Every cell lives through every frame.
    pub fn drift(&mut self, rows: usize, cols: usize, frames: usize) -> Vec<SyntheticFrame> {
        self.offsets(frames)
            .into_iter()
            .map(|offset| {
                let (polygons, labels) = Self::grid(rows, cols);
                Self::shifted(polygons, labels, offset)
            })
            .collect()
    }

    /// The center cell splits vertically at frame `at`.
    ///
    /// Daughters get labels `rows * cols` (left) and `rows * cols + 1` (right).
    pub fn division(&mut self, rows: usize, cols: usize, frames: usize, at: usize) -> Vec<SyntheticFrame> {
        let center = Self::center(rows, cols);
        let n = rows * cols;
        self.offsets(frames)
            .into_iter()
            .enumerate()
            .map(|(t, offset)| {
                let (mut polygons, mut labels) = Self::grid(rows, cols);
                if t >= at {
                    let (x, y) = ((center % cols) as f64, (center / cols) as f64);
                    let cut = x + DIVISION_SPLIT;
                    polygons[center] = rect(x, y, cut, y + 1.0);
                    labels[center] = n;
                    polygons.push(rect(cut, y, x + 1.0, y + 1.0));
                    labels.push(n + 1);
                }
                Self::shifted(polygons, labels, offset)
            })
            .collect()
    }

    /// The center cell vanishes from frame `at` on, leaving a hole.
    pub fn elimination(&mut self, rows: usize, cols: usize, frames: usize, at: usize) -> Vec<SyntheticFrame> {
        let center = Self::center(rows, cols);
        self.offsets(frames)
            .into_iter()
            .enumerate()
            .map(|(t, offset)| {
                let (mut polygons, mut labels) = Self::grid(rows, cols);
                if t >= at {
                    polygons.remove(center);
                    labels.remove(center);
                }
                Self::shifted(polygons, labels, offset)
            })
            .collect()
    }

    /// Four cells inside a ring of four border cells exchange neighbors at frame `at`.
    ///
    /// Labels: 0 bottom, 1 top, 2 left, 3 right, 4..8 the ring. Left and right
    /// share an edge before `at`; bottom and top share one afterwards.
    pub fn intercalation(&mut self, frames: usize, at: usize) -> Vec<SyntheticFrame> {
        let ring = || {
            vec![
                rect(-1.0, -1.0, 4.0, 0.0),
                rect(-1.0, 3.0, 4.0, 4.0),
                rect(-1.0, 0.0, 0.0, 3.0),
                rect(3.0, 0.0, 4.0, 3.0),
            ]
        };
        self.offsets(frames)
            .into_iter()
            .enumerate()
            .map(|(t, offset)| {
                let mut polygons = if t < at {
                    vec![
                        polygon![(x: 0.0, y: 0.0), (x: 3.0, y: 0.0), (x: 1.5, y: 1.0)],
                        polygon![(x: 0.0, y: 3.0), (x: 1.5, y: 2.0), (x: 3.0, y: 3.0)],
                        polygon![(x: 0.0, y: 0.0), (x: 1.5, y: 1.0), (x: 1.5, y: 2.0), (x: 0.0, y: 3.0)],
                        polygon![(x: 3.0, y: 0.0), (x: 3.0, y: 3.0), (x: 1.5, y: 2.0), (x: 1.5, y: 1.0)],
                    ]
                } else {
                    vec![
                        polygon![(x: 0.0, y: 0.0), (x: 3.0, y: 0.0), (x: 2.0, y: 1.5), (x: 1.0, y: 1.5)],
                        polygon![(x: 0.0, y: 3.0), (x: 1.0, y: 1.5), (x: 2.0, y: 1.5), (x: 3.0, y: 3.0)],
                        polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.5), (x: 0.0, y: 3.0)],
                        polygon![(x: 3.0, y: 0.0), (x: 3.0, y: 3.0), (x: 2.0, y: 1.5)],
                    ]
                };
                polygons.extend(ring());
                let labels = (0..polygons.len()).collect();
                Self::shifted(polygons, labels, offset)
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
