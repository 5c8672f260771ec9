//! Cross-recurrence quantification analysis
//!
//! Quantifies shared recurrence structure between two signals' reconstructed
//! phase-space trajectories: delay embedding, cross-recurrence thresholding,
//! and a census of diagonal and vertical line structure.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use dyadsync_core::math::constants;
use dyadsync_core::{
    AnalysisError, AnalysisResult, CrqaMeasures, CrqaWindow, DistanceMetric, WindowedCrqa,
};

use crate::plv::window_step;
use crate::preprocess;

/// Configuration for [`CrqaAnalyzer`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrqaConfig {
    /// Embedding dimension m (>= 1)
    pub embedding_dimension: usize,
    /// Time delay tau in samples (>= 1)
    pub time_delay: usize,
    /// Recurrence radius; when `None` the radius defaults to a fixed fraction
    /// of the maximum observed cross-distance (data-dependent)
    pub radius: Option<f64>,
    /// Distance metric over embedded points
    pub distance_metric: DistanceMetric,
    /// Z-score both signals independently before embedding
    pub normalize: bool,
}

impl Default for CrqaConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: 3,
            time_delay: 1,
            radius: None,
            distance_metric: DistanceMetric::Euclidean,
            normalize: true,
        }
    }
}

/// Maximal contiguous run of recurrent cells along a diagonal or a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LineSegment {
    start_row: usize,
    start_col: usize,
    length: usize,
}

/// Cross-recurrence quantification engine.
#[derive(Clone, Debug, Default)]
pub struct CrqaAnalyzer {
    config: CrqaConfig,
}

impl CrqaAnalyzer {
    /// Create an analyzer with the given configuration
    #[must_use]
    pub fn new(config: CrqaConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &CrqaConfig {
        &self.config
    }

    /// CRQA measures for one signal pair.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::LengthMismatch`] / [`AnalysisError::EmptyInput`] on
    /// invalid pairs, [`AnalysisError::InvalidParameter`] on a zero embedding
    /// dimension or delay, and [`AnalysisError::EmbeddingTooShort`] when
    /// either series has no room for the requested embedding.
    pub fn compute(&self, signal1: &[f64], signal2: &[f64]) -> AnalysisResult<CrqaMeasures> {
        validate_pair(signal1, signal2)?;

        let prepared1 = self.prepare(signal1);
        let prepared2 = self.prepare(signal2);

        let embedded1 = self.embed(&prepared1)?;
        let embedded2 = self.embed(&prepared2)?;

        let distances = self.cross_distances(&embedded1, &embedded2);
        let radius = self.config.radius.unwrap_or_else(|| {
            constants::AUTO_RADIUS_FRACTION * distances.iter().fold(0.0f64, |m, &d| m.max(d))
        });

        let recurrence = distances.mapv(|d| d <= radius);
        Ok(measures_from_matrix(&recurrence, radius))
    }

    /// Sliding-window CRQA.
    ///
    /// Each window is independently normalized, embedded, thresholded, and
    /// measured. A window too short for the configured embedding is skipped
    /// with a warning and counted in the result's `skipped` tally instead of
    /// aborting the batch.
    ///
    /// # Errors
    ///
    /// Validation errors as for [`compute`](Self::compute), plus
    /// [`AnalysisError::InvalidParameter`] for a zero window or an overlap
    /// outside `[0, 1)`, and [`AnalysisError::InsufficientData`] when the
    /// window exceeds the signal length.
    pub fn compute_windowed(
        &self,
        signal1: &[f64],
        signal2: &[f64],
        window_size: usize,
        overlap: f64,
    ) -> AnalysisResult<WindowedCrqa> {
        validate_pair(signal1, signal2)?;
        let step = window_step(window_size, overlap)?;
        if window_size > signal1.len() {
            return Err(AnalysisError::InsufficientData {
                got: signal1.len(),
                need: window_size,
            });
        }

        let mut result = WindowedCrqa::default();
        for start in (0..=signal1.len() - window_size).step_by(step) {
            let end = start + window_size;
            match self.compute(&signal1[start..end], &signal2[start..end]) {
                Ok(measures) => result.windows.push(CrqaWindow {
                    start,
                    end,
                    measures,
                }),
                Err(
                    err @ (AnalysisError::EmbeddingTooShort { .. }
                    | AnalysisError::InsufficientData { .. }),
                ) => {
                    tracing::warn!(start, end, error = %err, "skipping CRQA window");
                    result.skipped += 1;
                }
                Err(other) => return Err(other),
            }
        }
        Ok(result)
    }

    fn prepare(&self, signal: &[f64]) -> Vec<f64> {
        if self.config.normalize {
            preprocess::zscore(signal)
        } else {
            signal.to_vec()
        }
    }

    /// Delay-embed a signal into an `(n - (m-1)*tau) x m` trajectory matrix.
    fn embed(&self, signal: &[f64]) -> AnalysisResult<Array2<f64>> {
        let m = self.config.embedding_dimension;
        let tau = self.config.time_delay;
        if m == 0 {
            return Err(AnalysisError::InvalidParameter {
                parameter: "embedding_dimension",
                reason: "must be at least 1".to_string(),
            });
        }
        if tau == 0 {
            return Err(AnalysisError::InvalidParameter {
                parameter: "time_delay",
                reason: "must be at least 1".to_string(),
            });
        }

        let n = signal.len();
        let span = (m - 1) * tau;
        if n <= span {
            return Err(AnalysisError::EmbeddingTooShort {
                samples: n,
                dimension: m,
                delay: tau,
            });
        }

        let rows = n - span;
        Ok(Array2::from_shape_fn((rows, m), |(i, j)| signal[i + j * tau]))
    }

    /// Full pairwise cross-distance matrix between embedded points.
    fn cross_distances(&self, embedded1: &Array2<f64>, embedded2: &Array2<f64>) -> Array2<f64> {
        let metric = self.config.distance_metric;
        Array2::from_shape_fn((embedded1.nrows(), embedded2.nrows()), |(i, j)| {
            let a = embedded1.row(i);
            let b = embedded2.row(j);
            match metric {
                DistanceMetric::Euclidean => a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f64>()
                    .sqrt(),
                DistanceMetric::Manhattan => {
                    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
                }
                DistanceMetric::Chebyshev => a
                    .iter()
                    .zip(b.iter())
                    .fold(0.0f64, |m, (x, y)| m.max((x - y).abs())),
            }
        })
    }
}

/// Derive the CRQA measures from a thresholded recurrence matrix.
fn measures_from_matrix(recurrence: &Array2<bool>, radius: f64) -> CrqaMeasures {
    let (n_rows, n_cols) = recurrence.dim();
    let total_cells = (n_rows * n_cols) as f64;
    let recurrent = recurrence.iter().filter(|&&cell| cell).count();

    let diagonals = diagonal_lines(recurrence, constants::MIN_LINE_LENGTH);
    let verticals = vertical_lines(recurrence, constants::MIN_LINE_LENGTH);

    let diagonal_total: usize = diagonals.iter().map(|line| line.length).sum();
    let vertical_total: usize = verticals.iter().map(|line| line.length).sum();

    let ratio = |numerator: usize| {
        if recurrent > 0 {
            numerator as f64 / recurrent as f64
        } else {
            0.0
        }
    };
    let mean_length = |lines: &[LineSegment], total: usize| {
        if lines.is_empty() {
            0.0
        } else {
            total as f64 / lines.len() as f64
        }
    };
    let max_length = |lines: &[LineSegment]| {
        lines.iter().map(|line| line.length).max().unwrap_or(0) as f64
    };

    CrqaMeasures {
        recurrence_rate: recurrent as f64 / total_cells,
        determinism: ratio(diagonal_total),
        avg_diagonal_length: mean_length(&diagonals, diagonal_total),
        max_diagonal_length: max_length(&diagonals),
        laminarity: ratio(vertical_total),
        trapping_time: mean_length(&verticals, vertical_total),
        max_vertical_length: max_length(&verticals),
        entropy: length_entropy(&diagonals),
        radius,
    }
}

/// Census of diagonal lines (runs along the (+1, +1) direction).
///
/// Scan order is rows-then-columns; each recurrent cell is consumed once it
/// is assigned to a counted line, tracked in a visited mask so the matrix
/// itself is never mutated. Runs below the minimum length stay unconsumed.
fn diagonal_lines(recurrence: &Array2<bool>, min_length: usize) -> Vec<LineSegment> {
    let (n_rows, n_cols) = recurrence.dim();
    let mut visited = Array2::from_elem((n_rows, n_cols), false);
    let mut lines = Vec::new();

    for start_row in 0..n_rows {
        for start_col in 0..n_cols {
            if !recurrence[[start_row, start_col]] || visited[[start_row, start_col]] {
                continue;
            }

            let mut length = 0;
            let (mut row, mut col) = (start_row, start_col);
            while row < n_rows
                && col < n_cols
                && recurrence[[row, col]]
                && !visited[[row, col]]
            {
                length += 1;
                row += 1;
                col += 1;
            }

            if length >= min_length {
                lines.push(LineSegment {
                    start_row,
                    start_col,
                    length,
                });
                for k in 0..length {
                    visited[[start_row + k, start_col + k]] = true;
                }
            }
        }
    }

    lines
}

/// Census of vertical lines (fixed column, +1-row direction), scanned
/// columns-then-rows with the same consumption rule as [`diagonal_lines`].
fn vertical_lines(recurrence: &Array2<bool>, min_length: usize) -> Vec<LineSegment> {
    let (n_rows, n_cols) = recurrence.dim();
    let mut visited = Array2::from_elem((n_rows, n_cols), false);
    let mut lines = Vec::new();

    for start_col in 0..n_cols {
        for start_row in 0..n_rows {
            if !recurrence[[start_row, start_col]] || visited[[start_row, start_col]] {
                continue;
            }

            let mut length = 0;
            let mut row = start_row;
            while row < n_rows && recurrence[[row, start_col]] && !visited[[row, start_col]] {
                length += 1;
                row += 1;
            }

            if length >= min_length {
                lines.push(LineSegment {
                    start_row,
                    start_col,
                    length,
                });
                for k in 0..length {
                    visited[[start_row + k, start_col]] = true;
                }
            }
        }
    }

    lines
}

/// Base-2 Shannon entropy over the distribution of diagonal line lengths.
fn length_entropy(lines: &[LineSegment]) -> f64 {
    if lines.is_empty() {
        return 0.0;
    }

    let mut counts = std::collections::BTreeMap::new();
    for line in lines {
        *counts.entry(line.length).or_insert(0usize) += 1;
    }

    let total = lines.len() as f64;
    -counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

fn validate_pair(signal1: &[f64], signal2: &[f64]) -> AnalysisResult<()> {
    if signal1.is_empty() {
        return Err(AnalysisError::EmptyInput { name: "signal1" });
    }
    if signal2.is_empty() {
        return Err(AnalysisError::EmptyInput { name: "signal2" });
    }
    if signal1.len() != signal2.len() {
        return Err(AnalysisError::LengthMismatch {
            left: signal1.len(),
            right: signal2.len(),
        });
    }
    Ok(())
}
