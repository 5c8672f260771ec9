//! Phase-locking value analysis
//!
//! Measures the consistency of the phase difference between two oscillatory
//! signals over time. A PLV of 1 means perfect phase locking; 0 means a
//! uniformly random phase offset.

use dyadsync_core::math::constants;
use dyadsync_core::{AnalysisError, AnalysisResult, PlvSignificance};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::hilbert;
use crate::preprocess;

/// Configuration for [`PlvAnalyzer`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlvConfig {
    /// Sampling rate of the signals in Hz
    pub sampling_rate: f64,
    /// Frequency band for phase extraction (low, high) in Hz
    pub filter_band: (f64, f64),
}

impl Default for PlvConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 1000.0,
            filter_band: constants::DEFAULT_PLV_BAND,
        }
    }
}

/// Phase-locking value engine.
///
/// Stateless: every method is a pure function of its inputs and the
/// configuration.
#[derive(Clone, Debug, Default)]
pub struct PlvAnalyzer {
    config: PlvConfig,
}

impl PlvAnalyzer {
    /// Create an analyzer with the given configuration
    #[must_use]
    pub fn new(config: PlvConfig) -> Self {
        Self { config }
    }

    /// Create an analyzer from a sampling rate and filter band
    #[must_use]
    pub fn with_band(sampling_rate: f64, filter_band: (f64, f64)) -> Self {
        Self::new(PlvConfig {
            sampling_rate,
            filter_band,
        })
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &PlvConfig {
        &self.config
    }

    /// Band-limit a signal and extract its instantaneous phase.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::EmptyInput`] for an empty signal.
    pub fn extract_phase(&self, signal: &[f64]) -> AnalysisResult<Vec<f64>> {
        if signal.is_empty() {
            return Err(AnalysisError::EmptyInput { name: "signal" });
        }
        let (low, high) = self.config.filter_band;
        let filtered = preprocess::bandpass_for_phase(signal, self.config.sampling_rate, low, high);
        Ok(hilbert::instantaneous_phase(&filtered))
    }

    /// Scalar PLV over the whole signal pair.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::LengthMismatch`] for unequal lengths and
    /// [`AnalysisError::EmptyInput`] for empty signals.
    pub fn compute(&self, signal1: &[f64], signal2: &[f64]) -> AnalysisResult<f64> {
        validate_pair(signal1, signal2)?;
        let phase1 = self.extract_phase(signal1)?;
        let phase2 = self.extract_phase(signal2)?;
        Ok(plv_from_phases(&phase1, &phase2))
    }

    /// Sliding-window PLV.
    ///
    /// Phases are extracted once over the full signals, then the PLV is
    /// evaluated per window of `window_size` samples with step
    /// `window_size * (1 - overlap)`.
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
    ) -> AnalysisResult<Vec<f64>> {
        validate_pair(signal1, signal2)?;
        let step = window_step(window_size, overlap)?;
        if window_size > signal1.len() {
            return Err(AnalysisError::InsufficientData {
                got: signal1.len(),
                need: window_size,
            });
        }

        let phase1 = self.extract_phase(signal1)?;
        let phase2 = self.extract_phase(signal2)?;

        let values = (0..=phase1.len() - window_size)
            .step_by(step)
            .map(|start| {
                let end = start + window_size;
                plv_from_phases(&phase1[start..end], &phase2[start..end])
            })
            .collect();
        Ok(values)
    }

    /// Pairwise PLV matrix over a channel set.
    ///
    /// The matrix is symmetric with a unit diagonal. Channel pairs are
    /// evaluated in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::EmptyInput`] for an empty channel set and
    /// [`AnalysisError::LengthMismatch`] when channels differ in length.
    pub fn compute_matrix(&self, signals: &[Vec<f64>]) -> AnalysisResult<Vec<Vec<f64>>> {
        if signals.is_empty() {
            return Err(AnalysisError::EmptyInput { name: "signals" });
        }
        for channel in signals {
            validate_pair(&signals[0], channel)?;
        }

        let phases: Vec<Vec<f64>> = signals
            .par_iter()
            .map(|channel| self.extract_phase(channel))
            .collect::<AnalysisResult<_>>()?;

        let n = signals.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        let values: Vec<f64> = pairs
            .par_iter()
            .map(|&(i, j)| plv_from_phases(&phases[i], &phases[j]))
            .collect();

        let mut matrix = vec![vec![0.0; n]; n];
        for row in 0..n {
            matrix[row][row] = 1.0;
        }
        for (&(i, j), &plv) in pairs.iter().zip(values.iter()) {
            matrix[i][j] = plv;
            matrix[j][i] = plv;
        }
        Ok(matrix)
    }

    /// Surrogate significance test for the observed PLV.
    ///
    /// Surrogates keep the second signal's amplitude envelope and randomly
    /// permute its phase sequence, recombined as `amplitude * cos(phase)`.
    /// The empirical p-value is the fraction of surrogate PLVs at or above
    /// the observed PLV; significance is judged against the 95th percentile
    /// of the surrogate distribution.
    ///
    /// # Errors
    ///
    /// Validation errors as for [`compute`](Self::compute), plus
    /// [`AnalysisError::InvalidParameter`] for a zero surrogate count.
    pub fn test_significance(
        &self,
        signal1: &[f64],
        signal2: &[f64],
        n_surrogates: usize,
    ) -> AnalysisResult<PlvSignificance> {
        self.significance_with_rng(signal1, signal2, n_surrogates, StdRng::from_entropy())
    }

    /// Seeded variant of [`test_significance`](Self::test_significance) for
    /// reproducible surrogate draws.
    ///
    /// # Errors
    ///
    /// As for [`test_significance`](Self::test_significance).
    pub fn test_significance_seeded(
        &self,
        signal1: &[f64],
        signal2: &[f64],
        n_surrogates: usize,
        seed: u64,
    ) -> AnalysisResult<PlvSignificance> {
        self.significance_with_rng(signal1, signal2, n_surrogates, StdRng::seed_from_u64(seed))
    }

    fn significance_with_rng(
        &self,
        signal1: &[f64],
        signal2: &[f64],
        n_surrogates: usize,
        mut rng: StdRng,
    ) -> AnalysisResult<PlvSignificance> {
        validate_pair(signal1, signal2)?;
        if n_surrogates == 0 {
            return Err(AnalysisError::InvalidParameter {
                parameter: "n_surrogates",
                reason: "must be at least 1".to_string(),
            });
        }

        let phase1 = self.extract_phase(signal1)?;
        let phase2 = self.extract_phase(signal2)?;
        let observed = plv_from_phases(&phase1, &phase2);

        // Amplitude envelope of the raw signal; the permuted phases come
        // from the band-limited one.
        let amplitude = hilbert::amplitude_envelope(signal2);

        // Draw all permutations from the single RNG stream, then evaluate
        // the expensive filter + transform per surrogate in parallel.
        let permutations: Vec<Vec<f64>> = (0..n_surrogates)
            .map(|_| {
                let mut permuted = phase2.clone();
                permuted.shuffle(&mut rng);
                permuted
            })
            .collect();

        let surrogate_plvs: Vec<f64> = permutations
            .par_iter()
            .map(|permuted| {
                let surrogate: Vec<f64> = amplitude
                    .iter()
                    .zip(permuted.iter())
                    .map(|(&amp, &phase)| amp * phase.cos())
                    .collect();
                let (low, high) = self.config.filter_band;
                let filtered = preprocess::bandpass_for_phase(
                    &surrogate,
                    self.config.sampling_rate,
                    low,
                    high,
                );
                plv_from_phases(&phase1, &hilbert::instantaneous_phase(&filtered))
            })
            .collect();

        let exceeding = surrogate_plvs.iter().filter(|&&p| p >= observed).count();
        let p_value = exceeding as f64 / n_surrogates as f64;
        let threshold_95 = percentile(&surrogate_plvs, 95.0);

        Ok(PlvSignificance {
            plv: observed,
            p_value,
            threshold_95,
            is_significant: observed > threshold_95,
            n_surrogates,
        })
    }
}

/// `|mean over time of exp(i * (phase1 - phase2))|`
#[must_use]
pub(crate) fn plv_from_phases(phase1: &[f64], phase2: &[f64]) -> f64 {
    debug_assert_eq!(phase1.len(), phase2.len());
    if phase1.is_empty() {
        return 0.0;
    }
    let mut re = 0.0;
    let mut im = 0.0;
    for (&p1, &p2) in phase1.iter().zip(phase2.iter()) {
        let diff = p1 - p2;
        re += diff.cos();
        im += diff.sin();
    }
    let n = phase1.len() as f64;
    (re * re + im * im).sqrt() / n
}

/// Window step from size and overlap ratio, clamped to at least one sample.
pub(crate) fn window_step(window_size: usize, overlap: f64) -> AnalysisResult<usize> {
    if window_size == 0 {
        return Err(AnalysisError::InvalidParameter {
            parameter: "window_size",
            reason: "must be at least 1".to_string(),
        });
    }
    if !(0.0..1.0).contains(&overlap) {
        return Err(AnalysisError::InvalidParameter {
            parameter: "overlap",
            reason: format!("must be in [0, 1), got {overlap}"),
        });
    }
    Ok(((window_size as f64 * (1.0 - overlap)) as usize).max(1))
}

/// Percentile with linear interpolation between closest ranks.
pub(crate) fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = rank - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, sample_rate: f64, n: usize, phase: f64) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate + phase).sin())
            .collect()
    }

    fn pseudo_noise(n: usize, salt: f64) -> Vec<f64> {
        (0..n)
            .map(|i| ((i as f64 * 12.9898 + salt) * 43758.5453).sin().fract())
            .collect()
    }

    fn analyzer_250hz() -> PlvAnalyzer {
        PlvAnalyzer::with_band(250.0, (8.0, 12.0))
    }

    #[test]
    fn test_self_plv_is_one() {
        let signal = sine(10.0, 250.0, 1000, 0.0);
        let plv = analyzer_250hz().compute(&signal, &signal).unwrap();
        assert!((plv - 1.0).abs() < 1e-12, "PLV(A, A) = {plv}");
    }

    #[test]
    fn test_plv_in_unit_interval() {
        let a = pseudo_noise(600, 1.0);
        let b = pseudo_noise(600, 7.0);
        let plv = analyzer_250hz().compute(&a, &b).unwrap();
        assert!((0.0..=1.0).contains(&plv), "PLV out of range: {plv}");
    }

    #[test]
    fn test_constant_offset_locks_phase() {
        let a = sine(10.0, 250.0, 2000, 0.0);
        let b = sine(10.0, 250.0, 2000, PI / 4.0);
        let plv = analyzer_250hz().compute(&a, &b).unwrap();
        assert!(plv > 0.95, "PLV {plv} for a constant 45 degree offset");
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let a = vec![0.0; 100];
        let b = vec![0.0; 99];
        let err = analyzer_250hz().compute(&a, &b).unwrap_err();
        assert!(matches!(err, AnalysisError::LengthMismatch { left: 100, right: 99 }));
    }

    #[test]
    fn test_empty_rejected() {
        let err = analyzer_250hz().compute(&[], &[]).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyInput { .. }));
    }

    #[test]
    fn test_windowed_full_length_reduces_to_scalar() {
        let a = sine(10.0, 250.0, 1000, 0.0);
        let b = sine(10.0, 250.0, 1000, 1.0);
        let analyzer = analyzer_250hz();
        let scalar = analyzer.compute(&a, &b).unwrap();
        let windowed = analyzer.compute_windowed(&a, &b, 1000, 0.5).unwrap();
        assert_eq!(windowed.len(), 1);
        assert!((windowed[0] - scalar).abs() < 1e-12);
    }

    #[test]
    fn test_windowed_count() {
        let a = sine(10.0, 250.0, 1000, 0.0);
        let b = sine(10.0, 250.0, 1000, 0.5);
        // window 200, overlap 0.5 -> step 100 -> starts 0, 100, ..., 800
        let windowed = analyzer_250hz().compute_windowed(&a, &b, 200, 0.5).unwrap();
        assert_eq!(windowed.len(), 9);
        for &plv in &windowed {
            assert!((0.0..=1.0).contains(&plv));
        }
    }

    #[test]
    fn test_windowed_rejects_bad_overlap() {
        let a = vec![0.0; 100];
        let err = analyzer_250hz()
            .compute_windowed(&a, &a, 50, 1.0)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { parameter: "overlap", .. }));
    }

    #[test]
    fn test_matrix_symmetric_unit_diagonal() {
        let signals = vec![
            sine(10.0, 250.0, 500, 0.0),
            sine(10.0, 250.0, 500, PI / 3.0),
            pseudo_noise(500, 3.0),
        ];
        let matrix = analyzer_250hz().compute_matrix(&signals).unwrap();
        for i in 0..3 {
            assert!((matrix[i][i] - 1.0).abs() < 1e-12);
            for j in 0..3 {
                assert!((matrix[i][j] - matrix[j][i]).abs() < 1e-12);
                assert!((0.0..=1.0 + 1e-12).contains(&matrix[i][j]));
            }
        }
    }

    #[test]
    fn test_matrix_rejects_ragged_channels() {
        let signals = vec![vec![0.0; 100], vec![0.0; 90]];
        let err = analyzer_250hz().compute_matrix(&signals).unwrap_err();
        assert!(matches!(err, AnalysisError::LengthMismatch { .. }));
    }

    #[test]
    fn test_significance_detects_locked_pair() {
        let a = sine(10.0, 250.0, 1000, 0.0);
        let b = sine(10.0, 250.0, 1000, PI / 4.0);
        let result = analyzer_250hz()
            .test_significance_seeded(&a, &b, 60, 42)
            .unwrap();
        assert!(result.plv > 0.9);
        assert!(result.is_significant, "locked pair not significant: {result:?}");
        assert!(result.p_value <= 0.05, "p = {}", result.p_value);
        assert!(result.threshold_95 < result.plv);
        assert_eq!(result.n_surrogates, 60);
    }

    #[test]
    fn test_significance_is_reproducible_with_seed() {
        let a = sine(10.0, 250.0, 600, 0.0);
        let b = pseudo_noise(600, 5.0);
        let analyzer = analyzer_250hz();
        let first = analyzer.test_significance_seeded(&a, &b, 30, 7).unwrap();
        let second = analyzer.test_significance_seeded(&a, &b, 30, 7).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_significance_rejects_zero_surrogates() {
        let a = vec![1.0; 64];
        let err = analyzer_250hz().test_significance(&a, &a, 0).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { parameter: "n_surrogates", .. }));
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&values, 0.0) - 1.0).abs() < 1e-12);
        assert!((percentile(&values, 100.0) - 4.0).abs() < 1e-12);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&values, 95.0) - 3.85).abs() < 1e-12);
    }

    #[test]
    fn test_window_step_clamps_to_one() {
        // Tiny windows with heavy overlap still advance
        assert_eq!(window_step(2, 0.9).unwrap(), 1);
        assert_eq!(window_step(10, 0.5).unwrap(), 5);
        assert_eq!(window_step(10, 0.0).unwrap(), 10);
    }
}
