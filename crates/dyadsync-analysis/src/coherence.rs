//! Inter-brain coherence analysis
//!
//! Spectral, wavelet, and phase coherence for slow optical neuroimaging
//! signals, plus multi-channel hyperscanning matrices. All coherence values
//! land in `[0, 1]`; zero-power denominators resolve to 0 by convention so
//! aggregate pipelines keep running.

use std::collections::BTreeMap;

use ndarray::Array2;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use dyadsync_core::math::constants;
use dyadsync_core::{
    AnalysisError, AnalysisResult, CoherenceSpectrum, FrequencyBand, HyperscanningMetrics,
    PhaseCoherence, PhaseMethod, SpectralCoherence, WaveletCoherence,
};

use crate::hilbert;
use crate::plv::plv_from_phases;
use crate::preprocess::{self, PreprocessOptions};
use crate::wavelet;

/// Configuration for [`CoherenceAnalyzer`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoherenceConfig {
    /// Sampling rate of the signals in Hz
    pub sampling_rate: f64,
    /// Frequency bands for aggregation
    pub bands: Vec<FrequencyBand>,
    /// Number of log-spaced CWT scales
    pub wavelet_scales: usize,
    /// Frequency range spanned by the CWT scales, Hz
    pub wavelet_range_hz: (f64, f64),
    /// Centered moving-average window for wavelet spectrum smoothing, samples
    pub smoothing_window: usize,
    /// Welch segment length cap in seconds of samples
    pub max_segment_seconds: f64,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 10.0,
            bands: FrequencyBand::default_fnirs_bands(),
            wavelet_scales: constants::DEFAULT_WAVELET_SCALES,
            wavelet_range_hz: (constants::FNIRS_BAND_LOW_HZ, constants::FNIRS_BAND_HIGH_HZ),
            smoothing_window: constants::SMOOTHING_WINDOW,
            max_segment_seconds: constants::MAX_SEGMENT_SECONDS,
        }
    }
}

impl CoherenceConfig {
    /// Configuration with a given sampling rate and the default bands
    #[must_use]
    pub fn with_rate(sampling_rate: f64) -> Self {
        Self {
            sampling_rate,
            ..Self::default()
        }
    }
}

/// Coherence engine for dyadic fNIRS-style recordings.
#[derive(Clone, Debug, Default)]
pub struct CoherenceAnalyzer {
    config: CoherenceConfig,
}

impl CoherenceAnalyzer {
    /// Create an analyzer with the given configuration
    #[must_use]
    pub fn new(config: CoherenceConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &CoherenceConfig {
        &self.config
    }

    /// Detrend and band-limit a signal over the configured analysis range.
    #[must_use]
    pub fn preprocess_signal(&self, signal: &[f64]) -> Vec<f64> {
        preprocess::preprocess(
            signal,
            self.config.sampling_rate,
            self.band_range(),
            PreprocessOptions::default(),
        )
    }

    /// Magnitude-squared spectral coherence via segmented cross/auto-spectral
    /// estimation, with band aggregates.
    ///
    /// # Errors
    ///
    /// Validation errors on mismatched or empty signals;
    /// [`AnalysisError::InsufficientData`] when the pair is too short to form
    /// a spectral segment.
    pub fn spectral(&self, signal1: &[f64], signal2: &[f64]) -> AnalysisResult<SpectralCoherence> {
        validate_pair(signal1, signal2)?;
        let processed1 = self.preprocess_signal(signal1);
        let processed2 = self.preprocess_signal(signal2);

        let spectrum = self.welch_coherence(&processed1, &processed2)?;
        let band_coherence = band_means(&self.config.bands, &spectrum.frequencies, &spectrum.values);
        let mean_coherence = mean(&spectrum.values);

        Ok(SpectralCoherence {
            spectrum,
            band_coherence,
            mean_coherence,
        })
    }

    /// Wavelet (time-frequency) coherence over the configured scale set.
    ///
    /// Cross and auto spectra are smoothed along time with a centered moving
    /// average before forming the coherence ratio.
    ///
    /// # Errors
    ///
    /// Validation errors on mismatched or empty signals.
    pub fn wavelet(&self, signal1: &[f64], signal2: &[f64]) -> AnalysisResult<WaveletCoherence> {
        validate_pair(signal1, signal2)?;
        let (frequencies, cwt1, cwt2) = self.transform_pair(signal1, signal2);

        let n_scales = cwt1.nrows();
        let n_time = cwt1.ncols();

        let cross = Array2::from_shape_fn((n_scales, n_time), |(i, j)| {
            cwt1[[i, j]] * cwt2[[i, j]].conj()
        });
        let auto1 = cwt1.mapv(|z| z.norm_sqr());
        let auto2 = cwt2.mapv(|z| z.norm_sqr());

        let window = self.config.smoothing_window;
        let smoothed_cross = smooth_rows_complex(&cross, window);
        let smoothed_auto1 = smooth_rows(&auto1, window);
        let smoothed_auto2 = smooth_rows(&auto2, window);

        let coherence = Array2::from_shape_fn((n_scales, n_time), |(i, j)| {
            coherence_ratio(
                smoothed_cross[[i, j]].norm_sqr(),
                smoothed_auto1[[i, j]] * smoothed_auto2[[i, j]],
            )
        });

        let band_coherence = band_row_means(&self.config.bands, &frequencies, &coherence);
        let mean_coherence = if coherence.is_empty() {
            0.0
        } else {
            coherence.iter().sum::<f64>() / coherence.len() as f64
        };

        Ok(WaveletCoherence {
            frequencies,
            coherence: coherence
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            band_coherence,
            mean_coherence,
        })
    }

    /// Phase coherence via analytic-signal phases or the cross-wavelet
    /// spectrum.
    ///
    /// # Errors
    ///
    /// Validation errors on mismatched or empty signals.
    pub fn phase(
        &self,
        signal1: &[f64],
        signal2: &[f64],
        method: PhaseMethod,
    ) -> AnalysisResult<PhaseCoherence> {
        validate_pair(signal1, signal2)?;

        let coherence = match method {
            PhaseMethod::Hilbert => {
                let processed1 = self.preprocess_signal(signal1);
                let processed2 = self.preprocess_signal(signal2);
                let phase1 = hilbert::instantaneous_phase(&processed1);
                let phase2 = hilbert::instantaneous_phase(&processed2);
                plv_from_phases(&phase1, &phase2)
            }
            PhaseMethod::Wavelet => {
                // Phase of the unsmoothed cross-wavelet spectrum, aggregated
                // jointly over every scale/time cell.
                let (_, cwt1, cwt2) = self.transform_pair(signal1, signal2);
                let mut re = 0.0;
                let mut im = 0.0;
                for (z1, z2) in cwt1.iter().zip(cwt2.iter()) {
                    let cross = z1 * z2.conj();
                    let angle = cross.im.atan2(cross.re);
                    re += angle.cos();
                    im += angle.sin();
                }
                let cells = (cwt1.len()) as f64;
                if cells > 0.0 {
                    (re * re + im * im).sqrt() / cells
                } else {
                    0.0
                }
            }
        };

        Ok(PhaseCoherence { coherence, method })
    }

    /// Inter-/intra-brain coherence structure for two multi-channel
    /// participants.
    ///
    /// Builds the full inter-brain spectral- and phase-coherence matrices
    /// over every channel pair plus each participant's symmetric intra-brain
    /// matrix; channel pairs are evaluated in parallel.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::EmptyInput`] for empty channel sets,
    /// [`AnalysisError::LengthMismatch`] for ragged channels within a
    /// participant, and [`AnalysisError::TimePointMismatch`] when the two
    /// participants differ in time-point count.
    pub fn hyperscanning(
        &self,
        participant1: &[Vec<f64>],
        participant2: &[Vec<f64>],
    ) -> AnalysisResult<HyperscanningMetrics> {
        validate_channels(participant1, "participant1")?;
        validate_channels(participant2, "participant2")?;
        if participant1[0].len() != participant2[0].len() {
            return Err(AnalysisError::TimePointMismatch {
                left: participant1[0].len(),
                right: participant2[0].len(),
            });
        }

        let n1 = participant1.len();
        let n2 = participant2.len();

        let pairs: Vec<(usize, usize)> = (0..n1)
            .flat_map(|i| (0..n2).map(move |j| (i, j)))
            .collect();
        let pair_values: Vec<(f64, f64)> = pairs
            .par_iter()
            .map(|&(i, j)| {
                let spectral = self.spectral(&participant1[i], &participant2[j])?;
                let phase = self.phase(&participant1[i], &participant2[j], PhaseMethod::Hilbert)?;
                Ok((spectral.mean_coherence, phase.coherence))
            })
            .collect::<AnalysisResult<_>>()?;

        let mut inter = vec![vec![0.0; n2]; n1];
        let mut inter_phase = vec![vec![0.0; n2]; n1];
        for (&(i, j), &(coh, ph)) in pairs.iter().zip(pair_values.iter()) {
            inter[i][j] = coh;
            inter_phase[i][j] = ph;
        }

        let intra1 = self.intra_brain_matrix(participant1)?;
        let intra2 = self.intra_brain_matrix(participant2)?;

        let mean_inter = matrix_mean(&inter);
        let max_inter = inter
            .iter()
            .flatten()
            .fold(0.0f64, |m, &v| m.max(v));
        let mean_intra = (matrix_mean(&intra1) + matrix_mean(&intra2)) / 2.0;

        Ok(HyperscanningMetrics {
            inter_brain_coherence: inter,
            inter_brain_phase_coherence: inter_phase,
            intra_brain_coherence_p1: intra1,
            intra_brain_coherence_p2: intra2,
            mean_inter_brain_coherence: mean_inter,
            max_inter_brain_coherence: max_inter,
            mean_intra_brain_coherence: mean_intra,
            synchrony_index: synchrony_index(mean_inter, mean_intra),
            n_channels_p1: n1,
            n_channels_p2: n2,
        })
    }

    /// Symmetric intra-brain coherence matrix with unit diagonal.
    fn intra_brain_matrix(&self, channels: &[Vec<f64>]) -> AnalysisResult<Vec<Vec<f64>>> {
        let n = channels.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        let values: Vec<f64> = pairs
            .par_iter()
            .map(|&(i, j)| Ok(self.spectral(&channels[i], &channels[j])?.mean_coherence))
            .collect::<AnalysisResult<_>>()?;

        let mut matrix = vec![vec![0.0; n]; n];
        for (row, matrix_row) in matrix.iter_mut().enumerate() {
            matrix_row[row] = 1.0;
        }
        for (&(i, j), &value) in pairs.iter().zip(values.iter()) {
            matrix[i][j] = value;
            matrix[j][i] = value;
        }
        Ok(matrix)
    }

    /// Preprocess both signals and run the CWT over the configured scales.
    fn transform_pair(
        &self,
        signal1: &[f64],
        signal2: &[f64],
    ) -> (Vec<f64>, Array2<Complex<f64>>, Array2<Complex<f64>>) {
        let processed1 = self.preprocess_signal(signal1);
        let processed2 = self.preprocess_signal(signal2);
        let frequencies = wavelet::log_spaced_frequencies(
            self.config.wavelet_range_hz.0,
            self.config.wavelet_range_hz.1,
            self.config.wavelet_scales,
        );
        let cwt1 = wavelet::morlet_cwt(
            &processed1,
            self.config.sampling_rate,
            &frequencies,
            constants::WAVELET_BANDWIDTH,
            constants::WAVELET_CENTER_FREQUENCY,
        );
        let cwt2 = wavelet::morlet_cwt(
            &processed2,
            self.config.sampling_rate,
            &frequencies,
            constants::WAVELET_BANDWIDTH,
            constants::WAVELET_CENTER_FREQUENCY,
        );
        (frequencies, cwt1, cwt2)
    }

    /// Welch magnitude-squared coherence over Hann-windowed segments with
    /// 50% overlap.
    fn welch_coherence(&self, signal1: &[f64], signal2: &[f64]) -> AnalysisResult<CoherenceSpectrum> {
        let n = signal1.len();
        let fs = self.config.sampling_rate;
        let max_segment = ((fs * self.config.max_segment_seconds) as usize).max(1);
        let nperseg = (n / 4).min(max_segment);
        if nperseg < 2 {
            return Err(AnalysisError::InsufficientData { got: n, need: 8 });
        }
        let step = nperseg - nperseg / 2;
        let window = hann_window(nperseg);
        let n_freqs = nperseg / 2 + 1;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(nperseg);

        let mut pxx = vec![0.0f64; n_freqs];
        let mut pyy = vec![0.0f64; n_freqs];
        let mut pxy = vec![Complex::new(0.0f64, 0.0); n_freqs];

        for start in (0..=n - nperseg).step_by(step) {
            let mut seg1 = windowed_segment(&signal1[start..start + nperseg], &window);
            let mut seg2 = windowed_segment(&signal2[start..start + nperseg], &window);
            fft.process(&mut seg1);
            fft.process(&mut seg2);

            for k in 0..n_freqs {
                pxx[k] += seg1[k].norm_sqr();
                pyy[k] += seg2[k].norm_sqr();
                pxy[k] += seg1[k] * seg2[k].conj();
            }
        }

        let frequencies: Vec<f64> = (0..n_freqs)
            .map(|k| k as f64 * fs / nperseg as f64)
            .collect();
        let values: Vec<f64> = (0..n_freqs)
            .map(|k| coherence_ratio(pxy[k].norm_sqr(), pxx[k] * pyy[k]))
            .collect();

        Ok(CoherenceSpectrum {
            frequencies,
            values,
        })
    }

    fn band_range(&self) -> (f64, f64) {
        if self.config.bands.is_empty() {
            return (constants::FNIRS_BAND_LOW_HZ, constants::FNIRS_BAND_HIGH_HZ);
        }
        let low = self
            .config
            .bands
            .iter()
            .map(|band| band.low_hz)
            .fold(f64::INFINITY, f64::min);
        let high = self
            .config
            .bands
            .iter()
            .map(|band| band.high_hz)
            .fold(f64::NEG_INFINITY, f64::max);
        (low, high)
    }
}

/// `|cross|^2 / (auto1 * auto2)`, resolved to 0 when the denominator
/// vanishes and clamped into `[0, 1]` against rounding overshoot.
fn coherence_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        (numerator / denominator).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Inter-brain over intra-brain coherence ratio; 0 by convention when the
/// intra-brain mean is 0.
pub(crate) fn synchrony_index(mean_inter: f64, mean_intra: f64) -> f64 {
    if mean_intra > 0.0 {
        mean_inter / mean_intra
    } else {
        0.0
    }
}

/// Mean coherence per band over a frequency axis (0 for empty bands).
fn band_means(
    bands: &[FrequencyBand],
    frequencies: &[f64],
    values: &[f64],
) -> BTreeMap<String, f64> {
    bands
        .iter()
        .map(|band| {
            let selected: Vec<f64> = frequencies
                .iter()
                .zip(values.iter())
                .filter(|(&freq, _)| band.contains(freq))
                .map(|(_, &value)| value)
                .collect();
            (band.name.clone(), mean(&selected))
        })
        .collect()
}

/// Mean coherence per band over the full (scale, time) grid.
fn band_row_means(
    bands: &[FrequencyBand],
    frequencies: &[f64],
    coherence: &Array2<f64>,
) -> BTreeMap<String, f64> {
    bands
        .iter()
        .map(|band| {
            let mut sum = 0.0;
            let mut count = 0usize;
            for (row, &freq) in frequencies.iter().enumerate() {
                if band.contains(freq) {
                    sum += coherence.row(row).sum();
                    count += coherence.ncols();
                }
            }
            let value = if count > 0 { sum / count as f64 } else { 0.0 };
            (band.name.clone(), value)
        })
        .collect()
}

/// Centered moving average along each row.
fn smooth_rows(matrix: &Array2<f64>, window: usize) -> Array2<f64> {
    let (rows, cols) = matrix.dim();
    let half = window / 2;
    let mut out = Array2::zeros((rows, cols));

    for i in 0..rows {
        let mut prefix = vec![0.0; cols + 1];
        for j in 0..cols {
            prefix[j + 1] = prefix[j] + matrix[[i, j]];
        }
        for j in 0..cols {
            let lo = j.saturating_sub(half);
            let hi = (j + half + 1).min(cols);
            out[[i, j]] = (prefix[hi] - prefix[lo]) / (hi - lo) as f64;
        }
    }
    out
}

/// Centered moving average along each row of a complex grid.
fn smooth_rows_complex(matrix: &Array2<Complex<f64>>, window: usize) -> Array2<Complex<f64>> {
    let (rows, cols) = matrix.dim();
    let half = window / 2;
    let mut out = Array2::from_elem((rows, cols), Complex::new(0.0, 0.0));

    for i in 0..rows {
        let mut prefix = vec![Complex::new(0.0, 0.0); cols + 1];
        for j in 0..cols {
            prefix[j + 1] = prefix[j] + matrix[[i, j]];
        }
        for j in 0..cols {
            let lo = j.saturating_sub(half);
            let hi = (j + half + 1).min(cols);
            out[[i, j]] = (prefix[hi] - prefix[lo]) / (hi - lo) as f64;
        }
    }
    out
}

/// Hann window coefficients
fn hann_window(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
        })
        .collect()
}

/// Mean-remove a segment, apply the window, and lift to complex.
fn windowed_segment(segment: &[f64], window: &[f64]) -> Vec<Complex<f64>> {
    let mean = segment.iter().sum::<f64>() / segment.len() as f64;
    segment
        .iter()
        .zip(window.iter())
        .map(|(&x, &w)| Complex::new((x - mean) * w, 0.0))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn matrix_mean(matrix: &[Vec<f64>]) -> f64 {
    let count: usize = matrix.iter().map(Vec::len).sum();
    if count == 0 {
        return 0.0;
    }
    matrix.iter().flatten().sum::<f64>() / count as f64
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

fn validate_channels(channels: &[Vec<f64>], name: &'static str) -> AnalysisResult<()> {
    if channels.is_empty() {
        return Err(AnalysisError::EmptyInput { name });
    }
    if channels[0].is_empty() {
        return Err(AnalysisError::EmptyInput { name });
    }
    for channel in channels {
        if channel.len() != channels[0].len() {
            return Err(AnalysisError::LengthMismatch {
                left: channels[0].len(),
                right: channel.len(),
            });
        }
    }
    Ok(())
}
