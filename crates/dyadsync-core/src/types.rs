//! Boundary types for synchrony analysis
//!
//! All containers that cross the analysis boundary are plain numeric arrays,
//! scalars, and string-keyed mappings. Engines recompute them per call; none
//! of these types carries identity or shared mutable state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::math::constants;

// ============================================================================
// Frequency Bands
// ============================================================================

/// A named frequency band over a half-open interval `[low, high)` in Hz.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    /// Band name used as the key in band-aggregate mappings
    pub name: String,
    /// Inclusive low edge in Hz
    pub low_hz: f64,
    /// Exclusive high edge in Hz
    pub high_hz: f64,
}

impl FrequencyBand {
    /// Create a new band
    #[must_use]
    pub fn new(name: impl Into<String>, low_hz: f64, high_hz: f64) -> Self {
        Self {
            name: name.into(),
            low_hz,
            high_hz,
        }
    }

    /// Whether a frequency falls inside the band (`low <= f < high`)
    #[inline]
    #[must_use]
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.low_hz && freq_hz < self.high_hz
    }

    /// Default band set for slow hemodynamic oscillations, spanning
    /// 0.01-0.5 Hz in four bands.
    #[must_use]
    pub fn default_fnirs_bands() -> Vec<Self> {
        vec![
            Self::new("very_low", constants::FNIRS_BAND_LOW_HZ, 0.05),
            Self::new("low", 0.05, 0.1),
            Self::new("medium", 0.1, 0.2),
            Self::new("high", 0.2, constants::FNIRS_BAND_HIGH_HZ),
        ]
    }
}

// ============================================================================
// Recurrence Analysis
// ============================================================================

/// Distance metric for the cross-recurrence distance matrix.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// L2 distance
    #[default]
    Euclidean,
    /// L1 distance
    Manhattan,
    /// L-infinity distance
    Chebyshev,
}

/// Scalar measures derived from a cross-recurrence matrix.
///
/// Line-derived measures are 0 by convention when the census finds no
/// qualifying lines; determinism and laminarity are 0 when the matrix holds
/// no recurrent points at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CrqaMeasures {
    /// Fraction of matrix cells that are recurrent
    pub recurrence_rate: f64,
    /// Fraction of recurrent points lying on diagonal lines
    pub determinism: f64,
    /// Mean diagonal line length
    pub avg_diagonal_length: f64,
    /// Longest diagonal line length
    pub max_diagonal_length: f64,
    /// Fraction of recurrent points lying on vertical lines
    pub laminarity: f64,
    /// Mean vertical line length
    pub trapping_time: f64,
    /// Longest vertical line length
    pub max_vertical_length: f64,
    /// Base-2 Shannon entropy of the diagonal line length distribution
    pub entropy: f64,
    /// Recurrence radius actually applied (configured or auto-derived)
    pub radius: f64,
}

/// CRQA measures for one sliding window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrqaWindow {
    /// First sample index of the window
    pub start: usize,
    /// One past the last sample index of the window
    pub end: usize,
    /// Measures computed over this window
    pub measures: CrqaMeasures,
}

/// Result of a windowed CRQA run.
///
/// Windows that fail embedding are skipped rather than aborting the batch;
/// `skipped` reports how many were dropped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowedCrqa {
    /// Per-window measures in temporal order
    pub windows: Vec<CrqaWindow>,
    /// Number of windows skipped due to insufficient data
    pub skipped: usize,
}

// ============================================================================
// Phase Synchrony
// ============================================================================

/// Outcome of a surrogate significance test for an observed PLV.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlvSignificance {
    /// Observed phase-locking value
    pub plv: f64,
    /// Fraction of surrogate PLVs at or above the observed value
    pub p_value: f64,
    /// 95th percentile of the surrogate PLV distribution
    pub threshold_95: f64,
    /// Whether the observed PLV exceeds the 95% threshold
    pub is_significant: bool,
    /// Number of surrogates drawn
    pub n_surrogates: usize,
}

// ============================================================================
// Coherence Analysis
// ============================================================================

/// A frequency axis with one coherence value per frequency.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoherenceSpectrum {
    /// Frequencies in Hz
    pub frequencies: Vec<f64>,
    /// Coherence in [0, 1] at each frequency
    pub values: Vec<f64>,
}

/// Magnitude-squared spectral coherence with band aggregates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralCoherence {
    /// Per-frequency coherence
    pub spectrum: CoherenceSpectrum,
    /// Mean coherence per configured band (0 for bands with no bins)
    pub band_coherence: BTreeMap<String, f64>,
    /// Mean coherence across the whole frequency axis
    pub mean_coherence: f64,
}

/// Wavelet (time-frequency) coherence with band aggregates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveletCoherence {
    /// Center frequency of each scale in Hz, high to low
    pub frequencies: Vec<f64>,
    /// Coherence per (scale, time) cell, one row per scale
    pub coherence: Vec<Vec<f64>>,
    /// Mean coherence per configured band over all time cells
    pub band_coherence: BTreeMap<String, f64>,
    /// Mean coherence over every (scale, time) cell
    pub mean_coherence: f64,
}

/// Phase-extraction method for phase coherence.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseMethod {
    /// Phase difference of analytic signals
    #[default]
    Hilbert,
    /// Phase of the cross-wavelet spectrum over all scale/time cells
    Wavelet,
}

/// Phase coherence between two signals.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseCoherence {
    /// Phase coherence in [0, 1]
    pub coherence: f64,
    /// Method that produced it
    pub method: PhaseMethod,
}

/// Inter- and intra-brain coherence structure for a two-participant,
/// multi-channel recording.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperscanningMetrics {
    /// Spectral coherence for every (participant-1 channel, participant-2
    /// channel) pair
    pub inter_brain_coherence: Vec<Vec<f64>>,
    /// Phase coherence for every inter-brain channel pair
    pub inter_brain_phase_coherence: Vec<Vec<f64>>,
    /// Symmetric intra-brain coherence matrix for participant 1, unit diagonal
    pub intra_brain_coherence_p1: Vec<Vec<f64>>,
    /// Symmetric intra-brain coherence matrix for participant 2, unit diagonal
    pub intra_brain_coherence_p2: Vec<Vec<f64>>,
    /// Mean of the inter-brain coherence matrix
    pub mean_inter_brain_coherence: f64,
    /// Maximum of the inter-brain coherence matrix
    pub max_inter_brain_coherence: f64,
    /// Intra-brain coherence averaged across both participants
    pub mean_intra_brain_coherence: f64,
    /// Mean inter-brain over mean intra-brain coherence; 0 by convention when
    /// the denominator is 0
    pub synchrony_index: f64,
    /// Channel count for participant 1
    pub n_channels_p1: usize,
    /// Channel count for participant 2
    pub n_channels_p2: usize,
}

// ============================================================================
// Orchestration
// ============================================================================

/// The synchrony quantification methods the orchestrator can dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    /// Phase-locking value analysis
    Plv,
    /// Cross-recurrence quantification analysis
    Crqa,
    /// Inter-brain coherence analysis for slow optical signals
    Fnirs,
}

impl AnalysisMethod {
    /// Lowercase method name, as used in bundle keys
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plv => "plv",
            Self::Crqa => "crqa",
            Self::Fnirs => "fnirs",
        }
    }
}

/// PLV entry of an orchestrated batch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlvBatchSummary {
    /// Scalar PLV over the whole signal pair
    pub plv: f64,
    /// Filter band the phases were extracted in, Hz
    pub filter_band: (f64, f64),
}

/// Coherence entry of an orchestrated batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FnirsBatchSummary {
    /// Mean spectral coherence
    pub spectral_coherence: f64,
    /// Hilbert phase coherence
    pub phase_coherence: f64,
    /// Mean spectral coherence per band
    pub band_coherence: BTreeMap<String, f64>,
}

/// One method's entry in a [`SynchronyBundle`]: either its results or a
/// labeled error. A failure in one method never removes its entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodOutcome {
    /// PLV results
    Plv(PlvBatchSummary),
    /// CRQA results
    Crqa(CrqaMeasures),
    /// Coherence results
    Fnirs(FnirsBatchSummary),
    /// The method failed; siblings are unaffected
    Failed {
        /// Human-readable error description
        error: String,
    },
}

impl MethodOutcome {
    /// Whether this entry is an error descriptor
    #[inline]
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Labeled result bundle for one orchestrated signal pair.
///
/// Always complete across the requested methods: each entry is either a
/// results object or an error descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SynchronyBundle {
    /// Sampling rate the pair was analyzed at, Hz
    pub sampling_rate: f64,
    /// Number of samples per signal
    pub signal_length: usize,
    /// Methods that were requested, in request order
    pub methods: Vec<AnalysisMethod>,
    /// Per-method results or labeled errors
    pub outcomes: BTreeMap<AnalysisMethod, MethodOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_half_open() {
        let band = FrequencyBand::new("low", 0.05, 0.1);
        assert!(band.contains(0.05));
        assert!(band.contains(0.099));
        assert!(!band.contains(0.1));
        assert!(!band.contains(0.04));
    }

    #[test]
    fn test_default_bands_tile_fnirs_range() {
        let bands = FrequencyBand::default_fnirs_bands();
        assert_eq!(bands.len(), 4);
        assert!((bands[0].low_hz - 0.01).abs() < f64::EPSILON);
        assert!((bands[3].high_hz - 0.5).abs() < f64::EPSILON);
        // Adjacent bands share an edge exactly, so every frequency in range
        // belongs to exactly one band.
        for pair in bands.windows(2) {
            assert!((pair[0].high_hz - pair[1].low_hz).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_method_serde_names() {
        let json = serde_json::to_string(&AnalysisMethod::Fnirs).unwrap();
        assert_eq!(json, "\"fnirs\"");
        let back: AnalysisMethod = serde_json::from_str("\"crqa\"").unwrap();
        assert_eq!(back, AnalysisMethod::Crqa);
        assert_eq!(AnalysisMethod::Plv.name(), "plv");
    }

    #[test]
    fn test_bundle_serializes_with_method_keys() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            AnalysisMethod::Plv,
            MethodOutcome::Failed {
                error: "signal length mismatch: 3 vs 4 samples".to_string(),
            },
        );
        let bundle = SynchronyBundle {
            sampling_rate: 1000.0,
            signal_length: 3,
            methods: vec![AnalysisMethod::Plv],
            outcomes,
        };
        let json = serde_json::to_string(&bundle).unwrap();
        assert!(json.contains("\"plv\""));
        assert!(json.contains("length mismatch"));
    }
}
