//! Default numeric policies for synchrony analysis
//!
//! Every value here is a heuristic tuned to slow biosignal recordings
//! (hemodynamic oscillations sampled at a few Hz, EEG-rate phase analysis).
//! Engines consume them only as configuration defaults; callers can override
//! each one per call.

/// Tuning constants for the analysis engines
pub mod constants {
    /// Fraction of the maximum observed cross-distance used as the recurrence
    /// radius when none is configured. Data-dependent: the resulting radius
    /// scales with the spread of the embedded trajectories.
    pub const AUTO_RADIUS_FRACTION: f64 = 0.1;

    /// Minimum run length that qualifies as a diagonal or vertical line in
    /// the recurrence census
    pub const MIN_LINE_LENGTH: usize = 2;

    /// Low edge of the default fNIRS analysis range in Hz
    pub const FNIRS_BAND_LOW_HZ: f64 = 0.01;

    /// High edge of the default fNIRS analysis range in Hz
    pub const FNIRS_BAND_HIGH_HZ: f64 = 0.5;

    /// Morlet wavelet bandwidth parameter (cmor B)
    pub const WAVELET_BANDWIDTH: f64 = 1.5;

    /// Morlet wavelet center frequency parameter (cmor C)
    pub const WAVELET_CENTER_FREQUENCY: f64 = 1.0;

    /// Number of log-spaced scales for the continuous wavelet transform
    pub const DEFAULT_WAVELET_SCALES: usize = 50;

    /// Centered moving-average window (samples) applied along time when
    /// smoothing wavelet spectra
    pub const SMOOTHING_WINDOW: usize = 5;

    /// Upper bound on the Welch segment length, in seconds of samples
    pub const MAX_SEGMENT_SECONDS: f64 = 60.0;

    /// High-cutoff guard for the preprocessing band-pass: cutoffs above this
    /// fraction of Nyquist trigger a skip-with-warning
    pub const NYQUIST_GUARD_FRACTION: f64 = 0.9;

    /// High-cutoff clamp for the phase-analysis band-pass: cutoffs at or
    /// above Nyquist are pulled down to this fraction with a warning
    pub const NYQUIST_CLAMP_FRACTION: f64 = 0.99;

    /// Smallest admissible low cutoff in Hz (a true 0 Hz edge would place a
    /// filter pole at DC)
    pub const MIN_BANDPASS_LOW_HZ: f64 = 1e-4;

    /// Default phase-analysis filter band in Hz (alpha-range)
    pub const DEFAULT_PLV_BAND: (f64, f64) = (8.0, 12.0);

    /// Default surrogate count for significance testing
    pub const DEFAULT_SURROGATE_COUNT: usize = 1000;

    /// Variances below this are treated as zero when z-scoring
    pub const ZERO_VARIANCE_EPSILON: f64 = 1e-12;
}
