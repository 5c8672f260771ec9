//! Shared signal preprocessing
//!
//! Detrending, z-scoring, and zero-phase Butterworth band-limiting used by
//! the phase-synchrony and coherence engines. Filters operate on owned copies;
//! callers keep their input buffers untouched.

use dyadsync_core::math::constants;

/// Butterworth Q pairing for a 4th-order cascade of second-order sections
const BUTTERWORTH_Q4: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_377];

/// Edge padding for forward-backward filtering (3x the transfer-function
/// length of a 4th-order filter)
const FILTFILT_PAD: usize = 27;

/// Butterworth IIR filter coefficients (second-order section)
#[derive(Clone, Copy, Debug)]
pub struct BiquadCoeffs {
    /// Numerator coefficients [b0, b1, b2]
    pub b: [f64; 3],
    /// Denominator coefficients [a0=1, a1, a2]
    pub a: [f64; 3],
}

impl BiquadCoeffs {
    /// Second-order Butterworth lowpass section with quality factor `q`
    #[must_use]
    pub fn lowpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let k = (std::f64::consts::PI * cutoff / sample_rate).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);

        Self {
            b: [k2 * norm, 2.0 * k2 * norm, k2 * norm],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - k / q + k2) * norm],
        }
    }

    /// Second-order Butterworth highpass section with quality factor `q`
    #[must_use]
    pub fn highpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let k = (std::f64::consts::PI * cutoff / sample_rate).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);

        Self {
            b: [norm, -2.0 * norm, norm],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - k / q + k2) * norm],
        }
    }
}

/// Second-order filter section (direct form II transposed)
#[derive(Clone, Debug)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    /// State: [z1, z2]
    state: [f64; 2],
}

impl Biquad {
    /// Create a new section with given coefficients
    #[must_use]
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: [0.0, 0.0],
        }
    }

    /// Process a single sample
    #[inline]
    pub fn filter(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b[0] * input + self.state[0];
        self.state[0] = self.coeffs.b[1] * input - self.coeffs.a[1] * output + self.state[1];
        self.state[1] = self.coeffs.b[2] * input - self.coeffs.a[2] * output;
        output
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.state = [0.0, 0.0];
    }
}

/// 4th-order Butterworth band-pass: two highpass sections at the low cutoff
/// cascaded with two lowpass sections at the high cutoff.
#[derive(Clone, Debug)]
pub struct BandpassFilter {
    sections: [Biquad; 4],
}

impl BandpassFilter {
    /// Create a band-pass filter for a frequency range
    #[must_use]
    pub fn new(sample_rate: f64, low_cutoff: f64, high_cutoff: f64) -> Self {
        Self {
            sections: [
                Biquad::new(BiquadCoeffs::highpass(sample_rate, low_cutoff, BUTTERWORTH_Q4[0])),
                Biquad::new(BiquadCoeffs::highpass(sample_rate, low_cutoff, BUTTERWORTH_Q4[1])),
                Biquad::new(BiquadCoeffs::lowpass(sample_rate, high_cutoff, BUTTERWORTH_Q4[0])),
                Biquad::new(BiquadCoeffs::lowpass(sample_rate, high_cutoff, BUTTERWORTH_Q4[1])),
            ],
        }
    }

    /// Process a single sample through the cascade
    #[inline]
    pub fn filter(&mut self, input: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(input, |acc, section| section.filter(acc))
    }

    /// Reset all section states
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// Apply the filter zero-phase (forward-backward) over a whole signal.
    ///
    /// The signal is extended at both ends by odd reflection before the
    /// forward pass so the filter settles outside the region of interest.
    pub fn filtfilt(&mut self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n < 2 {
            return signal.to_vec();
        }
        let pad = FILTFILT_PAD.min(n - 1);

        let mut extended = Vec::with_capacity(n + 2 * pad);
        for i in (1..=pad).rev() {
            extended.push(2.0 * signal[0] - signal[i]);
        }
        extended.extend_from_slice(signal);
        for i in 1..=pad {
            extended.push(2.0 * signal[n - 1] - signal[n - 1 - i]);
        }

        // Forward pass
        self.reset();
        let mut forward: Vec<f64> = extended.iter().map(|&x| self.filter(x)).collect();

        // Backward pass
        forward.reverse();
        self.reset();
        let mut backward: Vec<f64> = forward.iter().map(|&x| self.filter(x)).collect();
        backward.reverse();

        backward[pad..pad + n].to_vec()
    }
}

/// Preprocessing flags for [`preprocess`]
#[derive(Clone, Copy, Debug)]
pub struct PreprocessOptions {
    /// Subtract the least-squares linear trend
    pub detrend: bool,
    /// Apply the zero-phase band-pass
    pub bandpass: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            detrend: true,
            bandpass: true,
        }
    }
}

/// Subtract the least-squares linear fit from a signal.
#[must_use]
pub fn detrend(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let nf = n as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, &y) in signal.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let slope = (nf * sum_xy - sum_x * sum_y) / (nf * sum_xx - sum_x * sum_x);
    let intercept = (sum_y - slope * sum_x) / nf;

    signal
        .iter()
        .enumerate()
        .map(|(i, &y)| y - (intercept + slope * i as f64))
        .collect()
}

/// Z-score a signal to zero mean and unit variance.
///
/// Zero-variance policy: when the variance vanishes the scaling step is
/// skipped and the signal is only mean-centered, with a warning. The output
/// is then all zeros rather than NaN.
#[must_use]
pub fn zscore(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }

    let n = signal.len() as f64;
    let mean = signal.iter().sum::<f64>() / n;
    let variance = signal.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n;

    if variance < constants::ZERO_VARIANCE_EPSILON {
        tracing::warn!("z-score on zero-variance signal: scaling skipped, mean-centered only");
        return signal.iter().map(|&x| x - mean).collect();
    }

    let std = variance.sqrt();
    signal.iter().map(|&x| (x - mean) / std).collect()
}

/// Band-limit a signal for phase extraction.
///
/// A high cutoff at or above Nyquist is clamped to `0.99 * Nyquist` with a
/// warning instead of failing.
#[must_use]
pub fn bandpass_for_phase(signal: &[f64], sample_rate: f64, low_hz: f64, high_hz: f64) -> Vec<f64> {
    let nyquist = sample_rate / 2.0;
    let high = if high_hz >= nyquist {
        let clamped = constants::NYQUIST_CLAMP_FRACTION * nyquist;
        tracing::warn!(
            requested_hz = high_hz,
            clamped_hz = clamped,
            "high cutoff at or above Nyquist, clamping"
        );
        clamped
    } else {
        high_hz
    };

    BandpassFilter::new(sample_rate, low_hz, high).filtfilt(signal)
}

/// Detrend and band-limit a signal for coherence analysis.
///
/// The band-pass runs over `[max(low, eps), min(high, 0.9 * Nyquist)]`. When
/// the computed high cutoff falls at or below the low cutoff the filter step
/// is skipped with a warning rather than failing.
#[must_use]
pub fn preprocess(
    signal: &[f64],
    sample_rate: f64,
    band: (f64, f64),
    options: PreprocessOptions,
) -> Vec<f64> {
    let mut processed = if options.detrend {
        detrend(signal)
    } else {
        signal.to_vec()
    };

    if options.bandpass {
        let nyquist = sample_rate / 2.0;
        let low = band.0.max(constants::MIN_BANDPASS_LOW_HZ);
        let high = band.1.min(constants::NYQUIST_GUARD_FRACTION * nyquist);

        if high <= low {
            tracing::warn!(
                sample_rate_hz = sample_rate,
                low_hz = low,
                high_hz = high,
                "sampling rate too low for the requested band, skipping band-pass"
            );
            return processed;
        }

        processed = BandpassFilter::new(sample_rate, low, high).filtfilt(&processed);
    }

    processed
}
