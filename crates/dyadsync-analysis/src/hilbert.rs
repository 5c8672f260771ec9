//! Analytic signal computation
//!
//! FFT-based Hilbert transform for extracting instantaneous phase and
//! amplitude from narrowband signals. Band-pass filter first: instantaneous
//! parameters are only meaningful for nearly sinusoidal signals.

use rustfft::{num_complex::Complex, FftPlanner};

/// Compute the analytic signal `a(t) = x(t) + i*H[x(t)]`.
///
/// The one-sided spectrum is built by doubling positive frequencies and
/// zeroing negative ones, keeping the DC and Nyquist components. Works for
/// any signal length, not just powers of two.
#[must_use]
pub fn analytic_signal(signal: &[f64]) -> Vec<Complex<f64>> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft.process(&mut buffer);

    // One-sided spectrum: keep DC, double positive frequencies, keep the
    // Nyquist bin for even lengths, zero the negative half.
    if n % 2 == 0 {
        for value in &mut buffer[1..n / 2] {
            *value *= 2.0;
        }
        for value in &mut buffer[n / 2 + 1..] {
            *value = Complex::new(0.0, 0.0);
        }
    } else {
        for value in &mut buffer[1..=n / 2] {
            *value *= 2.0;
        }
        for value in &mut buffer[n / 2 + 1..] {
            *value = Complex::new(0.0, 0.0);
        }
    }

    ifft.process(&mut buffer);
    let scale = 1.0 / n as f64;
    for value in &mut buffer {
        *value *= scale;
    }

    buffer
}

/// Instantaneous phase in radians, `[-pi, pi]`.
#[must_use]
pub fn instantaneous_phase(signal: &[f64]) -> Vec<f64> {
    analytic_signal(signal)
        .iter()
        .map(|z| z.im.atan2(z.re))
        .collect()
}

/// Instantaneous amplitude envelope `|a(t)|`.
#[must_use]
pub fn amplitude_envelope(signal: &[f64]) -> Vec<f64> {
    analytic_signal(signal).iter().map(|z| z.norm()).collect()
}
