//! Analysis orchestration
//!
//! Dispatches a signal pair to a requested subset of the synchrony engines
//! and collects one labeled result bundle. A failure inside one method is
//! captured as an error entry for that method only; sibling methods always
//! run to completion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use dyadsync_core::math::constants;
use dyadsync_core::{
    AnalysisError, AnalysisMethod, AnalysisResult, FnirsBatchSummary, FrequencyBand,
    MethodOutcome, PhaseMethod, PlvBatchSummary, SynchronyBundle,
};

use crate::coherence::{CoherenceAnalyzer, CoherenceConfig};
use crate::crqa::{CrqaAnalyzer, CrqaConfig};
use crate::plv::{PlvAnalyzer, PlvConfig};

/// Per-method parameter overrides for [`run_batch`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchParameters {
    /// Filter band for phase extraction, Hz
    pub plv_filter_band: (f64, f64),
    /// CRQA engine configuration
    pub crqa: CrqaConfig,
    /// Coherence sampling-rate override; defaults to the batch rate
    pub fnirs_sampling_rate: Option<f64>,
    /// Coherence band override; defaults to the standard fNIRS bands
    pub fnirs_bands: Option<Vec<FrequencyBand>>,
}

impl Default for BatchParameters {
    fn default() -> Self {
        Self {
            plv_filter_band: constants::DEFAULT_PLV_BAND,
            crqa: CrqaConfig::default(),
            fnirs_sampling_rate: None,
            fnirs_bands: None,
        }
    }
}

/// Run a requested subset of the synchrony engines over one signal pair.
///
/// The returned bundle is always complete across the requested methods: each
/// entry is either that method's results or a labeled error descriptor.
/// Method failures are isolated; only pair-level validation fails the call.
///
/// # Errors
///
/// [`AnalysisError::EmptyInput`] or [`AnalysisError::LengthMismatch`] when
/// the pair itself is invalid for every method.
pub fn run_batch(
    signal1: &[f64],
    signal2: &[f64],
    sampling_rate: f64,
    methods: &[AnalysisMethod],
    parameters: &BatchParameters,
) -> AnalysisResult<SynchronyBundle> {
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

    let mut outcomes = BTreeMap::new();
    for &method in methods {
        let outcome = match method {
            AnalysisMethod::Plv => run_plv(signal1, signal2, sampling_rate, parameters),
            AnalysisMethod::Crqa => run_crqa(signal1, signal2, parameters),
            AnalysisMethod::Fnirs => run_fnirs(signal1, signal2, sampling_rate, parameters),
        };
        outcomes.insert(method, outcome);
    }

    Ok(SynchronyBundle {
        sampling_rate,
        signal_length: signal1.len(),
        methods: methods.to_vec(),
        outcomes,
    })
}

fn run_plv(
    signal1: &[f64],
    signal2: &[f64],
    sampling_rate: f64,
    parameters: &BatchParameters,
) -> MethodOutcome {
    let analyzer = PlvAnalyzer::new(PlvConfig {
        sampling_rate,
        filter_band: parameters.plv_filter_band,
    });
    match analyzer.compute(signal1, signal2) {
        Ok(plv) => MethodOutcome::Plv(PlvBatchSummary {
            plv,
            filter_band: parameters.plv_filter_band,
        }),
        Err(err) => failed(err),
    }
}

fn run_crqa(signal1: &[f64], signal2: &[f64], parameters: &BatchParameters) -> MethodOutcome {
    match CrqaAnalyzer::new(parameters.crqa).compute(signal1, signal2) {
        Ok(measures) => MethodOutcome::Crqa(measures),
        Err(err) => failed(err),
    }
}

fn run_fnirs(
    signal1: &[f64],
    signal2: &[f64],
    sampling_rate: f64,
    parameters: &BatchParameters,
) -> MethodOutcome {
    let mut config =
        CoherenceConfig::with_rate(parameters.fnirs_sampling_rate.unwrap_or(sampling_rate));
    if let Some(bands) = &parameters.fnirs_bands {
        config.bands = bands.clone();
    }
    let analyzer = CoherenceAnalyzer::new(config);

    let spectral = match analyzer.spectral(signal1, signal2) {
        Ok(result) => result,
        Err(err) => return failed(err),
    };
    let phase = match analyzer.phase(signal1, signal2, PhaseMethod::Hilbert) {
        Ok(result) => result,
        Err(err) => return failed(err),
    };

    MethodOutcome::Fnirs(FnirsBatchSummary {
        spectral_coherence: spectral.mean_coherence,
        phase_coherence: phase.coherence,
        band_coherence: spectral.band_coherence,
    })
}

fn failed(err: AnalysisError) -> MethodOutcome {
    MethodOutcome::Failed {
        error: err.to_string(),
    }
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

    #[test]
    fn test_batch_runs_all_methods() {
        let a = sine(10.0, 250.0, 1000, 0.0);
        let b = sine(10.0, 250.0, 1000, 0.5);
        let methods = [
            AnalysisMethod::Plv,
            AnalysisMethod::Crqa,
            AnalysisMethod::Fnirs,
        ];
        let bundle = run_batch(&a, &b, 250.0, &methods, &BatchParameters::default()).unwrap();

        assert_eq!(bundle.signal_length, 1000);
        assert_eq!(bundle.methods, methods);
        assert_eq!(bundle.outcomes.len(), 3);
        for method in methods {
            assert!(
                !bundle.outcomes[&method].is_failed(),
                "{} failed: {:?}",
                method.name(),
                bundle.outcomes[&method]
            );
        }
    }

    #[test]
    fn test_batch_requested_subset_only() {
        let a = sine(10.0, 250.0, 500, 0.0);
        let b = sine(10.0, 250.0, 500, 0.2);
        let bundle = run_batch(
            &a,
            &b,
            250.0,
            &[AnalysisMethod::Plv],
            &BatchParameters::default(),
        )
        .unwrap();
        assert_eq!(bundle.outcomes.len(), 1);
        assert!(bundle.outcomes.contains_key(&AnalysisMethod::Plv));
        assert!(!bundle.outcomes.contains_key(&AnalysisMethod::Crqa));
    }

    #[test]
    fn test_method_failure_is_isolated() {
        let a = sine(10.0, 250.0, 64, 0.0);
        let b = sine(10.0, 250.0, 64, 0.3);
        // An embedding span of 9 * 20 samples cannot fit in 64 samples, so
        // CRQA fails while PLV succeeds.
        let parameters = BatchParameters {
            crqa: CrqaConfig {
                embedding_dimension: 10,
                time_delay: 20,
                ..CrqaConfig::default()
            },
            ..BatchParameters::default()
        };
        let methods = [AnalysisMethod::Plv, AnalysisMethod::Crqa];
        let bundle = run_batch(&a, &b, 250.0, &methods, &parameters).unwrap();

        assert_eq!(bundle.outcomes.len(), 2);
        assert!(!bundle.outcomes[&AnalysisMethod::Plv].is_failed());
        match &bundle.outcomes[&AnalysisMethod::Crqa] {
            MethodOutcome::Failed { error } => {
                assert!(error.contains("too short"), "unexpected label: {error}");
            }
            other => panic!("expected a failed CRQA entry, got {other:?}"),
        }
    }

    #[test]
    fn test_pair_validation_fails_whole_batch() {
        let a = vec![0.0; 100];
        let b = vec![0.0; 90];
        let err = run_batch(
            &a,
            &b,
            250.0,
            &[AnalysisMethod::Plv],
            &BatchParameters::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::LengthMismatch { left: 100, right: 90 }));

        let err = run_batch(
            &[],
            &[],
            250.0,
            &[AnalysisMethod::Plv],
            &BatchParameters::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyInput { .. }));
    }

    #[test]
    fn test_fnirs_rate_override() {
        let a = sine(0.1, 10.0, 600, 0.0);
        let b = sine(0.1, 10.0, 600, 0.4);
        let parameters = BatchParameters {
            fnirs_sampling_rate: Some(10.0),
            ..BatchParameters::default()
        };
        let bundle = run_batch(&a, &b, 250.0, &[AnalysisMethod::Fnirs], &parameters).unwrap();
        match &bundle.outcomes[&AnalysisMethod::Fnirs] {
            MethodOutcome::Fnirs(summary) => {
                assert!((0.0..=1.0).contains(&summary.spectral_coherence));
                assert!((0.0..=1.0).contains(&summary.phase_coherence));
                assert_eq!(summary.band_coherence.len(), 4);
            }
            other => panic!("expected fNIRS results, got {other:?}"),
        }
    }

    #[test]
    fn test_parameters_serde_defaults() {
        let parameters: BatchParameters = serde_json::from_str("{}").unwrap();
        assert_eq!(parameters, BatchParameters::default());

        let parameters: BatchParameters =
            serde_json::from_str(r#"{"plv_filter_band": [4.0, 8.0]}"#).unwrap();
        assert_eq!(parameters.plv_filter_band, (4.0, 8.0));
    }
}
