//! Isolation-forest scoring of an aggregated series.
//!
//! The detector is a pure function of `(series, params)`: the forest and its
//! random generator are built and dropped inside a single call.

pub mod isolation_forest;

pub use isolation_forest::IsolationForest;

use energy_domain::{AnomalyCategory, ScoredPoint, TimeSeriesPoint};
use serde::Deserialize;

pub const DEFAULT_CONTAMINATION: f64 = 0.02;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_N_ESTIMATORS: usize = 300;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("contamination must be in (0, 0.5], got {0}")]
    InvalidContamination(f64),
    #[error("isolation forest needs at least one tree, got {0}")]
    InvalidTreeCount(usize),
    #[error("kwh value at position {index} is not finite")]
    NonFiniteValue { index: usize },
}

pub fn is_valid_contamination(contamination: f64) -> bool {
    contamination > 0.0 && contamination <= 0.5
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Expected share of anomalous points, in (0, 0.5].
    pub contamination: f64,
    pub seed: u64,
    pub n_estimators: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            contamination: DEFAULT_CONTAMINATION,
            seed: DEFAULT_SEED,
            n_estimators: DEFAULT_N_ESTIMATORS,
        }
    }
}

impl DetectorParams {
    pub fn validate(&self) -> Result<(), DetectionError> {
        if !is_valid_contamination(self.contamination) {
            return Err(DetectionError::InvalidContamination(self.contamination));
        }
        if self.n_estimators == 0 {
            return Err(DetectionError::InvalidTreeCount(self.n_estimators));
        }
        Ok(())
    }
}

/// Score `series` with the default tree count.
pub fn detect(
    series: &[TimeSeriesPoint],
    contamination: f64,
    seed: u64,
) -> Result<Vec<ScoredPoint>, DetectionError> {
    detect_with(
        series,
        &DetectorParams {
            contamination,
            seed,
            ..DetectorParams::default()
        },
    )
}

/// Score and categorise every point of `series`.
///
/// Steps:
/// - standardise kWh (z-scores; all zero when the deviation is zero).
/// - fit the forest and take its raw scores.
/// - offset the scores by their `contamination` percentile so that the
///   most anomalous share lands below zero; negative means anomalous.
/// - flagged points at or above the median kWh are HIGH_USAGE, below it
///   LOW_USAGE; everything else is NORMAL.
pub fn detect_with(
    series: &[TimeSeriesPoint],
    params: &DetectorParams,
) -> Result<Vec<ScoredPoint>, DetectionError> {
    params.validate()?;

    if series.is_empty() {
        return Ok(Vec::new());
    }

    let kwh: Vec<f64> = series.iter().map(|p| p.kwh).collect();
    if let Some(index) = kwh.iter().position(|v| !v.is_finite()) {
        return Err(DetectionError::NonFiniteValue { index });
    }

    let features = standardize(&kwh);
    let forest = IsolationForest::fit(&features, params.n_estimators, params.seed);
    let raw_scores = forest.score_samples(&features);
    let offset = percentile(&raw_scores, params.contamination * 100.0);
    let median_kwh = median(&kwh);

    let scored: Vec<ScoredPoint> = series
        .iter()
        .zip(raw_scores)
        .map(|(p, raw)| {
            let score = raw - offset;
            let is_anomaly = score < 0.0;
            ScoredPoint {
                ts: p.ts,
                kwh: p.kwh,
                score,
                is_anomaly,
                category: categorize(is_anomaly, p.kwh, median_kwh),
            }
        })
        .collect();

    let flagged = scored.iter().filter(|p| p.is_anomaly).count();
    metrics::counter!("anomalies_flagged_total").increment(flagged as u64);
    tracing::debug!(
        points = scored.len(),
        flagged,
        contamination = params.contamination,
        seed = params.seed,
        trees = params.n_estimators,
        "scored series"
    );

    Ok(scored)
}

fn categorize(is_anomaly: bool, kwh: f64, median_kwh: f64) -> AnomalyCategory {
    match (is_anomaly, kwh >= median_kwh) {
        (false, _) => AnomalyCategory::Normal,
        (true, true) => AnomalyCategory::HighUsage,
        (true, false) => AnomalyCategory::LowUsage,
    }
}

/// Zero mean, unit (population) standard deviation.
fn standardize(values: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    if std == 0.0 || !std.is_finite() {
        return vec![0.0; values.len()];
    }

    values.iter().map(|v| (v - mean) / std).collect()
}

/// Linear-interpolated percentile, `q` in [0, 100].
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::datetime, Duration};

    fn hourly(values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &kwh)| TimeSeriesPoint {
                ts: datetime!(2024-01-01 00:00) + Duration::hours(i as i64),
                kwh,
            })
            .collect()
    }

    #[test]
    fn single_spike_is_flagged_high_usage() {
        let mut values = vec![100.0; 48];
        values[17] = 500.0;

        let scored = detect(&hourly(&values), 0.02, 42).unwrap();

        assert_eq!(scored.len(), 48);
        assert!(scored[17].is_anomaly);
        assert_eq!(scored[17].category, AnomalyCategory::HighUsage);
        assert!(scored[17].score < 0.0);
        assert_eq!(scored.iter().filter(|p| p.is_anomaly).count(), 1);
    }

    #[test]
    fn spike_detection_does_not_depend_on_the_seed() {
        let mut values = vec![100.0; 48];
        values[3] = 500.0;

        for seed in [0, 1, 42, 1234] {
            let scored = detect(&hourly(&values), 0.02, seed).unwrap();
            assert!(scored[3].is_anomaly, "seed {seed}");
        }
    }

    #[test]
    fn repeated_runs_are_bit_identical() {
        let values: Vec<f64> = (0..120)
            .map(|i| 50.0 + ((i * 37) % 97) as f64 + if i % 31 == 0 { 300.0 } else { 0.0 })
            .collect();
        let series = hourly(&values);
        let params = DetectorParams {
            contamination: 0.05,
            seed: 9,
            n_estimators: 100,
        };

        let a = detect_with(&series, &params).unwrap();
        let b = detect_with(&series, &params).unwrap();

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.score.to_bits(), y.score.to_bits());
            assert_eq!(x.is_anomaly, y.is_anomaly);
            assert_eq!(x.category, y.category);
        }
    }

    #[test]
    fn spikes_and_dips_are_split_by_median() {
        let mut values: Vec<f64> = (0..100).map(|i| 100.0 + (i % 5) as f64).collect();
        values[10] = 400.0;
        values[40] = 450.0;
        values[60] = 10.0;
        values[90] = 20.0;

        let scored = detect(&hourly(&values), 0.04, 42).unwrap();
        let flagged: Vec<usize> = scored
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_anomaly)
            .map(|(i, _)| i)
            .collect();

        assert_eq!(flagged, vec![10, 40, 60, 90]);
        assert_eq!(scored[10].category, AnomalyCategory::HighUsage);
        assert_eq!(scored[40].category, AnomalyCategory::HighUsage);
        assert_eq!(scored[60].category, AnomalyCategory::LowUsage);
        assert_eq!(scored[90].category, AnomalyCategory::LowUsage);
    }

    #[test]
    fn flagged_share_tracks_contamination_and_categories_respect_median() {
        let values: Vec<f64> = (0..200).map(|i| 100.0 + ((i * 37) % 200) as f64 * 0.5).collect();
        let scored = detect(&hourly(&values), 0.05, 42).unwrap();

        let flagged = scored.iter().filter(|p| p.is_anomaly).count();
        assert!((8..=10).contains(&flagged), "flagged {flagged}");

        let med = median(&values);
        for p in &scored {
            match p.category {
                AnomalyCategory::HighUsage => assert!(p.is_anomaly && p.kwh >= med),
                AnomalyCategory::LowUsage => assert!(p.is_anomaly && p.kwh < med),
                AnomalyCategory::Normal => assert!(!p.is_anomaly),
            }
        }
    }

    #[test]
    fn constant_series_has_no_anomalies_and_finite_scores() {
        let scored = detect(&hourly(&[7.0; 30]), 0.1, 42).unwrap();
        assert!(scored.iter().all(|p| !p.is_anomaly && p.score.is_finite()));
        assert!(scored.iter().all(|p| p.category == AnomalyCategory::Normal));
    }

    #[test]
    fn empty_series_yields_empty_result() {
        assert!(detect(&[], 0.02, 42).unwrap().is_empty());
    }

    #[test]
    fn rejects_out_of_range_contamination() {
        let series = hourly(&[1.0, 2.0]);
        assert_eq!(
            detect(&series, 0.0, 42),
            Err(DetectionError::InvalidContamination(0.0))
        );
        assert!(matches!(
            detect(&series, 0.51, 42),
            Err(DetectionError::InvalidContamination(_))
        ));
        assert!(matches!(
            detect(&series, f64::NAN, 42),
            Err(DetectionError::InvalidContamination(_))
        ));
        assert!(detect(&series, 0.5, 42).is_ok());
    }

    #[test]
    fn rejects_zero_trees_and_non_finite_input() {
        let params = DetectorParams {
            n_estimators: 0,
            ..DetectorParams::default()
        };
        assert_eq!(
            detect_with(&hourly(&[1.0]), &params),
            Err(DetectionError::InvalidTreeCount(0))
        );
        assert_eq!(
            detect(&hourly(&[1.0, f64::INFINITY]), 0.1, 1),
            Err(DetectionError::NonFiniteValue { index: 1 })
        );
    }

    #[test]
    fn percentile_and_median_interpolate() {
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 50.0), 2.5);
        assert_eq!(percentile(&[1.0, 2.0], 0.0), 1.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn standardize_guards_zero_deviation() {
        assert_eq!(standardize(&[5.0, 5.0, 5.0]), vec![0.0, 0.0, 0.0]);
        let z = standardize(&[1.0, 3.0]);
        assert_eq!(z, vec![-1.0, 1.0]);
    }
}
