//! Feature extraction from entity history
//!
//! Converts the raw throughput windows for one entity into the fixed-shape
//! numeric vector consumed by the decision strategies. Deterministic: the
//! same buffer contents always yield the same vector.

use crate::history::MetricsHistory;
use crate::models::{FeatureVector, METRIC_THP_DL, METRIC_THP_UL};

/// Default feature window size
pub const DEFAULT_WINDOW: usize = 10;

/// Minimum downlink samples required to compute a trend
pub const MIN_SAMPLES: usize = 2;

/// Extracts feature vectors from throughput history
pub struct FeatureExtractor {
    window_size: usize,
}

impl FeatureExtractor {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(MIN_SAMPLES),
        }
    }

    /// Extract a feature vector for one entity
    ///
    /// Returns `None` while fewer than [`MIN_SAMPLES`] downlink samples are
    /// buffered; callers skip decisioning for that cycle.
    pub fn extract(&self, history: &MetricsHistory, entity_id: &str) -> Option<FeatureVector> {
        let dl = history.window(entity_id, METRIC_THP_DL, self.window_size);
        if dl.len() < MIN_SAMPLES {
            return None;
        }
        let ul = history.window(entity_id, METRIC_THP_UL, self.window_size);

        Some(FeatureVector {
            current_dl: *dl.last().unwrap_or(&0.0),
            current_ul: *ul.last().unwrap_or(&0.0),
            mean_dl: mean(&dl),
            mean_ul: mean(&ul),
            trend_dl: trend(&dl),
            window_len: dl.len() as f64,
        })
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// mean(most recent half) - mean(older half), in chronological order
fn trend(values: &[f64]) -> f64 {
    if values.len() < MIN_SAMPLES {
        return 0.0;
    }
    let mid = values.len() / 2;
    mean(&values[mid..]) - mean(&values[..mid])
}

/// Sample variance with Bessel's correction
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(history: &MetricsHistory, entity: &str, values: &[f64]) {
        for (i, v) in values.iter().enumerate() {
            history.append(entity, METRIC_THP_DL, *v, i as i64);
            history.append(entity, METRIC_THP_UL, *v / 2.0, i as i64);
        }
    }

    #[test]
    fn test_insufficient_history_is_none() {
        let history = MetricsHistory::default();
        let extractor = FeatureExtractor::default();

        assert!(extractor.extract(&history, "ue1").is_none());
        history.append("ue1", METRIC_THP_DL, 2.0, 0);
        assert!(extractor.extract(&history, "ue1").is_none());
    }

    #[test]
    fn test_steady_traffic_has_zero_trend() {
        let history = MetricsHistory::default();
        let extractor = FeatureExtractor::default();
        feed(&history, "ue1", &[2.0, 2.0, 2.0, 2.0, 2.0]);

        let f = extractor.extract(&history, "ue1").unwrap();
        assert_eq!(f.current_dl, 2.0);
        assert_eq!(f.mean_dl, 2.0);
        assert!(f.trend_dl.abs() < 1e-9);
        assert_eq!(f.window_len, 5.0);
    }

    #[test]
    fn test_defined_from_second_sample_onward() {
        let history = MetricsHistory::default();
        let extractor = FeatureExtractor::default();

        history.append("ue1", METRIC_THP_DL, 2.0, 0);
        assert!(extractor.extract(&history, "ue1").is_none());
        history.append("ue1", METRIC_THP_DL, 2.0, 1);
        let f = extractor.extract(&history, "ue1").unwrap();
        assert!(f.trend_dl.abs() < 1e-9);
    }

    #[test]
    fn test_rising_traffic_has_positive_trend() {
        let history = MetricsHistory::default();
        let extractor = FeatureExtractor::default();
        feed(&history, "ue1", &[1.0, 1.0, 1.0, 10.0, 10.0, 10.0]);

        let f = extractor.extract(&history, "ue1").unwrap();
        assert!(f.trend_dl > 0.0);
    }

    #[test]
    fn test_window_limits_lookback() {
        let history = MetricsHistory::default();
        let extractor = FeatureExtractor::new(4);
        feed(&history, "ue1", &[100.0, 100.0, 1.0, 1.0, 1.0, 1.0]);

        // The two 100.0 samples fall outside the 4-sample window
        let f = extractor.extract(&history, "ue1").unwrap();
        assert_eq!(f.mean_dl, 1.0);
        assert_eq!(f.window_len, 4.0);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let history = MetricsHistory::default();
        let extractor = FeatureExtractor::default();
        feed(&history, "ue1", &[1.0, 2.0, 3.0, 4.0]);

        let a = extractor.extract(&history, "ue1").unwrap();
        let b = extractor.extract(&history, "ue1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_variance_helper() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[5.0]), 0.0);
        let v = variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((v - 4.571).abs() < 0.01);
    }
}
