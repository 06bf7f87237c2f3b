//! Incremental statistical profiles per (entity, metric)
//!
//! Maintains running mean and variance with Welford's online algorithm so
//! the cost per observation stays O(1) and the variance never suffers the
//! catastrophic cancellation of the naive sum-of-squares formula.

use dashmap::DashMap;

/// Minimum observations before a z-score is considered reliable
pub const DEFAULT_MIN_SAMPLES: u64 = 30;

/// Guard against division by near-zero variance
const STDDEV_EPSILON: f64 = 1e-9;

/// Welford accumulator for one (entity, metric) pair
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStats {
    pub count: u64,
    pub mean: f64,
    m2: f64,
}

impl RunningStats {
    /// Fold one observation into the accumulator
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Sample variance (Bessel's correction); zero below two observations
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        self.m2 / (self.count - 1) as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProfileKey {
    entity_id: String,
    metric_name: String,
}

impl ProfileKey {
    fn new(entity_id: &str, metric_name: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            metric_name: metric_name.to_string(),
        }
    }
}

/// Tracks statistical profiles for every observed (entity, metric) pair
pub struct ProfileTracker {
    profiles: DashMap<ProfileKey, RunningStats>,
    min_samples: u64,
}

impl ProfileTracker {
    pub fn new(min_samples: u64) -> Self {
        Self {
            profiles: DashMap::new(),
            min_samples,
        }
    }

    /// Fold a new observation into the profile, O(1)
    pub fn observe(&self, entity_id: &str, metric_name: &str, value: f64) {
        self.profiles
            .entry(ProfileKey::new(entity_id, metric_name))
            .or_default()
            .update(value);
    }

    /// Standardized deviation of `value` from the running profile
    ///
    /// `None` until the profile has accumulated the minimum sample count.
    pub fn z_score(&self, entity_id: &str, metric_name: &str, value: f64) -> Option<f64> {
        let stats = *self.profiles.get(&ProfileKey::new(entity_id, metric_name))?;
        Self::z_from(&stats, value, self.min_samples)
    }

    /// Score `value` against the profile as it stood before this sample,
    /// then fold the sample in
    ///
    /// The sample that brings the count up to the minimum still scores as
    /// undefined, and an outlier never dilutes its own score.
    pub fn score_then_observe(
        &self,
        entity_id: &str,
        metric_name: &str,
        value: f64,
    ) -> Option<f64> {
        let mut entry = self
            .profiles
            .entry(ProfileKey::new(entity_id, metric_name))
            .or_default();
        let z = Self::z_from(&entry, value, self.min_samples);
        entry.update(value);
        z
    }

    fn z_from(stats: &RunningStats, value: f64, min_samples: u64) -> Option<f64> {
        if stats.count < min_samples {
            return None;
        }
        Some((value - stats.mean) / stats.std_dev().max(STDDEV_EPSILON))
    }

    /// Observation count for a key; zero for unknown keys
    pub fn count(&self, entity_id: &str, metric_name: &str) -> u64 {
        self.profiles
            .get(&ProfileKey::new(entity_id, metric_name))
            .map(|s| s.count)
            .unwrap_or(0)
    }

    /// Snapshot of the accumulator for a key
    pub fn stats(&self, entity_id: &str, metric_name: &str) -> Option<RunningStats> {
        self.profiles
            .get(&ProfileKey::new(entity_id, metric_name))
            .map(|s| *s)
    }

    /// Discard the accumulated profile for one key
    pub fn reset(&self, entity_id: &str, metric_name: &str) {
        self.profiles.remove(&ProfileKey::new(entity_id, metric_name));
    }
}

impl Default for ProfileTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SAMPLES)
    }
}
