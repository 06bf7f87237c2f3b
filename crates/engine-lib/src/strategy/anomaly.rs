//! Statistical anomaly detection with alert cooldown
//!
//! Scores every recognized measurement against its running (entity, metric)
//! profile and raises an alert when the z-score clears the configured
//! threshold. A per-key cooldown state machine suppresses alert storms:
//! Quiet -> InCooldown on emission, back to Quiet once the cooldown elapses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::models::{AlertSeverity, AnomalyAlert, ControlAction, MeasurementEvent};
use crate::strategy::{DecisionStrategy, EngineContext, StrategyStats};

/// Scorer tunables
#[derive(Debug, Clone)]
pub struct AnomalyConfig {
    /// Absolute z-score at or above which a value is anomalous
    pub z_threshold: f64,
    /// Minimum time between alerts for the same (entity, metric)
    pub cooldown: Duration,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: 3.0,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Cooldown machine state for one (entity, metric) key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Quiet,
    InCooldown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AlertKey {
    entity_id: String,
    metric_name: String,
}

/// Z-score anomaly detection strategy
pub struct AnomalyScorer {
    config: AnomalyConfig,
    /// Last alert time per key; absence means Quiet
    last_alert: DashMap<AlertKey, Instant>,
    detected: AtomicU64,
    suppressed: AtomicU64,
}

impl AnomalyScorer {
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            config,
            last_alert: DashMap::new(),
            detected: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Current cooldown state for a key
    pub fn cooldown_state(&self, entity_id: &str, metric_name: &str) -> CooldownState {
        let key = AlertKey {
            entity_id: entity_id.to_string(),
            metric_name: metric_name.to_string(),
        };
        match self.last_alert.get(&key) {
            Some(at) if at.elapsed() < self.config.cooldown => CooldownState::InCooldown,
            _ => CooldownState::Quiet,
        }
    }

    /// Alerts emitted since startup
    pub fn detected_count(&self) -> u64 {
        self.detected.load(Ordering::SeqCst)
    }

    /// Alerts withheld by an active cooldown since startup
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.load(Ordering::SeqCst)
    }

    fn try_alert(&self, event: &MeasurementEvent, z: f64) -> Option<ControlAction> {
        let key = AlertKey {
            entity_id: event.entity_id.clone(),
            metric_name: event.metric_name.clone(),
        };

        let now = Instant::now();
        let in_cooldown = self
            .last_alert
            .get(&key)
            .map(|at| now.duration_since(*at) < self.config.cooldown)
            .unwrap_or(false);
        if in_cooldown {
            self.suppressed.fetch_add(1, Ordering::SeqCst);
            return None;
        }
        self.last_alert.insert(key, now);

        // Expired entries accumulate one per key; prune on emission
        self.last_alert
            .retain(|_, at| at.elapsed() < self.config.cooldown);

        self.detected.fetch_add(1, Ordering::SeqCst);
        Some(ControlAction::Anomaly(AnomalyAlert {
            entity_id: event.entity_id.clone(),
            metric_name: event.metric_name.clone(),
            z_score: z,
            value: event.value,
            severity: AlertSeverity::from_z_score(z),
            timestamp: event.timestamp,
        }))
    }
}

impl DecisionStrategy for AnomalyScorer {
    fn name(&self) -> &'static str {
        "anomaly_detector"
    }

    fn on_measurement(
        &self,
        event: &MeasurementEvent,
        ctx: &EngineContext,
    ) -> Vec<ControlAction> {
        // Score against the profile as it stood before this sample; an
        // undefined score (insufficient samples) never alerts.
        let z = match ctx.profiles.score_then_observe(
            &event.entity_id,
            &event.metric_name,
            event.value,
        ) {
            Some(z) => z,
            None => return Vec::new(),
        };

        if z.abs() < self.config.z_threshold {
            return Vec::new();
        }

        self.try_alert(event, z).into_iter().collect()
    }

    fn decide(&self, _entity_id: &str, _ctx: &EngineContext) -> Vec<ControlAction> {
        // Alerting is sample-driven; the periodic cycle has nothing to add
        Vec::new()
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats {
            training_passes: 0,
            training_failures: 0,
            alerts_suppressed: self.suppressed_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;
    use crate::history::MetricsHistory;
    use crate::models::METRIC_THP_DL;
    use crate::profile::ProfileTracker;
    use std::thread::sleep;

    struct Fixture {
        history: MetricsHistory,
        profiles: ProfileTracker,
        extractor: FeatureExtractor,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                history: MetricsHistory::default(),
                profiles: ProfileTracker::default(),
                extractor: FeatureExtractor::default(),
            }
        }

        fn ctx(&self) -> EngineContext<'_> {
            EngineContext {
                history: &self.history,
                profiles: &self.profiles,
                extractor: &self.extractor,
            }
        }

        fn event(&self, entity: &str, value: f64, ts: i64) -> MeasurementEvent {
            MeasurementEvent {
                entity_id: entity.to_string(),
                metric_name: METRIC_THP_DL.to_string(),
                value,
                timestamp: ts,
            }
        }
    }

    #[test]
    fn test_no_alert_below_min_samples() {
        let fx = Fixture::new();
        let scorer = AnomalyScorer::new(AnomalyConfig::default());

        // Even wild values cannot alert while the statistic is undefined
        for i in 0..29 {
            let value = if i % 2 == 0 { 10.0 } else { 10_000.0 };
            assert!(scorer.on_measurement(&fx.event("ue1", value, i), &fx.ctx()).is_empty());
        }
        assert_eq!(scorer.detected_count(), 0);
    }

    #[test]
    fn test_outlier_after_stable_history_alerts_once() {
        let fx = Fixture::new();
        let scorer = AnomalyScorer::new(AnomalyConfig::default());

        // 29 stable samples, then the sample that completes the minimum
        for i in 0..29 {
            // Small wobble keeps the variance positive
            let value = 10.0 + (i % 3) as f64 * 0.1;
            assert!(scorer.on_measurement(&fx.event("ue2", value, i), &fx.ctx()).is_empty());
        }
        // Sample 30: the statistic becomes defined only after this update
        assert!(scorer
            .on_measurement(&fx.event("ue2", 10.0, 29), &fx.ctx())
            .is_empty());

        // Sample 31: the outlier scores against the stable profile
        let actions = scorer.on_measurement(&fx.event("ue2", 1000.0, 30), &fx.ctx());
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            ControlAction::Anomaly(alert) => {
                assert_eq!(alert.entity_id, "ue2");
                assert_eq!(alert.metric_name, METRIC_THP_DL);
                assert!(alert.z_score > 3.0);
                assert_eq!(alert.value, 1000.0);
                assert_eq!(alert.severity, AlertSeverity::Critical);
            }
            other => panic!("unexpected action: {other:?}"),
        }
        assert_eq!(scorer.detected_count(), 1);
    }

    #[test]
    fn test_cooldown_suppresses_second_alert() {
        let fx = Fixture::new();
        let scorer = AnomalyScorer::new(AnomalyConfig {
            z_threshold: 3.0,
            cooldown: Duration::from_millis(100),
        });

        for i in 0..30 {
            scorer.on_measurement(&fx.event("ue1", 10.0 + (i % 3) as f64 * 0.1, i), &fx.ctx());
        }

        // Two outliers inside the cooldown window: exactly one alert
        assert_eq!(
            scorer.on_measurement(&fx.event("ue1", 1000.0, 30), &fx.ctx()).len(),
            1
        );
        assert_eq!(scorer.cooldown_state("ue1", METRIC_THP_DL), CooldownState::InCooldown);
        assert_eq!(
            scorer.on_measurement(&fx.event("ue1", 1000.0, 31), &fx.ctx()).len(),
            0
        );
        assert_eq!(scorer.suppressed_count(), 1);

        // Past the cooldown, the same key may alert again
        sleep(Duration::from_millis(150));
        assert_eq!(scorer.cooldown_state("ue1", METRIC_THP_DL), CooldownState::Quiet);
        assert_eq!(
            scorer.on_measurement(&fx.event("ue1", 1000.0, 32), &fx.ctx()).len(),
            1
        );
        assert_eq!(scorer.detected_count(), 2);
    }

    #[test]
    fn test_cooldowns_are_per_key() {
        let fx = Fixture::new();
        let scorer = AnomalyScorer::new(AnomalyConfig::default());

        for entity in ["ue1", "ue2"] {
            for i in 0..30 {
                scorer.on_measurement(
                    &fx.event(entity, 10.0 + (i % 3) as f64 * 0.1, i),
                    &fx.ctx(),
                );
            }
        }

        // An alert on ue1 does not put ue2 in cooldown
        assert_eq!(scorer.on_measurement(&fx.event("ue1", 500.0, 30), &fx.ctx()).len(), 1);
        assert_eq!(scorer.on_measurement(&fx.event("ue2", 500.0, 30), &fx.ctx()).len(), 1);
    }

    #[test]
    fn test_negative_deviation_also_alerts() {
        let fx = Fixture::new();
        let scorer = AnomalyScorer::new(AnomalyConfig::default());

        for i in 0..31 {
            scorer.on_measurement(&fx.event("ue1", 100.0 + (i % 3) as f64, i), &fx.ctx());
        }
        let actions = scorer.on_measurement(&fx.event("ue1", 0.5, 31), &fx.ctx());
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            ControlAction::Anomaly(alert) => assert!(alert.z_score < -3.0),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_decide_is_quiet() {
        let fx = Fixture::new();
        let scorer = AnomalyScorer::new(AnomalyConfig::default());
        assert!(scorer.decide("ue1", &fx.ctx()).is_empty());
    }
}
