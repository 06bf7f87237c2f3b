//! Rule-based traffic classification and QoS steering
//!
//! Classifies each entity's traffic from windowed throughput patterns,
//! checks the class against its static QoS profile, and recommends steering
//! once the violation counter crosses its threshold. Cell-level entities
//! feed a load tracker that supplies the steering target hint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::features::variance;
use crate::models::{
    ControlAction, MeasurementEvent, SteeringRecommendation, TrafficType, METRIC_RRC_CONN_SUCC,
    METRIC_THP_DL, METRIC_THP_UL,
};
use crate::strategy::{DecisionStrategy, EngineContext, StrategyStats};

/// Smoothing factor for the cell load estimate
const LOAD_EWMA_ALPHA: f64 = 0.2;

/// Throughput normalization divisor for load estimation (Mbps)
const LOAD_FULL_SCALE_MBPS: f64 = 1000.0;

/// How a non-violating cycle treats the violation counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationDecay {
    /// Clear the counter entirely
    Reset,
    /// Drain the counter by one
    Decrement,
}

/// Static QoS expectations for one traffic class
#[derive(Debug, Clone, Copy)]
pub struct QosProfile {
    pub max_latency_ms: f64,
    pub min_throughput_mbps: f64,
    pub priority: u8,
}

/// Windowed throughput statistics the classifier rules operate on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputStats {
    pub mean_dl: f64,
    pub mean_ul: f64,
    pub var_dl: f64,
    pub var_ul: f64,
}

impl ThroughputStats {
    pub fn from_windows(dl: &[f64], ul: &[f64]) -> Self {
        let mean = |v: &[f64]| {
            if v.is_empty() {
                0.0
            } else {
                v.iter().sum::<f64>() / v.len() as f64
            }
        };
        Self {
            mean_dl: mean(dl),
            mean_ul: mean(ul),
            var_dl: variance(dl),
            var_ul: variance(ul),
        }
    }
}

/// Classification seam: the rule table is the default implementation, but a
/// trained model can be plugged in without changing the calling contract.
pub trait TrafficClassifier: Send + Sync {
    fn classify(&self, stats: &ThroughputStats) -> Option<TrafficType>;
}

/// Threshold rules over throughput level and variability
pub struct RuleBasedClassifier;

impl TrafficClassifier for RuleBasedClassifier {
    fn classify(&self, stats: &ThroughputStats) -> Option<TrafficType> {
        if stats.mean_dl < 0.5 && stats.mean_ul < 0.5 && stats.var_dl < 1.0 && stats.var_ul < 1.0
        {
            // Low, steady in both directions
            Some(TrafficType::Voice)
        } else if stats.mean_dl > 20.0 && stats.var_dl > 100.0 {
            // High, bursty downlink
            Some(TrafficType::Video)
        } else if stats.mean_ul > 2.0 && stats.var_ul > 10.0 {
            // Interactive, variable uplink
            Some(TrafficType::Gaming)
        } else if stats.mean_dl > 1.0 && stats.mean_dl < 20.0 {
            Some(TrafficType::Web)
        } else if stats.mean_dl > 50.0 {
            Some(TrafficType::FileTransfer)
        } else {
            None
        }
    }
}

/// Result of comparing current metrics to a QoS profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QosCheck {
    Compliant,
    Violation { reason: String },
}

/// Steerer tunables
#[derive(Debug, Clone)]
pub struct SteeringConfig {
    /// Feature window consulted for classification
    pub window_size: usize,
    /// Samples required before a classification is attempted
    pub min_classify_samples: usize,
    /// Violations required to recommend steering
    pub violation_threshold: u32,
    /// Counter behavior on compliant cycles
    pub decay: ViolationDecay,
    /// Downlink below this fraction of the profile throughput violates
    pub dl_violation_fraction: f64,
    /// Uplink below this fraction of the profile throughput violates
    pub ul_violation_fraction: f64,
    /// Entity ids starting with this prefix are cells, not steering subjects
    pub cell_prefix: String,
    /// Service expectations per traffic class, read-only at runtime
    pub qos_profiles: HashMap<TrafficType, QosProfile>,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            min_classify_samples: 10,
            violation_threshold: 3,
            decay: ViolationDecay::Decrement,
            dl_violation_fraction: 0.5,
            ul_violation_fraction: 0.3,
            cell_prefix: "cell".to_string(),
            qos_profiles: default_qos_profiles(),
        }
    }
}

/// Traffic classification + QoS monitoring strategy
pub struct TrafficSteerer {
    config: SteeringConfig,
    classifier: Box<dyn TrafficClassifier>,
    violations: DashMap<String, u32>,
    cell_load: DashMap<String, f64>,
    recommendations: AtomicU64,
}

impl TrafficSteerer {
    pub fn new(config: SteeringConfig) -> Self {
        Self {
            config,
            classifier: Box::new(RuleBasedClassifier),
            violations: DashMap::new(),
            cell_load: DashMap::new(),
            recommendations: AtomicU64::new(0),
        }
    }

    /// Swap in a different classifier implementation
    pub fn with_classifier(mut self, classifier: Box<dyn TrafficClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Compare current throughput to the profile for a traffic class
    pub fn check_qos(
        &self,
        traffic_type: TrafficType,
        current_dl: f64,
        current_ul: f64,
    ) -> QosCheck {
        let profile = match self.config.qos_profiles.get(&traffic_type) {
            Some(p) => p,
            None => return QosCheck::Compliant,
        };

        if current_dl < profile.min_throughput_mbps * self.config.dl_violation_fraction {
            return QosCheck::Violation {
                reason: format!(
                    "downlink {current_dl:.2} Mbps below {}% of {traffic_type} profile",
                    (self.config.dl_violation_fraction * 100.0) as u32
                ),
            };
        }
        if current_ul < profile.min_throughput_mbps * self.config.ul_violation_fraction {
            return QosCheck::Violation {
                reason: format!(
                    "uplink {current_ul:.2} Mbps below {}% of {traffic_type} profile",
                    (self.config.ul_violation_fraction * 100.0) as u32
                ),
            };
        }
        QosCheck::Compliant
    }

    /// Count a violation; at the threshold, emit a recommendation and reset
    pub fn on_violation(
        &self,
        entity_id: &str,
        traffic_type: TrafficType,
        reason: String,
    ) -> Option<SteeringRecommendation> {
        let mut count = self.violations.entry(entity_id.to_string()).or_insert(0);
        *count += 1;
        if *count < self.config.violation_threshold {
            return None;
        }
        let violations = *count;
        *count = 0;
        drop(count);

        self.recommendations.fetch_add(1, Ordering::SeqCst);
        Some(SteeringRecommendation {
            entity_id: entity_id.to_string(),
            traffic_type,
            reason: format!("{violations} QoS violations: {reason}"),
            target_cell_hint: self.least_loaded_cell(),
        })
    }

    /// Apply the configured decay on a compliant cycle
    fn on_compliant(&self, entity_id: &str) {
        if let Some(mut count) = self.violations.get_mut(entity_id) {
            match self.config.decay {
                ViolationDecay::Reset => *count = 0,
                ViolationDecay::Decrement => *count = count.saturating_sub(1),
            }
        }
    }

    /// Current violation count for an entity
    pub fn violation_count(&self, entity_id: &str) -> u32 {
        self.violations.get(entity_id).map(|c| *c).unwrap_or(0)
    }

    /// Steering recommendations emitted since startup
    pub fn recommendation_count(&self) -> u64 {
        self.recommendations.load(Ordering::SeqCst)
    }

    /// Least-loaded known cell, if any load has been observed
    pub fn least_loaded_cell(&self) -> Option<String> {
        self.cell_load
            .iter()
            .min_by(|a, b| {
                a.value()
                    .partial_cmp(b.value())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|e| e.key().clone())
    }

    /// Smoothed load estimate for one cell
    pub fn cell_load(&self, cell_id: &str) -> Option<f64> {
        self.cell_load.get(cell_id).map(|l| *l)
    }

    fn update_cell_load(&self, event: &MeasurementEvent) {
        let sample = match event.metric_name.as_str() {
            METRIC_THP_DL | METRIC_THP_UL => (event.value / LOAD_FULL_SCALE_MBPS).min(1.0),
            METRIC_RRC_CONN_SUCC => {
                // Lower establishment success reads as congestion
                (1.0 - event.value / 100.0).clamp(0.0, 1.0)
            }
            _ => return,
        };

        let mut load = self.cell_load.entry(event.entity_id.clone()).or_insert(sample);
        *load = *load * (1.0 - LOAD_EWMA_ALPHA) + sample * LOAD_EWMA_ALPHA;
    }

    fn is_cell(&self, entity_id: &str) -> bool {
        entity_id.starts_with(&self.config.cell_prefix)
    }
}

impl DecisionStrategy for TrafficSteerer {
    fn name(&self) -> &'static str {
        "traffic_steerer"
    }

    fn on_measurement(
        &self,
        event: &MeasurementEvent,
        _ctx: &EngineContext,
    ) -> Vec<ControlAction> {
        if self.is_cell(&event.entity_id) {
            self.update_cell_load(event);
        }
        Vec::new()
    }

    fn decide(&self, entity_id: &str, ctx: &EngineContext) -> Vec<ControlAction> {
        if self.is_cell(entity_id) {
            return Vec::new();
        }

        let dl = ctx
            .history
            .window(entity_id, METRIC_THP_DL, self.config.window_size);
        if dl.len() < self.config.min_classify_samples {
            return Vec::new();
        }
        let ul = ctx
            .history
            .window(entity_id, METRIC_THP_UL, self.config.window_size);

        let stats = ThroughputStats::from_windows(&dl, &ul);
        let traffic_type = match self.classifier.classify(&stats) {
            Some(t) => t,
            None => {
                // Indeterminate traffic cannot assert a violation
                self.on_compliant(entity_id);
                return Vec::new();
            }
        };

        let current_dl = dl.last().copied().unwrap_or(0.0);
        let current_ul = ul.last().copied().unwrap_or(0.0);
        match self.check_qos(traffic_type, current_dl, current_ul) {
            QosCheck::Violation { reason } => self
                .on_violation(entity_id, traffic_type, reason)
                .map(ControlAction::Steering)
                .into_iter()
                .collect(),
            QosCheck::Compliant => {
                self.on_compliant(entity_id);
                Vec::new()
            }
        }
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats::default()
    }
}

/// The five traffic classes and their service expectations
fn default_qos_profiles() -> HashMap<TrafficType, QosProfile> {
    HashMap::from([
        (
            TrafficType::Voice,
            QosProfile {
                max_latency_ms: 10.0,
                min_throughput_mbps: 0.1,
                priority: 1,
            },
        ),
        (
            TrafficType::Video,
            QosProfile {
                max_latency_ms: 30.0,
                min_throughput_mbps: 5.0,
                priority: 2,
            },
        ),
        (
            TrafficType::Gaming,
            QosProfile {
                max_latency_ms: 20.0,
                min_throughput_mbps: 1.0,
                priority: 1,
            },
        ),
        (
            TrafficType::Web,
            QosProfile {
                max_latency_ms: 100.0,
                min_throughput_mbps: 10.0,
                priority: 3,
            },
        ),
        (
            TrafficType::FileTransfer,
            QosProfile {
                max_latency_ms: 500.0,
                min_throughput_mbps: 50.0,
                priority: 4,
            },
        ),
    ])
}
