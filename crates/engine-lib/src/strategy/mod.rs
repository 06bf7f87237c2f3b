//! Decision strategies
//!
//! Three interchangeable engines share one decision contract: the
//! online-trained resource optimizer, the statistical anomaly detector, and
//! the rule-based traffic steerer. The active strategy is chosen by explicit
//! configuration at construction.

mod allocator;
mod anomaly;
mod steering;

pub use allocator::{AllocatorConfig, ModelState, PredictiveAllocator};
pub use anomaly::{AnomalyConfig, AnomalyScorer, CooldownState};
pub use steering::{
    QosCheck, QosProfile, RuleBasedClassifier, SteeringConfig, ThroughputStats,
    TrafficClassifier, TrafficSteerer, ViolationDecay,
};

use std::str::FromStr;
use std::sync::Arc;

use crate::features::FeatureExtractor;
use crate::history::MetricsHistory;
use crate::models::{ControlAction, MeasurementEvent};
use crate::profile::ProfileTracker;

/// Shared read access handed to a strategy on every call
pub struct EngineContext<'a> {
    pub history: &'a MetricsHistory,
    pub profiles: &'a ProfileTracker,
    pub extractor: &'a FeatureExtractor,
}

/// Counters a strategy exposes for the observability gauges
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyStats {
    pub training_passes: u64,
    pub training_failures: u64,
    pub alerts_suppressed: u64,
}

/// One decision engine
///
/// `on_measurement` runs on the ingestion path for sample-driven engines
/// (anomaly scoring, cell-load tracking); `decide` runs on the periodic
/// decision cycle. Both return the control actions to route through the
/// gatekeeper.
pub trait DecisionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_measurement(
        &self,
        _event: &MeasurementEvent,
        _ctx: &EngineContext,
    ) -> Vec<ControlAction> {
        Vec::new()
    }

    fn decide(&self, entity_id: &str, ctx: &EngineContext) -> Vec<ControlAction>;

    fn stats(&self) -> StrategyStats {
        StrategyStats::default()
    }
}

/// Which decision engine this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    ResourceOptimizer,
    AnomalyDetector,
    TrafficSteerer,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resource_optimizer" => Ok(StrategyKind::ResourceOptimizer),
            "anomaly_detector" => Ok(StrategyKind::AnomalyDetector),
            "traffic_steerer" => Ok(StrategyKind::TrafficSteerer),
            other => Err(format!("unknown strategy kind: {other}")),
        }
    }
}

/// Per-strategy tunables, all static at process start
#[derive(Debug, Clone, Default)]
pub struct StrategyConfig {
    pub allocator: AllocatorConfig,
    pub anomaly: AnomalyConfig,
    pub steering: SteeringConfig,
}

/// Construct the configured strategy
pub fn build_strategy(kind: StrategyKind, config: &StrategyConfig) -> Arc<dyn DecisionStrategy> {
    match kind {
        StrategyKind::ResourceOptimizer => {
            Arc::new(PredictiveAllocator::new(config.allocator.clone()))
        }
        StrategyKind::AnomalyDetector => Arc::new(AnomalyScorer::new(config.anomaly.clone())),
        StrategyKind::TrafficSteerer => Arc::new(TrafficSteerer::new(config.steering.clone())),
    }
}
