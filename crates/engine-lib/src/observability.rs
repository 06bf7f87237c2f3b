//! Observability infrastructure for the decision engine
//!
//! Provides:
//! - Prometheus metrics (ingest throughput, decision latency, action and
//!   suppression counters, model training state)
//! - Structured JSON logging of significant engine events via tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::ControlAction;

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    events_ingested: IntCounter,
    events_dropped: IntCounter,
    decision_latency_seconds: Histogram,
    actions_emitted: IntCounterVec,
    actions_suppressed: IntCounter,
    entities_tracked: IntGauge,
    training_passes: IntGauge,
    training_failures: IntGauge,
    alerts_suppressed: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            events_ingested: register_int_counter!(
                "decision_engine_events_ingested_total",
                "Measurement events accepted into history"
            )
            .expect("Failed to register events_ingested_total"),

            events_dropped: register_int_counter!(
                "decision_engine_events_dropped_total",
                "Measurement events rejected at ingestion"
            )
            .expect("Failed to register events_dropped_total"),

            decision_latency_seconds: register_histogram!(
                "decision_engine_decision_latency_seconds",
                "Time spent evaluating one full decision cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register decision_latency_seconds"),

            actions_emitted: register_int_counter_vec!(
                "decision_engine_actions_emitted_total",
                "Control actions admitted by the gatekeeper",
                &["kind"]
            )
            .expect("Failed to register actions_emitted_total"),

            actions_suppressed: register_int_counter!(
                "decision_engine_actions_suppressed_total",
                "Control actions withheld by the gatekeeper"
            )
            .expect("Failed to register actions_suppressed_total"),

            entities_tracked: register_int_gauge!(
                "decision_engine_entities_tracked",
                "Entities with buffered measurement history"
            )
            .expect("Failed to register entities_tracked"),

            training_passes: register_int_gauge!(
                "decision_engine_training_passes_total",
                "Completed model training passes"
            )
            .expect("Failed to register training_passes_total"),

            training_failures: register_int_gauge!(
                "decision_engine_training_failures_total",
                "Model training passes that kept the previous model"
            )
            .expect("Failed to register training_failures_total"),

            alerts_suppressed: register_int_gauge!(
                "decision_engine_alerts_suppressed_total",
                "Anomaly alerts withheld by an active cooldown"
            )
            .expect("Failed to register alerts_suppressed_total"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_events_ingested(&self) {
        self.inner().events_ingested.inc();
    }

    pub fn inc_events_dropped(&self) {
        self.inner().events_dropped.inc();
    }

    pub fn observe_decision_latency(&self, duration_secs: f64) {
        self.inner().decision_latency_seconds.observe(duration_secs);
    }

    pub fn inc_action_emitted(&self, kind: &str) {
        self.inner().actions_emitted.with_label_values(&[kind]).inc();
    }

    pub fn inc_actions_suppressed(&self) {
        self.inner().actions_suppressed.inc();
    }

    pub fn set_entities_tracked(&self, count: i64) {
        self.inner().entities_tracked.set(count);
    }

    pub fn set_training_passes(&self, count: i64) {
        self.inner().training_passes.set(count);
    }

    pub fn set_training_failures(&self, count: i64) {
        self.inner().training_failures.set(count);
    }

    pub fn set_alerts_suppressed(&self, count: i64) {
        self.inner().alerts_suppressed.set(count);
    }
}

/// Structured logger for engine events
///
/// Consistent event-shaped records for decisions, alerts, steering, and
/// lifecycle transitions.
#[derive(Clone)]
pub struct StructuredLogger {
    engine_id: String,
}

impl StructuredLogger {
    pub fn new(engine_id: impl Into<String>) -> Self {
        Self {
            engine_id: engine_id.into(),
        }
    }

    pub fn log_startup(&self, version: &str, strategy: &str) {
        info!(
            event = "engine_started",
            engine = %self.engine_id,
            engine_version = %version,
            strategy = %strategy,
            "Decision engine started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            engine = %self.engine_id,
            reason = %reason,
            "Decision engine shutting down"
        );
    }

    /// Log an admitted control action
    pub fn log_action(&self, action: &ControlAction) {
        match action {
            ControlAction::ResourceAllocation(d) => {
                info!(
                    event = "allocation_decided",
                    engine = %self.engine_id,
                    entity_id = %d.entity_id,
                    prb_max_ratio = d.prb_setting.ratio(),
                    handover = d.handover_flag,
                    "Resource allocation decided"
                );
            }
            ControlAction::Anomaly(a) => {
                warn!(
                    event = "anomaly_detected",
                    engine = %self.engine_id,
                    entity_id = %a.entity_id,
                    metric = %a.metric_name,
                    z_score = a.z_score,
                    value = a.value,
                    severity = %a.severity,
                    "Anomaly detected"
                );
            }
            ControlAction::Steering(s) => {
                info!(
                    event = "steering_recommended",
                    engine = %self.engine_id,
                    entity_id = %s.entity_id,
                    traffic_type = %s.traffic_type,
                    target_cell = s.target_cell_hint.as_deref().unwrap_or("unknown"),
                    reason = %s.reason,
                    "Steering recommended"
                );
            }
        }
    }

    /// Log a measurement rejected at ingestion
    pub fn log_malformed_input(&self, entity_id: &str, metric_name: &str, reason: &str) {
        warn!(
            event = "malformed_input",
            engine = %self.engine_id,
            entity_id = %entity_id,
            metric = %metric_name,
            reason = %reason,
            "Dropped malformed measurement"
        );
    }

    /// Log completion of a decision cycle
    pub fn log_decision_cycle(&self, entities: usize, actions: usize, elapsed_ms: u128) {
        info!(
            event = "decision_cycle",
            engine = %self.engine_id,
            entities = entities,
            actions = actions,
            elapsed_ms = elapsed_ms,
            "Decision cycle complete"
        );
    }
}
