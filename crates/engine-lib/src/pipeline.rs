//! Ingestion and decision loops
//!
//! The ingestion loop drains the measurement stream, validates each event,
//! lets the strategy inspect it, and appends it to history. The decision
//! loop ticks independently at the configured interval and evaluates the
//! strategy for every tracked entity. Admitted actions leave on the action
//! channel; the control-dispatch collaborator consumes the other end.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::features::FeatureExtractor;
use crate::gatekeeper::ActionGatekeeper;
use crate::history::MetricsHistory;
use crate::models::{
    ControlAction, MeasurementEvent, METRIC_PDCP_VOL_DL, METRIC_RRC_CONN_SUCC, METRIC_THP_DL,
    METRIC_THP_UL,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::profile::ProfileTracker;
use crate::strategy::{DecisionStrategy, EngineContext};

/// Cycles between decision-loop summary log lines
const CYCLE_LOG_EVERY: u64 = 30;

/// Pipeline tunables, static at process start
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Interval between decision cycles
    pub decision_interval: Duration,
    /// Per-(entity, metric) history window capacity
    pub history_capacity: usize,
    /// Feature extraction window
    pub feature_window: usize,
    /// Minimum samples for reliable statistics
    pub stats_min_samples: u64,
    /// Outbound action channel depth
    pub action_buffer: usize,
    /// Metric names accepted at ingestion; everything else is dropped
    pub recognized_metrics: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decision_interval: Duration::from_secs(2),
            history_capacity: 100,
            feature_window: 10,
            stats_min_samples: 30,
            action_buffer: 100,
            recognized_metrics: vec![
                METRIC_THP_DL.to_string(),
                METRIC_THP_UL.to_string(),
                METRIC_RRC_CONN_SUCC.to_string(),
                METRIC_PDCP_VOL_DL.to_string(),
            ],
        }
    }
}

/// The streaming decision pipeline for one strategy
pub struct DecisionPipeline {
    history: MetricsHistory,
    profiles: ProfileTracker,
    extractor: FeatureExtractor,
    strategy: Arc<dyn DecisionStrategy>,
    gatekeeper: ActionGatekeeper,
    config: PipelineConfig,
    action_tx: mpsc::Sender<ControlAction>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    cycle_count: AtomicU64,
}

impl DecisionPipeline {
    /// Build a pipeline; the returned receiver is the dispatch seam
    pub fn new(
        strategy: Arc<dyn DecisionStrategy>,
        gatekeeper: ActionGatekeeper,
        config: PipelineConfig,
    ) -> (Self, mpsc::Receiver<ControlAction>) {
        let (action_tx, action_rx) = mpsc::channel(config.action_buffer);
        let logger = StructuredLogger::new(strategy.name());

        let pipeline = Self {
            history: MetricsHistory::new(config.history_capacity),
            profiles: ProfileTracker::new(config.stats_min_samples),
            extractor: FeatureExtractor::new(config.feature_window),
            strategy,
            gatekeeper,
            config,
            action_tx,
            metrics: EngineMetrics::new(),
            logger,
            cycle_count: AtomicU64::new(0),
        };
        (pipeline, action_rx)
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }

    pub fn profiles(&self) -> &ProfileTracker {
        &self.profiles
    }

    pub fn gatekeeper(&self) -> &ActionGatekeeper {
        &self.gatekeeper
    }

    fn ctx(&self) -> EngineContext<'_> {
        EngineContext {
            history: &self.history,
            profiles: &self.profiles,
            extractor: &self.extractor,
        }
    }

    /// Validate and absorb one measurement event
    pub async fn ingest(&self, event: MeasurementEvent) {
        if let Err(e) = self.validate(&event) {
            self.metrics.inc_events_dropped();
            self.logger
                .log_malformed_input(&event.entity_id, &event.metric_name, &e.to_string());
            return;
        }

        // The strategy sees the event before history and profiles absorb it,
        // so sample-driven scoring runs against the pre-update state
        let actions = self.strategy.on_measurement(&event, &self.ctx());
        self.history
            .append(&event.entity_id, &event.metric_name, event.value, event.timestamp);
        self.metrics.inc_events_ingested();

        for action in actions {
            self.route(action).await;
        }
    }

    fn validate(&self, event: &MeasurementEvent) -> Result<(), EngineError> {
        if !self
            .config
            .recognized_metrics
            .iter()
            .any(|m| m == &event.metric_name)
        {
            return Err(EngineError::MalformedInput(format!(
                "unknown metric name {}",
                event.metric_name
            )));
        }
        if !event.value.is_finite() {
            return Err(EngineError::MalformedInput("non-finite value".to_string()));
        }
        if event.value < 0.0 {
            return Err(EngineError::MalformedInput(format!(
                "negative value {}",
                event.value
            )));
        }
        Ok(())
    }

    /// Hand an action to the gatekeeper and, if admitted, to dispatch
    async fn route(&self, action: ControlAction) {
        if !self.gatekeeper.admit(&action) {
            self.metrics.inc_actions_suppressed();
            return;
        }
        self.metrics.inc_action_emitted(action.kind());
        self.logger.log_action(&action);
        if let Err(e) = self.action_tx.send(action).await {
            warn!(error = %e, "Failed to hand action to dispatch");
        }
    }

    /// Drain the measurement stream until shutdown or stream end
    pub async fn run_ingest(
        self: Arc<Self>,
        mut events: mpsc::Receiver<MeasurementEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("Starting measurement ingestion loop");
        loop {
            tokio::select! {
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => self.ingest(event).await,
                        None => {
                            info!("Measurement stream closed, stopping ingestion");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down ingestion loop");
                    break;
                }
            }
        }
    }

    /// Tick the decision cycle until shutdown
    ///
    /// An in-flight cycle always completes; only the next tick observes the
    /// shutdown signal.
    pub async fn run_decisions(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.decision_interval.as_secs(),
            strategy = self.strategy.name(),
            "Starting decision loop"
        );

        let mut ticker = interval(self.config.decision_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down decision loop");
                    break;
                }
            }
        }
    }

    /// Evaluate every tracked entity once
    pub async fn run_cycle(&self) {
        let start = Instant::now();
        let entities = self.history.entities();
        let mut emitted = 0usize;

        for entity_id in &entities {
            let actions = self.strategy.decide(entity_id, &self.ctx());
            for action in actions {
                emitted += 1;
                self.route(action).await;
            }
        }

        let elapsed = start.elapsed();
        self.metrics.observe_decision_latency(elapsed.as_secs_f64());
        self.sync_gauges(entities.len());

        let cycles = self.cycle_count.fetch_add(1, Ordering::Relaxed) + 1;
        if cycles % CYCLE_LOG_EVERY == 0 {
            self.logger
                .log_decision_cycle(entities.len(), emitted, elapsed.as_millis());
        } else {
            debug!(
                entities = entities.len(),
                actions = emitted,
                elapsed_us = elapsed.as_micros() as u64,
                "Decision cycle complete"
            );
        }
    }

    fn sync_gauges(&self, entities: usize) {
        let stats = self.strategy.stats();
        self.metrics.set_entities_tracked(entities as i64);
        self.metrics.set_training_passes(stats.training_passes as i64);
        self.metrics
            .set_training_failures(stats.training_failures as i64);
        self.metrics
            .set_alerts_suppressed(stats.alerts_suppressed as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatekeeper::GatekeeperConfig;
    use crate::models::{SteeringRecommendation, TrafficType};
    use crate::strategy::{StrategyStats, TrafficSteerer, SteeringConfig};

    fn event(entity: &str, metric: &str, value: f64, ts: i64) -> MeasurementEvent {
        MeasurementEvent {
            entity_id: entity.to_string(),
            metric_name: metric.to_string(),
            value,
            timestamp: ts,
        }
    }

    /// Emits one steering recommendation per decide call
    struct AlwaysSteer;

    impl DecisionStrategy for AlwaysSteer {
        fn name(&self) -> &'static str {
            "always_steer"
        }

        fn decide(&self, entity_id: &str, _ctx: &EngineContext) -> Vec<ControlAction> {
            vec![ControlAction::Steering(SteeringRecommendation {
                entity_id: entity_id.to_string(),
                traffic_type: TrafficType::Web,
                reason: "test".to_string(),
                target_cell_hint: None,
            })]
        }

        fn stats(&self) -> StrategyStats {
            StrategyStats::default()
        }
    }

    fn test_pipeline(
        strategy: Arc<dyn DecisionStrategy>,
    ) -> (Arc<DecisionPipeline>, mpsc::Receiver<ControlAction>) {
        let (pipeline, rx) = DecisionPipeline::new(
            strategy,
            ActionGatekeeper::new(GatekeeperConfig::default()),
            PipelineConfig::default(),
        );
        (Arc::new(pipeline), rx)
    }

    #[tokio::test]
    async fn test_unknown_metric_dropped_without_state() {
        let (pipeline, _rx) = test_pipeline(Arc::new(AlwaysSteer));

        pipeline.ingest(event("ue1", "Bogus.Metric", 1.0, 0)).await;
        assert_eq!(pipeline.history().entity_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_values_dropped() {
        let (pipeline, _rx) = test_pipeline(Arc::new(AlwaysSteer));

        pipeline.ingest(event("ue1", METRIC_THP_DL, f64::NAN, 0)).await;
        pipeline.ingest(event("ue1", METRIC_THP_DL, -4.0, 0)).await;
        assert_eq!(pipeline.history().entity_count(), 0);

        pipeline.ingest(event("ue1", METRIC_THP_DL, 4.0, 0)).await;
        assert_eq!(pipeline.history().len("ue1", METRIC_THP_DL), 1);
    }

    #[tokio::test]
    async fn test_cycle_routes_actions_through_gatekeeper() {
        let (pipeline, mut rx) = test_pipeline(Arc::new(AlwaysSteer));

        pipeline.ingest(event("ue1", METRIC_THP_DL, 5.0, 0)).await;
        pipeline.run_cycle().await;

        match rx.try_recv().unwrap() {
            ControlAction::Steering(rec) => assert_eq!(rec.entity_id, "ue1"),
            other => panic!("unexpected action: {other:?}"),
        }

        // The identical recommendation is rate-limited on the next cycle
        pipeline.run_cycle().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.gatekeeper().suppressed_count(), 1);
    }

    #[tokio::test]
    async fn test_loops_stop_on_shutdown() {
        let (pipeline, _rx) = test_pipeline(Arc::new(AlwaysSteer));
        let (shutdown_tx, _) = broadcast::channel(1);
        let (_event_tx, event_rx) = mpsc::channel(16);

        let ingest = tokio::spawn(
            Arc::clone(&pipeline).run_ingest(event_rx, shutdown_tx.subscribe()),
        );
        let decisions = tokio::spawn(Arc::clone(&pipeline).run_decisions(shutdown_tx.subscribe()));

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), ingest)
            .await
            .expect("ingest loop did not stop")
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), decisions)
            .await
            .expect("decision loop did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_ingest_stops_when_stream_closes() {
        let (pipeline, _rx) = test_pipeline(Arc::new(AlwaysSteer));
        let (shutdown_tx, _) = broadcast::channel(1);
        let (event_tx, event_rx) = mpsc::channel(16);

        let ingest = tokio::spawn(
            Arc::clone(&pipeline).run_ingest(event_rx, shutdown_tx.subscribe()),
        );

        event_tx.send(event("ue1", METRIC_THP_DL, 5.0, 0)).await.unwrap();
        drop(event_tx);

        tokio::time::timeout(Duration::from_secs(2), ingest)
            .await
            .expect("ingest loop did not stop")
            .unwrap();
        assert_eq!(pipeline.history().len("ue1", METRIC_THP_DL), 1);
    }

    #[tokio::test]
    async fn test_steerer_end_to_end_through_pipeline() {
        let steerer = Arc::new(TrafficSteerer::new(SteeringConfig::default()));
        let (pipeline, mut rx) = test_pipeline(steerer);

        // Web-like throughput far below its QoS profile
        for i in 0..10 {
            pipeline.ingest(event("ue1", METRIC_THP_DL, 2.0, i)).await;
            pipeline.ingest(event("ue1", METRIC_THP_UL, 0.5, i)).await;
        }

        pipeline.run_cycle().await;
        pipeline.run_cycle().await;
        assert!(rx.try_recv().is_err());

        // Third consecutive violation crosses the threshold
        pipeline.run_cycle().await;
        match rx.try_recv().unwrap() {
            ControlAction::Steering(rec) => {
                assert_eq!(rec.entity_id, "ue1");
                assert_eq!(rec.traffic_type, TrafficType::Web);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }
}
