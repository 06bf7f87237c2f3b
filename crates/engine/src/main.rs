//! Decision Engine - streaming decision engines for a RAN intelligent
//! controller
//!
//! Runs one configured strategy (predictive resource allocation, anomaly
//! detection, or QoS traffic steering) over a stream of per-entity
//! performance measurements and emits throttled control actions.

use anyhow::Result;
use engine_lib::{
    gatekeeper::ActionGatekeeper,
    health::{components, HealthRegistry},
    observability::{EngineMetrics, StructuredLogger},
    pipeline::DecisionPipeline,
    strategy::build_strategy,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Depth of the inbound measurement channel
const EVENT_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting decision-engine");

    // Load configuration
    let config = config::EngineConfig::load()?;
    let kind = config.strategy_kind()?;
    info!(strategy = %config.strategy, "Engine configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::INGEST).await;
    health_registry.register(components::DECISION).await;
    health_registry.register(components::MODEL).await;
    health_registry.register(components::DISPATCH).await;

    // Initialize metrics and structured logging
    let metrics = EngineMetrics::new();
    let logger = StructuredLogger::new(config.strategy.clone());
    logger.log_startup(ENGINE_VERSION, &config.strategy);

    // Build the configured strategy and the pipeline around it
    let strategy = build_strategy(kind, &config.strategy_config());
    let gatekeeper = ActionGatekeeper::new(config.gatekeeper_config());
    let (pipeline, mut action_rx) =
        DecisionPipeline::new(strategy, gatekeeper, config.pipeline_config());
    let pipeline = Arc::new(pipeline);

    let (shutdown_tx, _) = broadcast::channel(1);

    // The measurement-ingestion collaborator feeds this channel once its
    // subscription handshake completes; dropping the sender on shutdown
    // stops the stream.
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

    let ingest_handle = tokio::spawn(
        Arc::clone(&pipeline).run_ingest(event_rx, shutdown_tx.subscribe()),
    );
    let decision_handle =
        tokio::spawn(Arc::clone(&pipeline).run_decisions(shutdown_tx.subscribe()));

    // Hand admitted actions to the control-dispatch collaborator
    tokio::spawn(async move {
        while let Some(action) = action_rx.recv().await {
            debug!(kind = action.kind(), entity_id = %action.entity_id(), "Action ready for dispatch");
        }
    });

    // Create shared application state and mark the engine ready
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));
    health_registry.set_ready(true);

    // Start health and metrics server
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    // Stop accepting measurements, let in-flight decision work finish, and
    // abandon any in-flight training pass
    drop(event_tx);
    let _ = shutdown_tx.send(());
    let _ = ingest_handle.await;
    let _ = decision_handle.await;
    info!("Shutdown complete");

    Ok(())
}
