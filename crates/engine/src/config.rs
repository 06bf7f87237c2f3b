//! Engine configuration
//!
//! All options are static at process start, sourced from `ENGINE_`-prefixed
//! environment variables with serde defaults as fallback.

use std::time::Duration;

use anyhow::Result;
use engine_lib::gatekeeper::GatekeeperConfig;
use engine_lib::pipeline::PipelineConfig;
use engine_lib::strategy::{
    AllocatorConfig, AnomalyConfig, SteeringConfig, StrategyConfig, StrategyKind, ViolationDecay,
};
use serde::Deserialize;

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Which decision strategy this process runs
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Decision cycle interval in seconds
    #[serde(default = "default_decision_interval")]
    pub decision_interval_secs: u64,

    /// Per-(entity, metric) history window capacity
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Feature extraction window
    #[serde(default = "default_feature_window")]
    pub feature_window: usize,

    /// Minimum samples for reliable statistics
    #[serde(default = "default_stats_min_samples")]
    pub stats_min_samples: u64,

    /// Z-score magnitude that marks a value anomalous
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,

    /// Seconds between alerts for the same (entity, metric)
    #[serde(default = "default_alert_cooldown")]
    pub alert_cooldown_secs: u64,

    /// Outcomes required before the first training pass
    #[serde(default = "default_initial_train_threshold")]
    pub initial_train_threshold: usize,

    /// New outcomes required between retraining passes
    #[serde(default = "default_retrain_interval")]
    pub retrain_interval: usize,

    /// QoS violations required to recommend steering
    #[serde(default = "default_violation_threshold")]
    pub violation_threshold: u32,

    /// Counter behavior on compliant cycles: "reset" or "decrement"
    #[serde(default = "default_violation_decay")]
    pub violation_decay: String,

    /// Seconds between steering actions for the same entity
    #[serde(default = "default_steering_cooldown")]
    pub steering_cooldown_secs: u64,

    /// Entity ids starting with this prefix are cells
    #[serde(default = "default_cell_prefix")]
    pub cell_prefix: String,
}

fn default_strategy() -> String {
    "resource_optimizer".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_decision_interval() -> u64 {
    2
}

fn default_history_capacity() -> usize {
    100
}

fn default_feature_window() -> usize {
    10
}

fn default_stats_min_samples() -> u64 {
    30
}

fn default_anomaly_threshold() -> f64 {
    3.0
}

fn default_alert_cooldown() -> u64 {
    60
}

fn default_initial_train_threshold() -> usize {
    20
}

fn default_retrain_interval() -> usize {
    50
}

fn default_violation_threshold() -> u32 {
    3
}

fn default_violation_decay() -> String {
    "decrement".to_string()
}

fn default_steering_cooldown() -> u64 {
    120
}

fn default_cell_prefix() -> String {
    "cell".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            api_port: default_api_port(),
            decision_interval_secs: default_decision_interval(),
            history_capacity: default_history_capacity(),
            feature_window: default_feature_window(),
            stats_min_samples: default_stats_min_samples(),
            anomaly_threshold: default_anomaly_threshold(),
            alert_cooldown_secs: default_alert_cooldown(),
            initial_train_threshold: default_initial_train_threshold(),
            retrain_interval: default_retrain_interval(),
            violation_threshold: default_violation_threshold(),
            violation_decay: default_violation_decay(),
            steering_cooldown_secs: default_steering_cooldown(),
            cell_prefix: default_cell_prefix(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ENGINE"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    pub fn strategy_kind(&self) -> Result<StrategyKind> {
        self.strategy
            .parse::<StrategyKind>()
            .map_err(anyhow::Error::msg)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            decision_interval: Duration::from_secs(self.decision_interval_secs.max(1)),
            history_capacity: self.history_capacity,
            feature_window: self.feature_window,
            stats_min_samples: self.stats_min_samples,
            ..PipelineConfig::default()
        }
    }

    pub fn strategy_config(&self) -> StrategyConfig {
        let decay = if self.violation_decay == "reset" {
            ViolationDecay::Reset
        } else {
            ViolationDecay::Decrement
        };

        StrategyConfig {
            allocator: AllocatorConfig {
                initial_train_threshold: self.initial_train_threshold,
                retrain_interval: self.retrain_interval,
                ..AllocatorConfig::default()
            },
            anomaly: AnomalyConfig {
                z_threshold: self.anomaly_threshold,
                cooldown: Duration::from_secs(self.alert_cooldown_secs),
            },
            steering: SteeringConfig {
                window_size: self.feature_window,
                violation_threshold: self.violation_threshold,
                decay,
                cell_prefix: self.cell_prefix.clone(),
                ..SteeringConfig::default()
            },
        }
    }

    pub fn gatekeeper_config(&self) -> GatekeeperConfig {
        GatekeeperConfig {
            steering_window: Duration::from_secs(self.steering_cooldown_secs),
            ..GatekeeperConfig::default()
        }
    }
}
