//! Core data models for the decision engine

use serde::{Deserialize, Serialize};

/// Downlink throughput metric name (E2SM-KPM)
pub const METRIC_THP_DL: &str = "DRB.UEThpDl";
/// Uplink throughput metric name (E2SM-KPM)
pub const METRIC_THP_UL: &str = "DRB.UEThpUl";
/// RRC connection establishment success metric name
pub const METRIC_RRC_CONN_SUCC: &str = "RRC.ConnEstabSucc";
/// PDCP downlink volume metric name
pub const METRIC_PDCP_VOL_DL: &str = "DRB.PdcpSduVolumeDL";

/// A single performance measurement reported for one entity
///
/// Produced by the external measurement-ingestion collaborator after it
/// completes the subscription handshake. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementEvent {
    pub entity_id: String,
    pub metric_name: String,
    pub value: f64,
    pub timestamp: i64,
}

/// Feature vector derived from one entity's recent throughput history
///
/// Recomputed on every decision cycle, never persisted. The field set
/// matches the model input order exactly; see [`FeatureVector::as_array`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Most recent downlink throughput sample
    pub current_dl: f64,
    /// Most recent uplink throughput sample
    pub current_ul: f64,
    /// Mean downlink throughput over the feature window
    pub mean_dl: f64,
    /// Mean uplink throughput over the feature window
    pub mean_ul: f64,
    /// mean(recent half of window) - mean(older half of window), downlink
    pub trend_dl: f64,
    /// Number of samples in the downlink window
    pub window_len: f64,
}

impl FeatureVector {
    /// Number of model input features
    pub const DIM: usize = 6;

    /// Dense model input in a fixed order
    pub fn as_array(&self) -> [f64; Self::DIM] {
        [
            self.current_dl,
            self.current_ul,
            self.mean_dl,
            self.mean_ul,
            self.trend_dl,
            self.window_len,
        ]
    }
}

/// Discrete PRB quota settings the allocator can choose between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrbSetting {
    Low,
    High,
}

impl PrbSetting {
    /// Maximum PRB ratio carried in the control message
    pub fn ratio(&self) -> u32 {
        match self {
            PrbSetting::Low => 10,
            PrbSetting::High => 100,
        }
    }

    /// Midpoint between the two settings, used to discretize model output
    pub fn midpoint() -> f64 {
        (PrbSetting::Low.ratio() + PrbSetting::High.ratio()) as f64 / 2.0
    }
}

/// Traffic classes recognized by the QoS monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficType {
    Voice,
    Video,
    Gaming,
    Web,
    FileTransfer,
}

impl std::fmt::Display for TrafficType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrafficType::Voice => write!(f, "voice"),
            TrafficType::Video => write!(f, "video"),
            TrafficType::Gaming => write!(f, "gaming"),
            TrafficType::Web => write!(f, "web"),
            TrafficType::FileTransfer => write!(f, "file_transfer"),
        }
    }
}

/// Alert severity derived from how far a value sits outside its profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    High,
    Critical,
}

impl AlertSeverity {
    /// Map an absolute z-score onto the severity ladder
    pub fn from_z_score(z: f64) -> Self {
        let z = z.abs();
        if z >= 5.0 {
            AlertSeverity::Critical
        } else if z >= 4.0 {
            AlertSeverity::High
        } else {
            AlertSeverity::Warning
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Resource allocation decision for one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAllocationDecision {
    pub entity_id: String,
    pub prb_setting: PrbSetting,
    pub handover_flag: bool,
}

/// Anomaly alert for one (entity, metric) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub entity_id: String,
    pub metric_name: String,
    pub z_score: f64,
    pub value: f64,
    pub severity: AlertSeverity,
    pub timestamp: i64,
}

/// Suggested reassignment of an entity to relieve a QoS violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteeringRecommendation {
    pub entity_id: String,
    pub traffic_type: TrafficType,
    pub reason: String,
    pub target_cell_hint: Option<String>,
}

/// Control action handed to the external control-dispatch collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlAction {
    ResourceAllocation(ResourceAllocationDecision),
    Anomaly(AnomalyAlert),
    Steering(SteeringRecommendation),
}

impl ControlAction {
    /// Entity the action applies to
    pub fn entity_id(&self) -> &str {
        match self {
            ControlAction::ResourceAllocation(d) => &d.entity_id,
            ControlAction::Anomaly(a) => &a.entity_id,
            ControlAction::Steering(s) => &s.entity_id,
        }
    }

    /// Stable label for metrics and rate-limit keying
    pub fn kind(&self) -> &'static str {
        match self {
            ControlAction::ResourceAllocation(_) => "resource_allocation",
            ControlAction::Anomaly(_) => "anomaly_alert",
            ControlAction::Steering(_) => "steering",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prb_midpoint() {
        assert_eq!(PrbSetting::midpoint(), 55.0);
        assert!(PrbSetting::Low.ratio() < PrbSetting::High.ratio());
    }

    #[test]
    fn test_severity_ladder() {
        assert_eq!(AlertSeverity::from_z_score(3.2), AlertSeverity::Warning);
        assert_eq!(AlertSeverity::from_z_score(4.5), AlertSeverity::High);
        assert_eq!(AlertSeverity::from_z_score(-6.0), AlertSeverity::Critical);
    }

    #[test]
    fn test_feature_array_order() {
        let f = FeatureVector {
            current_dl: 1.0,
            current_ul: 2.0,
            mean_dl: 3.0,
            mean_ul: 4.0,
            trend_dl: 5.0,
            window_len: 6.0,
        };
        assert_eq!(f.as_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_action_kind_labels() {
        let a = ControlAction::Steering(SteeringRecommendation {
            entity_id: "ue1".to_string(),
            traffic_type: TrafficType::Video,
            reason: "qos".to_string(),
            target_cell_hint: None,
        });
        assert_eq!(a.kind(), "steering");
        assert_eq!(a.entity_id(), "ue1");
    }
}
