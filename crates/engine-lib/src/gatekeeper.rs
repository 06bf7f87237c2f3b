//! Outbound action gatekeeper
//!
//! Last stop before actions reach the control-dispatch collaborator:
//! repeated identical allocations are deduplicated, and anomaly alerts and
//! steering recommendations are rate-limited per key so a flapping entity
//! cannot storm the controller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::models::ControlAction;

/// Gatekeeper windows per action kind
#[derive(Debug, Clone)]
pub struct GatekeeperConfig {
    /// Window in which an identical allocation for the same entity repeats
    pub allocation_window: Duration,
    /// Minimum interval between alerts for the same (entity, metric)
    pub anomaly_window: Duration,
    /// Minimum interval between steering actions for the same entity
    pub steering_window: Duration,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            allocation_window: Duration::from_secs(10),
            anomaly_window: Duration::from_secs(1),
            steering_window: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GateKey {
    kind: &'static str,
    entity_id: String,
    qualifier: String,
}

#[derive(Debug, Clone)]
struct GateRecord {
    admitted_at: Instant,
    signature: String,
}

/// Deduplicating rate limiter for control actions
pub struct ActionGatekeeper {
    config: GatekeeperConfig,
    recent: RwLock<HashMap<GateKey, GateRecord>>,
    admitted: AtomicU64,
    suppressed: AtomicU64,
}

impl ActionGatekeeper {
    pub fn new(config: GatekeeperConfig) -> Self {
        Self {
            config,
            recent: RwLock::new(HashMap::new()),
            admitted: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Decide whether an action passes to dispatch
    pub fn admit(&self, action: &ControlAction) -> bool {
        let (key, signature, window) = self.keying(action);

        {
            let recent = self.recent.read().unwrap();
            if let Some(record) = recent.get(&key) {
                let within_window = record.admitted_at.elapsed() < window;
                // A changed allocation is new information and always passes;
                // alerts and steering are limited regardless of content
                let duplicate = key.kind != "resource_allocation" || record.signature == signature;
                if within_window && duplicate {
                    self.suppressed.fetch_add(1, Ordering::SeqCst);
                    return false;
                }
            }
        }

        let mut recent = self.recent.write().unwrap();
        recent.insert(
            key,
            GateRecord {
                admitted_at: Instant::now(),
                signature,
            },
        );
        // Drop expired records so the map tracks only active windows
        let max_window = self
            .config
            .allocation_window
            .max(self.config.anomaly_window)
            .max(self.config.steering_window);
        recent.retain(|_, r| r.admitted_at.elapsed() < max_window);

        self.admitted.fetch_add(1, Ordering::SeqCst);
        true
    }

    pub fn admitted_count(&self) -> u64 {
        self.admitted.load(Ordering::SeqCst)
    }

    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.load(Ordering::SeqCst)
    }

    fn keying(&self, action: &ControlAction) -> (GateKey, String, Duration) {
        match action {
            ControlAction::ResourceAllocation(d) => (
                GateKey {
                    kind: action.kind(),
                    entity_id: d.entity_id.clone(),
                    qualifier: String::new(),
                },
                format!("{:?}/{}", d.prb_setting, d.handover_flag),
                self.config.allocation_window,
            ),
            ControlAction::Anomaly(a) => (
                GateKey {
                    kind: action.kind(),
                    entity_id: a.entity_id.clone(),
                    qualifier: a.metric_name.clone(),
                },
                String::new(),
                self.config.anomaly_window,
            ),
            ControlAction::Steering(s) => (
                GateKey {
                    kind: action.kind(),
                    entity_id: s.entity_id.clone(),
                    qualifier: String::new(),
                },
                String::new(),
                self.config.steering_window,
            ),
        }
    }
}

impl Default for ActionGatekeeper {
    fn default() -> Self {
        Self::new(GatekeeperConfig::default())
    }
}
