//! Online-trained predictive resource allocator
//!
//! Predicts a discrete PRB quota setting and a handover flag per entity from
//! throughput features. Models train in-process from accumulated outcomes:
//! recording an outcome is O(1) and always on; training is threshold-gated,
//! runs off the decision path, and is single-flight per allocator.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{info, warn};

use crate::error::EngineError;
use crate::ml::{LabeledSample, RandomForest, StandardScaler};
use crate::models::{
    ControlAction, FeatureVector, PrbSetting, ResourceAllocationDecision,
};
use crate::strategy::{DecisionStrategy, EngineContext, StrategyStats};

/// Allocator tunables
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Samples required before the first training pass
    pub initial_train_threshold: usize,
    /// New samples required between retraining passes
    pub retrain_interval: usize,
    /// Training buffer cap; on overflow the buffer is compacted
    pub buffer_cap: usize,
    /// Samples kept after compaction
    pub buffer_keep: usize,
    /// Handover probability above which the flag is raised
    pub handover_probability: f64,
    /// Trees per forest
    pub n_trees: usize,
    /// Maximum tree depth
    pub max_depth: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            initial_train_threshold: 20,
            retrain_interval: 50,
            buffer_cap: 1000,
            buffer_keep: 500,
            handover_probability: 0.7,
            n_trees: 10,
            max_depth: 5,
        }
    }
}

/// Model lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Untrained,
    Trained,
    Retraining,
}

/// One recorded outcome
#[derive(Debug, Clone)]
struct TrainingRow {
    features: [f64; FeatureVector::DIM],
    prb_label: f64,
    handover_label: f64,
}

#[derive(Debug, Default)]
struct TrainingBuffer {
    rows: Vec<TrainingRow>,
    /// Monotonic count of all outcomes ever recorded, survives compaction
    total_recorded: u64,
}

/// Fitted model pair plus the scaler they were trained with
struct TrainedModel {
    scaler: StandardScaler,
    prb_forest: RandomForest,
    /// Absent when the training labels held a single handover class
    handover_forest: Option<RandomForest>,
    /// `total_recorded` at the time this model was fitted
    trained_at: u64,
}

/// State shared between the decision path and the training task
struct AllocatorInner {
    config: AllocatorConfig,
    buffer: Mutex<TrainingBuffer>,
    model: RwLock<Option<TrainedModel>>,
    training_in_flight: AtomicBool,
    training_pending: AtomicBool,
    training_passes: AtomicU64,
    training_failures: AtomicU64,
}

impl AllocatorInner {
    fn record_outcome(&self, features: &FeatureVector, prb_label: f64, handover_label: f64) {
        let mut buffer = self.buffer.lock().unwrap();
        buffer.rows.push(TrainingRow {
            features: features.as_array(),
            prb_label,
            handover_label,
        });
        buffer.total_recorded += 1;
        if buffer.rows.len() > self.config.buffer_cap {
            let excess = buffer.rows.len() - self.config.buffer_keep;
            buffer.rows.drain(..excess);
        }
    }

    fn training_due(&self) -> bool {
        let total = self.buffer.lock().unwrap().total_recorded;
        match self.model.read().unwrap().as_ref() {
            None => total >= self.config.initial_train_threshold as u64,
            Some(model) => {
                total.saturating_sub(model.trained_at) >= self.config.retrain_interval as u64
            }
        }
    }

    fn maybe_train(&self) -> Result<bool, EngineError> {
        if self.training_in_flight.swap(true, Ordering::SeqCst) {
            self.training_pending.store(true, Ordering::SeqCst);
            return Ok(false);
        }

        let result = self.train_once();
        // Honor one deferred trigger that arrived mid-pass
        if self.training_pending.swap(false, Ordering::SeqCst) && self.training_due() {
            if let Err(e) = self.train_once() {
                warn!(error = %e, "Deferred training pass failed");
            }
        }
        self.training_in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn train_once(&self) -> Result<bool, EngineError> {
        let (rows, total) = {
            let buffer = self.buffer.lock().unwrap();
            (buffer.rows.clone(), buffer.total_recorded)
        };

        let due = match self.model.read().unwrap().as_ref() {
            None => total >= self.config.initial_train_threshold as u64,
            Some(model) => {
                total.saturating_sub(model.trained_at) >= self.config.retrain_interval as u64
            }
        };
        if !due {
            return Ok(false);
        }

        match self.fit(&rows, total) {
            Ok(model) => {
                *self.model.write().unwrap() = Some(model);
                let passes = self.training_passes.fetch_add(1, Ordering::SeqCst) + 1;
                info!(samples = rows.len(), passes, "Allocator models trained");
                Ok(true)
            }
            Err(e) => {
                // Previous model state is retained
                self.training_failures.fetch_add(1, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn fit(&self, rows: &[TrainingRow], total: u64) -> Result<TrainedModel, EngineError> {
        let usable: Vec<&TrainingRow> = rows
            .iter()
            .filter(|r| r.features.iter().all(|v| v.is_finite()) && r.prb_label.is_finite())
            .collect();
        if usable.len() < 2 {
            return Err(EngineError::Training(format!(
                "degenerate training data: {} usable of {} buffered",
                usable.len(),
                rows.len()
            )));
        }

        let raw: Vec<Vec<f64>> = usable.iter().map(|r| r.features.to_vec()).collect();
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&raw);

        let prb_samples: Vec<LabeledSample> = scaled
            .iter()
            .zip(usable.iter())
            .map(|(f, r)| LabeledSample::new(f.clone(), r.prb_label))
            .collect();
        let mut prb_forest = RandomForest::new(self.config.n_trees, self.config.max_depth);
        prb_forest.fit(&prb_samples);
        if !prb_forest.is_fitted() {
            return Err(EngineError::Training("PRB forest failed to fit".to_string()));
        }

        // The handover classifier needs both classes present
        let has_both_classes = usable.iter().any(|r| r.handover_label > 0.5)
            && usable.iter().any(|r| r.handover_label <= 0.5);
        let handover_forest = if has_both_classes {
            let ho_samples: Vec<LabeledSample> = scaled
                .iter()
                .zip(usable.iter())
                .map(|(f, r)| LabeledSample::new(f.clone(), r.handover_label))
                .collect();
            let mut forest = RandomForest::new(self.config.n_trees, self.config.max_depth)
                .with_seed(43);
            forest.fit(&ho_samples);
            forest.is_fitted().then_some(forest)
        } else {
            None
        };

        Ok(TrainedModel {
            scaler,
            prb_forest,
            handover_forest,
            trained_at: total,
        })
    }

    fn predict(&self, features: &FeatureVector) -> Option<(PrbSetting, bool)> {
        let guard = self.model.read().unwrap();
        let model = guard.as_ref()?;

        let scaled = model.scaler.transform(&features.as_array());
        let prb_raw = model.prb_forest.predict(&scaled)?;
        let prb = if prb_raw > PrbSetting::midpoint() {
            PrbSetting::High
        } else {
            PrbSetting::Low
        };

        let handover = model
            .handover_forest
            .as_ref()
            .and_then(|f| f.predict(&scaled))
            .map(|p| p > self.config.handover_probability)
            .unwrap_or(false);

        Some((prb, handover))
    }
}

/// Predictive allocator strategy
pub struct PredictiveAllocator {
    inner: Arc<AllocatorInner>,
}

impl PredictiveAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            inner: Arc::new(AllocatorInner {
                config,
                buffer: Mutex::new(TrainingBuffer::default()),
                model: RwLock::new(None),
                training_in_flight: AtomicBool::new(false),
                training_pending: AtomicBool::new(false),
                training_passes: AtomicU64::new(0),
                training_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Append one observed outcome to the bounded training buffer
    pub fn record_outcome(&self, features: &FeatureVector, prb_label: f64, handover_label: f64) {
        self.inner.record_outcome(features, prb_label, handover_label);
    }

    /// Whether accumulated outcomes warrant a (re)training pass
    pub fn training_due(&self) -> bool {
        self.inner.training_due()
    }

    /// Run a training pass if one is due
    ///
    /// Single-flight: a call arriving while another pass is running defers
    /// (pending flag) instead of queueing. Returns whether a pass completed.
    pub fn maybe_train(&self) -> Result<bool, EngineError> {
        self.inner.maybe_train()
    }

    /// Move a due training pass onto a blocking task so it never delays an
    /// in-flight decision cycle; runs inline when no runtime is present
    pub fn request_training(&self) {
        if !self.inner.training_due() || self.inner.training_in_flight.load(Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                // Detached on purpose: shutdown abandons the pass
                handle.spawn_blocking(move || {
                    if let Err(e) = inner.maybe_train() {
                        warn!(error = %e, "Training pass failed, keeping previous model");
                    }
                });
            }
            Err(_) => {
                if let Err(e) = inner.maybe_train() {
                    warn!(error = %e, "Training pass failed, keeping previous model");
                }
            }
        }
    }

    /// Predict a PRB setting and handover flag; `None` while untrained
    ///
    /// Features pass through the scaler fitted at training time before
    /// reaching the forests.
    pub fn predict(&self, features: &FeatureVector) -> Option<(PrbSetting, bool)> {
        self.inner.predict(features)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModelState {
        let trained = self.inner.model.read().unwrap().is_some();
        match (trained, self.inner.training_in_flight.load(Ordering::SeqCst)) {
            (true, true) => ModelState::Retraining,
            (true, false) => ModelState::Trained,
            (false, _) => ModelState::Untrained,
        }
    }

    /// Completed training passes
    pub fn training_count(&self) -> u64 {
        self.inner.training_passes.load(Ordering::SeqCst)
    }
}

impl DecisionStrategy for PredictiveAllocator {
    fn name(&self) -> &'static str {
        "resource_optimizer"
    }

    fn decide(&self, entity_id: &str, ctx: &EngineContext) -> Vec<ControlAction> {
        let features = match ctx.extractor.extract(ctx.history, entity_id) {
            Some(f) => f,
            None => return Vec::new(),
        };

        let actions = match self.predict(&features) {
            Some((prb_setting, handover_flag)) => {
                // The admitted decision becomes its own outcome label until a
                // ground-truth feedback channel exists
                let ho_label = if handover_flag { 1.0 } else { 0.0 };
                self.record_outcome(&features, prb_setting.ratio() as f64, ho_label);
                vec![ControlAction::ResourceAllocation(ResourceAllocationDecision {
                    entity_id: entity_id.to_string(),
                    prb_setting,
                    handover_flag,
                })]
            }
            None => {
                // Bootstrap: record the default-high setting, emit nothing
                self.record_outcome(&features, PrbSetting::High.ratio() as f64, 0.0);
                Vec::new()
            }
        };

        self.request_training();
        actions
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats {
            training_passes: self.inner.training_passes.load(Ordering::SeqCst),
            training_failures: self.inner.training_failures.load(Ordering::SeqCst),
            alerts_suppressed: 0,
        }
    }
}
