//! Core library for the RAN decision engine
//!
//! This crate provides the streaming decision machinery:
//! - Bounded per-entity measurement history and feature extraction
//! - Incremental statistical profiles for anomaly scoring
//! - Three interchangeable decision strategies (predictive resource
//!   allocation, anomaly detection, QoS traffic steering)
//! - Action gatekeeping, the ingestion/decision loops, health checks, and
//!   observability

pub mod error;
pub mod features;
pub mod gatekeeper;
pub mod health;
pub mod history;
pub mod ml;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod profile;
pub mod strategy;

pub use error::EngineError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
