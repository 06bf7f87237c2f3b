//! Error taxonomy for the decision engine
//!
//! Nothing here is fatal to the process: training failures keep the previous
//! model, malformed input is dropped at ingestion. Insufficient history and
//! undefined statistics are `Option::None` outcomes, not errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A training pass could not produce a usable model; the previous model
    /// state is retained.
    #[error("training failed: {0}")]
    Training(String),

    /// A measurement was rejected at ingestion and never reached decision
    /// state.
    #[error("malformed measurement: {0}")]
    MalformedInput(String),
}
