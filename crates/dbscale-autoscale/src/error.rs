//! Error types for the decision engine.

use dbscale_state::StateError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type ScalerResult<T> = Result<T, ScalerError>;

/// Errors surfaced to the caller of the engine.
///
/// Collaborator failures (operation lookups, scaling calls, event
/// publishing) are absorbed inside the engine; only persistence failures
/// reach the caller.
#[derive(Debug, Error)]
pub enum ScalerError {
    #[error("state store: {0}")]
    State(#[from] StateError),
}
