//! dbscale-core — shared types for the dbscale decision engine.
//!
//! [`InstanceConfig`] is the per-invocation scaling request handed over by
//! the metric-collection stage: identifiers, size bounds, cooldown windows,
//! the selected scaling method and the latest metric samples. It is never
//! persisted by the engine.
//!
//! [`ScalerdConfig`] is the `scalerd.toml` daemon configuration.

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod types;

pub use config::ScalerdConfig;
pub use types::*;

/// Boxed `Send` future returned by the engine's collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
