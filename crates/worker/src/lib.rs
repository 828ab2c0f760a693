//! Background worker for the extension registry.
//!
//! - [`config`]: environment-driven [`config::WorkerConfig`].
//! - [`bootstrap`]: one-off setup run before the first sweep.
//! - [`sweep`]: the periodic mirror loop.

pub mod bootstrap;
pub mod config;
pub mod sweep;
