//! Publish pipeline for the extension registry.
//!
//! - [`RegistryStore`]: the persistence contract, implemented by
//!   [`PgRegistryStore`] (PostgreSQL) and [`MemoryStore`] (in-process).
//! - [`PublishPipeline`]: synchronous version creation followed by
//!   asynchronous, retry-safe materialization of the artifact's resources.
//! - [`Activator`]: what happens once a version is fully materialized.

pub mod activator;
pub mod memory_store;
pub mod pg_store;
pub mod publish;
pub mod retry;
pub mod store;

pub use activator::{Activator, StoreActivator};
pub use memory_store::MemoryStore;
pub use pg_store::PgRegistryStore;
pub use publish::{Download, MaterializeOutcome, Publication, PublishPipeline};
pub use store::RegistryStore;
