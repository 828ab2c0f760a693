//! Upstream registry mirroring.
//!
//! - [`catalog`]: the JSON documents an upstream registry serves.
//! - [`upstream`]: [`UpstreamCatalog`], the catalog lookup seam, and its
//!   HTTP implementation.
//! - [`artifact`]: [`ArtifactSource`], locating and downloading archives,
//!   plus signature verification of downloaded archives.
//! - [`reconciler`]: [`MirrorReconciler`], which replays the upstream
//!   version history of an extension into the local registry.

pub mod artifact;
pub mod catalog;
pub mod reconciler;
pub mod upstream;

pub use artifact::{ArtifactSource, HttpArtifactSource};
pub use catalog::{CatalogEntry, NamespaceDetails, PublisherInfo};
pub use reconciler::{MirrorCounters, MirrorReconciler};
pub use upstream::{HttpUpstreamClient, UpstreamCatalog};
