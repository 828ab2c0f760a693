//! Domain logic for the extension registry.
//!
//! Everything here is free of I/O beyond the local filesystem:
//!
//! - [`naming`] and [`target_platform`] define version identity rules.
//! - [`manifest`] parses and validates `package.json` metadata.
//! - [`archive`] reads `.vsix` archives into file resources.
//! - [`signing`] signs and verifies archives with Ed25519.
//! - [`temp_file`] owns staging files for the duration of one operation.

pub mod archive;
pub mod error;
pub mod hashing;
pub mod manifest;
pub mod naming;
pub mod resource;
pub mod signing;
pub mod target_platform;
pub mod temp_file;
pub mod types;

pub use error::CoreError;
pub use target_platform::TargetPlatform;
pub use temp_file::TempFileHandle;
