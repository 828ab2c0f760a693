//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts, where rows are created directly

pub mod access_token;
pub mod extension;
pub mod extension_version;
pub mod file_resource;
pub mod membership;
pub mod namespace;
pub mod signature_key_pair;
pub mod user;
