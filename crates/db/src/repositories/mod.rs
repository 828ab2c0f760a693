//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod access_token_repo;
pub mod extension_repo;
pub mod extension_version_repo;
pub mod file_resource_repo;
pub mod membership_repo;
pub mod namespace_repo;
pub mod signature_key_pair_repo;
pub mod user_repo;

pub use access_token_repo::AccessTokenRepo;
pub use extension_repo::ExtensionRepo;
pub use extension_version_repo::ExtensionVersionRepo;
pub use file_resource_repo::FileResourceRepo;
pub use membership_repo::MembershipRepo;
pub use namespace_repo::NamespaceRepo;
pub use signature_key_pair_repo::SignatureKeyPairRepo;
pub use user_repo::UserRepo;
