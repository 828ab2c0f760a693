//! Error taxonomy shared by the publish and mirror pipelines.
//!
//! Validation variants carry the user-facing message. Adapter crates map
//! their foreign errors (`sqlx`, `reqwest`, `zip`) into this type at the seam.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(
        "Unknown publisher: {0}\nUse the 'create-namespace' command to create a namespace corresponding to your publisher name."
    )]
    UnknownPublisher(String),

    #[error("Insufficient access rights for publisher: {0}")]
    InsufficientPermission(String),

    #[error("Invalid access token")]
    InvalidAccessToken,

    #[error("{0}")]
    InvalidIdentifier(String),

    #[error("Extension {id} is already published{}", duplicate_suffix(.active))]
    DuplicateVersion { id: String, active: bool },

    #[error("{}", format_metadata_issues(.0))]
    MetadataInvalid(Vec<String>),

    #[error("Cannot resolve dependency: {0}")]
    UnresolvedDependency(String),

    #[error("Failed to resolve artifact location: {0}")]
    ResolutionError(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("No extension signature found in {0}")]
    SignatureNotFound(String),

    #[error("Unverified extension package: {0}")]
    UnverifiedArtifact(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether this error is a validation failure the publisher must fix,
    /// as opposed to an infrastructure failure a retry might resolve.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            CoreError::UnknownPublisher(_)
                | CoreError::InsufficientPermission(_)
                | CoreError::InvalidAccessToken
                | CoreError::InvalidIdentifier(_)
                | CoreError::DuplicateVersion { .. }
                | CoreError::MetadataInvalid(_)
                | CoreError::UnresolvedDependency(_)
        )
    }
}

fn duplicate_suffix(active: &bool) -> &'static str {
    if *active {
        "."
    } else {
        ", but currently isn't active and therefore not visible."
    }
}

fn format_metadata_issues(issues: &[String]) -> String {
    match issues {
        [single] => single.clone(),
        _ => format!(
            "Multiple issues were found in the extension metadata:\n{}",
            issues.join("\n")
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
