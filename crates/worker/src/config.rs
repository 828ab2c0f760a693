use vsx_core::naming::parse_extension_id;

/// Errors raised while reading [`WorkerConfig`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Base URL of the upstream registry, e.g. `https://open-vsx.org`.
    pub upstream_url: String,
    /// `(namespace, name)` of every extension to mirror, in sweep order.
    pub mirror_extensions: Vec<(String, String)>,
    /// Pause between two mirror sweeps (default: `3600`).
    pub mirror_interval_secs: u64,
    /// Login of the local user that mirror deletions are attributed to.
    pub mirror_user: String,
    /// Sign materialized versions and keep a signing key pair (default: `false`).
    pub integrity_enabled: bool,
    /// Timeout applied to every upstream HTTP request (default: `60`).
    pub http_timeout_secs: u64,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `DATABASE_URL`         | required                 |
    /// | `UPSTREAM_URL`         | `https://open-vsx.org`   |
    /// | `MIRROR_EXTENSIONS`    | empty                    |
    /// | `MIRROR_INTERVAL_SECS` | `3600`                   |
    /// | `MIRROR_USER`          | `mirror`                 |
    /// | `INTEGRITY_ENABLED`    | `false`                  |
    /// | `HTTP_TIMEOUT_SECS`    | `60`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let upstream_url = lookup("UPSTREAM_URL")
            .unwrap_or_else(|| "https://open-vsx.org".into())
            .trim_end_matches('/')
            .to_string();

        let mirror_extensions = parse_extension_list(
            &lookup("MIRROR_EXTENSIONS").unwrap_or_default(),
        )?;

        let mirror_interval_secs = parse_u64(&lookup, "MIRROR_INTERVAL_SECS", 3600)?;
        let http_timeout_secs = parse_u64(&lookup, "HTTP_TIMEOUT_SECS", 60)?;

        let mirror_user = lookup("MIRROR_USER").unwrap_or_else(|| "mirror".into());

        let integrity_enabled = match lookup("INTEGRITY_ENABLED") {
            None => false,
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "INTEGRITY_ENABLED",
                expected: "true or false",
                value,
            })?,
        };

        Ok(Self {
            database_url,
            upstream_url,
            mirror_extensions,
            mirror_interval_secs,
            mirror_user,
            integrity_enabled,
            http_timeout_secs,
        })
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected: "a valid u64",
            value,
        }),
    }
}

/// Parse a comma-separated list of `namespace.name` ids.
fn parse_extension_list(value: &str) -> Result<Vec<(String, String)>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|id| {
            parse_extension_id(id, "MIRROR_EXTENSIONS")
                .map(|(namespace, name)| (namespace.to_string(), name.to_string()))
                .map_err(|_| ConfigError::Invalid {
                    name: "MIRROR_EXTENSIONS",
                    expected: "a comma-separated list of namespace.name ids",
                    value: id.to_string(),
                })
        })
        .collect()
}
