use std::time::Duration;

use val_client::aliases::{parse_alias_pairs, KNOWN_RENAMES};
use val_client::upload::{DEFAULT_CHUNK_BYTES, DEFAULT_POLL_INTERVAL};
use val_core::matcher::MatcherConfig;

use crate::error::MigrateError;

/// Migration configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local registry and authoring
/// site.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrateConfig {
    /// Registry API base URL.
    pub val_api_url: String,
    /// Bearer token for the registry and course-import endpoints.
    pub api_token: Option<String>,
    /// Course-import endpoint base URL.
    pub studio_url: String,
    pub upload_chunk_bytes: u64,
    pub upload_poll_interval: Duration,
    pub matcher: MatcherConfig,
    /// Renamed courses as `(old id, canonical id)`.
    pub course_aliases: Vec<(String, String)>,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            val_api_url: "http://localhost:8000".to_string(),
            api_token: None,
            studio_url: "http://localhost:8001".to_string(),
            upload_chunk_bytes: DEFAULT_CHUNK_BYTES,
            upload_poll_interval: DEFAULT_POLL_INTERVAL,
            matcher: MatcherConfig::default(),
            course_aliases: KNOWN_RENAMES
                .iter()
                .map(|(old, new)| (old.to_string(), new.to_string()))
                .collect(),
        }
    }
}

impl MigrateConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                  |
    /// |----------------------------|--------------------------|
    /// | `VAL_API_URL`              | `http://localhost:8000`  |
    /// | `VAL_API_TOKEN`            | (none)                   |
    /// | `STUDIO_URL`               | `http://localhost:8001`  |
    /// | `UPLOAD_CHUNK_BYTES`       | `20971520`               |
    /// | `UPLOAD_POLL_SECS`         | `5`                      |
    /// | `OVERRIDE_COURSE_PREFIXES` | (empty)                  |
    /// | `COURSE_ALIASES`           | built-in rename table    |
    pub fn from_env() -> Result<Self, MigrateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MigrateError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let upload_chunk_bytes = match var("UPLOAD_CHUNK_BYTES") {
            Some(raw) => parse_positive(&raw, "UPLOAD_CHUNK_BYTES")?,
            None => defaults.upload_chunk_bytes,
        };
        let upload_poll_interval = match var("UPLOAD_POLL_SECS") {
            Some(raw) => Duration::from_secs(parse_positive(&raw, "UPLOAD_POLL_SECS")?),
            None => defaults.upload_poll_interval,
        };
        let override_prefixes = var("OVERRIDE_COURSE_PREFIXES")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let course_aliases = match var("COURSE_ALIASES") {
            Some(raw) => parse_alias_pairs(&raw).map_err(MigrateError::Config)?,
            None => defaults.course_aliases,
        };

        Ok(Self {
            val_api_url: var("VAL_API_URL").unwrap_or(defaults.val_api_url),
            api_token: var("VAL_API_TOKEN"),
            studio_url: var("STUDIO_URL").unwrap_or(defaults.studio_url),
            upload_chunk_bytes,
            upload_poll_interval,
            matcher: MatcherConfig { override_prefixes },
            course_aliases,
        })
    }
}

fn parse_positive(raw: &str, key: &str) -> Result<u64, MigrateError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(MigrateError::Config(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
    }
}
