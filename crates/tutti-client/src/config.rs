//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration against a local in-memory store.

use std::path::PathBuf;
use std::time::Duration;

use tutti_shared::constants::DEFAULT_GROUP_ID;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Organizational group whose collections are read and written.
    /// Env: `TUTTI_GROUP_ID`
    /// Default: `"main"`
    pub group_id: String,

    /// Upper bound for assembling one event detail view.
    /// Env: `TUTTI_AGGREGATION_TIMEOUT_SECS` (`0` disables the bound)
    /// Default: 15 seconds
    pub aggregation_timeout: Option<Duration>,

    /// Log filter directive overriding `RUST_LOG`.
    /// Env: `TUTTI_LOG`
    pub log_filter: Option<String>,

    /// JSON export used to seed the in-memory store of the preview binary.
    /// Env: `TUTTI_SEED_PATH`
    pub seed_path: Option<PathBuf>,

    /// Account the preview binary signs in as.
    /// Env: `TUTTI_ACCOUNT_ID`
    pub account_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            group_id: DEFAULT_GROUP_ID.to_string(),
            aggregation_timeout: Some(Duration::from_secs(15)),
            log_filter: None,
            seed_path: None,
            account_id: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(group) = lookup("TUTTI_GROUP_ID") {
            let group = group.trim();
            if group.is_empty() || group.contains('/') {
                tracing::warn!(value = %group, "Invalid TUTTI_GROUP_ID, using default");
            } else {
                config.group_id = group.to_string();
            }
        }

        if let Some(secs) = lookup("TUTTI_AGGREGATION_TIMEOUT_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(0) => config.aggregation_timeout = None,
                Ok(n) => config.aggregation_timeout = Some(Duration::from_secs(n)),
                Err(_) => {
                    tracing::warn!(
                        value = %secs,
                        "Invalid TUTTI_AGGREGATION_TIMEOUT_SECS, using default"
                    );
                }
            }
        }

        if let Some(filter) = lookup("TUTTI_LOG") {
            if !filter.is_empty() {
                config.log_filter = Some(filter);
            }
        }

        if let Some(path) = lookup("TUTTI_SEED_PATH") {
            config.seed_path = Some(PathBuf::from(path));
        }

        if let Some(account) = lookup("TUTTI_ACCOUNT_ID") {
            if !account.is_empty() {
                config.account_id = Some(account);
            }
        }

        config
    }
}
