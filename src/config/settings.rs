use serde::Deserialize;

/// ================================
/// Provider tuning knobs
/// ================================
///
/// Plain data with defaults; embedders deserialize this from their own
/// config files. The provider never reads files or environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderSettings {
    /// Pre-expiry window in which `fetch` proactively refreshes.
    #[serde(default = "default_refresh_padding_ms")]
    pub refresh_padding_ms: u64,
    /// Retention of settled refresh-map entries past their expiry date.
    #[serde(default = "default_expiry_age_seconds")]
    pub expiry_age_seconds: u64,
    /// Back-off before a failed save is retried by a later fetch.
    #[serde(default = "default_save_retry_seconds")]
    pub save_retry_seconds: u64,
    /// Cadence of the refresh-map pruner.
    #[serde(default = "default_prune_interval_seconds")]
    pub prune_interval_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            refresh_padding_ms: default_refresh_padding_ms(),
            expiry_age_seconds: default_expiry_age_seconds(),
            save_retry_seconds: default_save_retry_seconds(),
            prune_interval_seconds: default_prune_interval_seconds(),
        }
    }
}

fn default_refresh_padding_ms() -> u64 {
    500
}

fn default_expiry_age_seconds() -> u64 {
    86_400
}

fn default_save_retry_seconds() -> u64 {
    60
}

fn default_prune_interval_seconds() -> u64 {
    300
}
