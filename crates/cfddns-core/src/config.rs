//! Configuration types for the DDNS updater
//!
//! The configuration is a JSON file, `config.json`, located in the directory
//! named by `DDNS_CONFIG_PATH` (current directory when unset):
//!
//! ```json
//! {
//!   "api_token": "...",
//!   "zone_id": "023e105f4ecef8ad9ca31a8372d0c353",
//!   "subdomains": [
//!     { "name": "", "proxied": false },
//!     { "name": "www", "proxied": true }
//!   ],
//!   "purgeUnknownRecords": false,
//!   "ttl": 300
//! }
//! ```
//!
//! The configuration is loaded once and passed by value to the engine.

use crate::record::DesiredRecord;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable naming the directory holding `config.json`
pub const CONFIG_PATH_ENV: &str = "DDNS_CONFIG_PATH";

/// File name of the configuration inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Smallest TTL accepted before falling back to [`DEFAULT_TTL`]
pub const MIN_TTL: u32 = 30;

/// TTL used when the configured one is missing or too low
pub const DEFAULT_TTL: u32 = 300;

/// Cloudflare API v4 base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Cloudflare trace endpoint used to discover the public IPv4 address
pub const DEFAULT_TRACE_URL: &str = "https://1.1.1.1/cdn-cgi/trace";

/// Main DDNS configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Cloudflare API token (Zone:DNS:Edit)
    #[serde(default)]
    pub api_token: String,

    /// Zone identifier the subdomains belong to
    #[serde(default)]
    pub zone_id: String,

    /// Subdomains to keep pointed at the public IP
    #[serde(default)]
    pub subdomains: Vec<DesiredRecord>,

    /// Delete duplicate A-records for managed names
    #[serde(rename = "purgeUnknownRecords", default)]
    pub purge_unknown_records: bool,

    /// Record TTL in seconds, also the repeat interval
    ///
    /// Negative and `null` values read as 0 and are normalized on load.
    #[serde(default, deserialize_with = "deserialize_lenient_ttl")]
    pub ttl: u32,

    /// Cloudflare API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Trace endpoint used to discover the public IP
    #[serde(default = "default_trace_url")]
    pub trace_url: String,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

// The API token must never reach logs
impl fmt::Debug for DdnsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdnsConfig")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("subdomains", &self.subdomains)
            .field("purge_unknown_records", &self.purge_unknown_records)
            .field("ttl", &self.ttl)
            .field("api_base_url", &self.api_base_url)
            .field("trace_url", &self.trace_url)
            .field("engine", &self.engine)
            .finish()
    }
}

impl DdnsConfig {
    /// Create a new configuration with defaults
    pub fn new(api_token: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            zone_id: zone_id.into(),
            subdomains: Vec::new(),
            purge_unknown_records: false,
            ttl: DEFAULT_TTL,
            api_base_url: default_api_base_url(),
            trace_url: default_trace_url(),
            engine: EngineConfig::default(),
        }
    }

    /// Add a subdomain
    pub fn with_subdomain(mut self, label: impl Into<String>, proxied: bool) -> Self {
        self.subdomains.push(DesiredRecord::new(label, proxied));
        self
    }

    /// Enable or disable purging of duplicate records
    pub fn with_purge(mut self, purge: bool) -> Self {
        self.purge_unknown_records = purge;
        self
    }

    /// Set the TTL (normalized on [`DdnsConfig::normalize_ttl`])
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Path of `config.json` inside `dir`
    pub fn file_in(dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(CONFIG_FILE_NAME)
    }

    /// Directory named by `DDNS_CONFIG_PATH`, or the current directory
    pub fn dir_from_env() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Parse, normalize and validate a configuration document
    pub fn from_json(json: &str) -> Result<Self, crate::Error> {
        let mut config: DdnsConfig = serde_json::from_str(json)
            .map_err(|e| crate::Error::config(format!("Error parsing config: {}", e)))?;

        if config.normalize_ttl() {
            tracing::info!(
                "TTL is too low or missing, defaulting to {} (auto)",
                DEFAULT_TTL
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Load `config.json` from `dir`
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = Self::file_in(dir);
        let json = std::fs::read_to_string(&path).map_err(|e| {
            crate::Error::config(format!("Error reading {}: {}", path.display(), e))
        })?;

        Self::from_json(&json)
    }

    /// Replace a TTL below [`MIN_TTL`] with [`DEFAULT_TTL`]
    ///
    /// Returns `true` when the TTL was replaced.
    pub fn normalize_ttl(&mut self) -> bool {
        if self.ttl < MIN_TTL {
            self.ttl = DEFAULT_TTL;
            true
        } else {
            false
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_token.trim().is_empty() {
            return Err(crate::Error::config("api_token is required"));
        }

        if self.zone_id.trim().is_empty() {
            return Err(crate::Error::config("zone_id is required"));
        }

        if self.subdomains.is_empty() {
            return Err(crate::Error::config("No subdomains configured"));
        }

        if self.ttl < MIN_TTL {
            return Err(crate::Error::config(format!(
                "ttl must be at least {} seconds. Got: {}",
                MIN_TTL, self.ttl
            )));
        }

        validate_url("api_base_url", &self.api_base_url)?;
        validate_url("trace_url", &self.trace_url)?;
        self.engine.validate()?;

        Ok(())
    }
}

fn validate_url(key: &str, url: &str) -> Result<(), crate::Error> {
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(crate::Error::config(format!(
            "{} must use HTTP or HTTPS scheme. Got: {}",
            key, url
        )));
    }
    Ok(())
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay after a failed zone lookup or record listing (in seconds)
    ///
    /// The pass is abandoned after this delay; the next tick retries from
    /// scratch.
    #[serde(default = "default_failure_backoff_secs")]
    pub failure_backoff_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config(
                "engine.event_channel_capacity must be > 0",
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            failure_backoff_secs: default_failure_backoff_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Accept any JSON integer or `null` for `ttl`
fn deserialize_lenient_ttl<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let ttl = Option::<i64>::deserialize(deserializer)?.unwrap_or(0);
    Ok(u32::try_from(ttl.max(0)).unwrap_or(u32::MAX))
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_trace_url() -> String {
    DEFAULT_TRACE_URL.to_string()
}

fn default_failure_backoff_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "api_token": "secret_token_12345",
        "zone_id": "023e105f4ecef8ad9ca31a8372d0c353",
        "subdomains": [
            { "name": "", "proxied": false },
            { "name": "www", "proxied": true }
        ],
        "purgeUnknownRecords": true,
        "ttl": 3600
    }"#;

    #[test]
    fn test_parse_full_document() {
        let config = DdnsConfig::from_json(MINIMAL).unwrap();

        assert_eq!(config.zone_id, "023e105f4ecef8ad9ca31a8372d0c353");
        assert_eq!(config.subdomains.len(), 2);
        assert_eq!(config.subdomains[1], DesiredRecord::new("www", true));
        assert!(config.purge_unknown_records);
        assert_eq!(config.ttl, 3600);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.trace_url, DEFAULT_TRACE_URL);
        assert_eq!(config.engine.failure_backoff_secs, 5);
    }

    #[test]
    fn test_low_or_missing_ttl_defaults() {
        for ttl in [
            "",
            r#", "ttl": 0"#,
            r#", "ttl": 29"#,
            r#", "ttl": -5"#,
            r#", "ttl": null"#,
        ] {
            let json = format!(
                r#"{{"api_token": "t", "zone_id": "z", "subdomains": [{{"name": "a"}}]{}}}"#,
                ttl
            );
            let config = DdnsConfig::from_json(&json).unwrap();
            assert_eq!(config.ttl, DEFAULT_TTL, "input {:?}", ttl);
        }
    }

    #[test]
    fn test_oversized_ttl_saturates() {
        let json = r#"{"api_token": "t", "zone_id": "z", "subdomains": [{"name": "a"}], "ttl": 9999999999}"#;
        let config = DdnsConfig::from_json(json).unwrap();
        assert_eq!(config.ttl, u32::MAX);
    }

    #[test]
    fn test_non_integer_ttl_is_config_error() {
        let json = r#"{"api_token": "t", "zone_id": "z", "subdomains": [{"name": "a"}], "ttl": "300"}"#;
        assert!(DdnsConfig::from_json(json).unwrap_err().is_config());
    }

    #[test]
    fn test_ttl_at_minimum_is_kept() {
        let mut config = DdnsConfig::new("t", "z").with_ttl(MIN_TTL);
        assert!(!config.normalize_ttl());
        assert_eq!(config.ttl, MIN_TTL);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let err = DdnsConfig::from_json(r#"{"zone_id": "z", "subdomains": [{"name": "a"}]}"#)
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("api_token"));
    }

    #[test]
    fn test_missing_zone_is_config_error() {
        let err = DdnsConfig::new("token", "  ")
            .with_subdomain("www", false)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("zone_id"));
    }

    #[test]
    fn test_no_subdomains_is_config_error() {
        assert!(DdnsConfig::new("token", "zone").validate().is_err());
    }

    #[test]
    fn test_unparseable_document_is_config_error() {
        let err = DdnsConfig::from_json("{ not json").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_bad_url_scheme_rejected() {
        let mut config = DdnsConfig::new("token", "zone").with_subdomain("www", false);
        config.trace_url = "ftp://example.com/trace".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = DdnsConfig::from_json(MINIMAL).unwrap();
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(DdnsConfig::file_in(dir.path()), MINIMAL).unwrap();

        let config = DdnsConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.subdomains.len(), 2);
    }

    #[test]
    fn test_load_from_dir_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DdnsConfig::load_from_dir(dir.path()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}
