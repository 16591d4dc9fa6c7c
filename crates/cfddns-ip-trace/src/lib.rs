// # Trace IP Source
//
// Discovers the host's public IPv4 address from Cloudflare's trace
// endpoint (`https://1.1.1.1/cdn-cgi/trace` by default).
//
// ## Response Format
//
// The endpoint answers with plain `key=value` lines:
//
// ```text
// fl=123abc
// h=1.1.1.1
// ip=203.0.113.7
// ts=1700000000.000
// ```
//
// The value of the first `ip=` line is the address.
//
// ## Behavior
//
// One GET per call. No caching, no polling, no fallback services.

use async_trait::async_trait;
use cfddns_core::config::DdnsConfig;
use cfddns_core::traits::IpSource;
use cfddns_core::{Error, Result};

use std::net::Ipv4Addr;
use std::time::Duration;

/// Source name used in logs
pub const SOURCE_NAME: &str = "cloudflare-trace";

/// HTTP timeout of the trace request
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Key of the address line in the trace body
const IP_KEY: &str = "ip=";

/// Trace-endpoint IP source
#[derive(Debug, Clone)]
pub struct TraceIpSource {
    /// Trace endpoint URL
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl TraceIpSource {
    /// Create a new trace IP source
    ///
    /// # Parameters
    ///
    /// - `url`: Trace endpoint (e.g. "https://1.1.1.1/cdn-cgi/trace")
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Create a source for the configured trace URL
    pub fn from_config(config: &DdnsConfig) -> Result<Self> {
        Self::new(config.trace_url.clone())
    }

    /// Trace endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Extract the address from a trace body
///
/// Returns `None` when no `ip=` line exists or its value is empty.
pub fn parse_trace(body: &str) -> Option<&str> {
    body.lines()
        .find_map(|line| line.strip_prefix(IP_KEY))
        .map(|value| value.trim_end_matches('\r').trim())
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl IpSource for TraceIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            Error::ip_source(format!("Error fetching IP from {}: {}", self.url, e))
        })?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "Error fetching IP from {}: HTTP {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_source(format!("Failed to read response: {}", e)))?;

        let Some(ip_text) = parse_trace(&body) else {
            return Err(Error::ip_source(format!(
                "Public IP unresolved: no ip= line in response from {}",
                self.url
            )));
        };

        let ip: Ipv4Addr = ip_text
            .parse()
            .map_err(|_| Error::ip_source(format!("Expected an IPv4 address, got: {}", ip_text)))?;

        tracing::debug!("Public IP from {}: {}", SOURCE_NAME, ip);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}
