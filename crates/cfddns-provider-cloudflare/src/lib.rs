// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of the `ZoneResolver` and `RecordStore`
// traits of `cfddns-core`.
//
// ## Behavior
//
// - One HTTP request per trait call (listing follows pagination)
// - Full error propagation to the engine; no retry, no backoff, no caching
// - 30 second HTTP timeout
// - Specific errors for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - `success: false` envelopes are errors carrying Cloudflare's messages
// - Dry-run mode: reads are performed, writes are only logged
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Construction fails if the token is empty
//
// ## API Reference
//
// - Zone details: GET `/zones/:zone_id`
// - List DNS records: GET `/zones/:zone_id/dns_records?per_page=100&type=A`
// - Create DNS record: POST `/zones/:zone_id/dns_records`
// - Overwrite DNS record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS record: DELETE `/zones/:zone_id/dns_records/:record_id`

mod types;

use async_trait::async_trait;
use cfddns_core::config::DdnsConfig;
use cfddns_core::record::{ObservedRecord, RECORD_TYPE_A, TargetRecord, ZoneInfo};
use cfddns_core::traits::{RecordStore, ZoneResolver};
use cfddns_core::{Error, Result};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use std::time::Duration;

use types::{CloudflareResponse, CloudflareZone};

/// Provider name used in errors and logs
pub const PROVIDER_NAME: &str = "cloudflare";

/// Environment variable selecting the provider mode (`dry-run` or live)
pub const MODE_ENV: &str = "DDNS_MODE";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest page size of the DNS records listing
const MAX_PAGE_SIZE_RECORDS: u32 = 100;

/// Cloudflare zone resolver and record store
///
/// Cheap to clone; clones share the HTTP connection pool.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended POST/PUT/DELETE requests
/// - **NOT** actually modify DNS records
#[derive(Clone)]
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform reads but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider (live mode)
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `api_base`: API base URL (e.g. `https://api.cloudflare.com/client/v4`)
    ///
    /// # Errors
    ///
    /// Fails if the token is empty or the HTTP client cannot be built.
    pub fn new(api_token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
            dry_run: false,
        })
    }

    /// Create a provider from the loaded configuration
    ///
    /// Dry-run mode is enabled when `DDNS_MODE=dry-run`.
    pub fn from_config(config: &DdnsConfig) -> Result<Self> {
        let dry_run = dry_run_from_env();
        if dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self::new(config.api_token.clone(), config.api_base_url.clone())?.with_dry_run(dry_run))
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether writes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Send an authenticated request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<CloudflareResponse<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: request failed: {}", context, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());

        if !status.is_success() {
            return Err(status_error(status, &body, context));
        }

        let envelope: CloudflareResponse<T> = serde_json::from_str(&body).map_err(|e| {
            Error::invalid_response(format!("{}: failed to parse response: {}", context, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{}: {}", context, envelope.error_message()),
            ));
        }

        Ok(envelope)
    }

    /// Log a write that dry-run mode suppresses
    fn log_dry_run(&self, method: &str, url: &str, payload: Option<&TargetRecord>) {
        match payload.map(serde_json::to_string) {
            Some(Ok(body)) => {
                tracing::info!("[DRY-RUN] Would send {} {} with payload: {}", method, url, body)
            }
            _ => tracing::info!("[DRY-RUN] Would send {} {}", method, url),
        }
    }
}

/// Whether `DDNS_MODE` selects dry-run mode
pub fn dry_run_from_env() -> bool {
    std::env::var(MODE_ENV)
        .map(|mode| mode.eq_ignore_ascii_case("dry-run"))
        .unwrap_or(false)
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, body: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API token or insufficient permissions. Status: {}",
            context, status
        )),
        404 => Error::not_found(format!("{}: {}", context, body)),
        409 => Error::provider(
            PROVIDER_NAME,
            format!("{}: conflict, record changed concurrently. Status: {}", context, status),
        ),
        429 => Error::rate_limited(format!(
            "{}: rate limit exceeded. Status: {}",
            context, status
        )),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("{}: Cloudflare server error (transient): {} - {}", context, status, body),
        ),
        _ => Error::provider(
            PROVIDER_NAME,
            format!("{}: {} - {}", context, status, body),
        ),
    }
}

#[async_trait]
impl ZoneResolver for CloudflareProvider {
    /// ```http
    /// GET /zones/:zone_id
    /// Authorization: Bearer <token>
    /// ```
    async fn resolve_zone(&self, zone_id: &str) -> Result<ZoneInfo> {
        let url = self.url(&format!("/zones/{}", zone_id));
        let envelope: CloudflareResponse<CloudflareZone> =
            self.send(self.client.get(&url), "zone lookup").await?;

        let name = envelope.result.map(|zone| zone.name).unwrap_or_default();
        if name.is_empty() {
            return Err(Error::invalid_response(format!(
                "zone lookup: zone name missing for {}",
                zone_id
            )));
        }

        tracing::debug!("Found zone name: {}", name);
        Ok(ZoneInfo::new(name))
    }
}

#[async_trait]
impl RecordStore for CloudflareProvider {
    /// ```http
    /// GET /zones/:zone_id/dns_records?per_page=100&type=A[&page=N]
    /// ```
    ///
    /// Pages are concatenated in listing order.
    async fn list_records(&self, zone_id: &str) -> Result<Vec<ObservedRecord>> {
        let url = self.url(&format!("/zones/{}/dns_records", zone_id));
        let per_page = MAX_PAGE_SIZE_RECORDS.to_string();

        let mut records = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("per_page", per_page.as_str()), ("type", RECORD_TYPE_A)]);
            if page > 1 {
                request = request.query(&[("page", page)]);
            }

            let envelope: CloudflareResponse<Vec<ObservedRecord>> =
                self.send(request, "list records").await?;

            records.extend(envelope.result.unwrap_or_default());

            let total_pages = envelope.result_info.map(|info| info.total_pages).unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!("Listed {} record(s) in {} page(s)", records.len(), page);
        Ok(records)
    }

    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// { "type": "A", "name", "content", "ttl", "proxied" }
    /// ```
    async fn create_record(&self, zone_id: &str, record: &TargetRecord) -> Result<()> {
        let url = self.url(&format!("/zones/{}/dns_records", zone_id));

        if self.dry_run {
            self.log_dry_run("POST", &url, Some(record));
            return Ok(());
        }

        let _: CloudflareResponse<serde_json::Value> = self
            .send(self.client.post(&url).json(record), "create record")
            .await?;

        tracing::info!("DNS record created: {} -> {}", record.name, record.content);
        Ok(())
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// { "type": "A", "name", "content", "ttl", "proxied" }
    /// ```
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &TargetRecord,
    ) -> Result<()> {
        let url = self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id));

        if self.dry_run {
            self.log_dry_run("PUT", &url, Some(record));
            return Ok(());
        }

        let _: CloudflareResponse<serde_json::Value> = self
            .send(self.client.put(&url).json(record), "update record")
            .await?;

        tracing::info!("DNS record updated: {} -> {}", record.name, record.content);
        Ok(())
    }

    /// ```http
    /// DELETE /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let url = self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id));

        if self.dry_run {
            self.log_dry_run("DELETE", &url, None);
            return Ok(());
        }

        let _: CloudflareResponse<serde_json::Value> =
            self.send(self.client.delete(&url), "delete record").await?;

        tracing::info!("DNS record deleted: {}", record_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
