//! Cloudflare API v4 wire types

use serde::Deserialize;
use std::fmt;

/// Common response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareResponse<T> {
    // Missing flag counts as success
    #[serde(default = "default_success")]
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<CloudflareError>,
    pub result_info: Option<CloudflareResultInfo>,
}

impl<T> CloudflareResponse<T> {
    /// Provider error messages joined for logging
    pub fn error_message(&self) -> String {
        if self.errors.is_empty() {
            return "request unsuccessful (no error details)".to_string();
        }
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for CloudflareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Pagination info of list responses
#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareResultInfo {
    #[serde(default)]
    pub total_pages: u32,
}

/// The part of a zone we need
#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareZone {
    #[serde(default)]
    pub name: String,
}

fn default_success() -> bool {
    true
}
