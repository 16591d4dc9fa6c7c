// # IP Source Trait
//
// Defines the interface for discovering the host's current public IPv4
// address.
//
// ## Implementations
//
// - Cloudflare trace endpoint: `cfddns-ip-trace` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> cfddns_core::Result<()> {
//     let source = /* IpSource implementation */;
//     let ip = source.current().await?;
//     println!("public IP: {}", ip);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP discovery
///
/// Called once per pass by the engine. Implementations are single-shot:
/// no caching, no retry, no background tasks. A failure (including an
/// unresolved address) aborts the current pass and the next tick retries.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the current public IPv4 address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The current public address
    /// - `Err(Error)`: If the address could not be resolved
    async fn current(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Name of the source (for logging)
    fn source_name(&self) -> &'static str;
}
