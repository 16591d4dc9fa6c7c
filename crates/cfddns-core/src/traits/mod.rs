//! Core traits for the DDNS updater
//!
//! This module defines the interfaces of the engine's external collaborators.
//!
//! - [`IpSource`]: Discover the current public IP
//! - [`ZoneResolver`]: Resolve a zone's base domain name
//! - [`RecordStore`]: Read and write A-records via the provider API

pub mod ip_source;
pub mod record_store;

pub use ip_source::IpSource;
pub use record_store::{RecordStore, ZoneResolver};
