//! Dynamic DNS updater for DNSExit.
//!
//! Providers render their update request as raw HTTP text and classify the
//! answer; [`http`] moves the bytes in between. The binary wires this to
//! configuration, public IP discovery and an update cache.

pub mod args;
pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod ip;
pub mod json;
pub mod request;
pub mod state;

/// User-Agent header value for HTTP requests
pub const USER_AGENT: &str = concat!("dnsexit-ddns/", env!("CARGO_PKG_VERSION"));
