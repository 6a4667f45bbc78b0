//! Instance Certificate Auth Library
//!
//! Certificate-based login for platform instances. A caller presents its
//! instance certificate chain and private key; the backend verifies the chain
//! against a storage-backed trust store, checks key possession, reads the
//! organization/workspace/app identity from the leaf's organizational units,
//! and grants the union of the policies mapped to those three ids.
//!
//! # Features
//!
//! - **Mutable trust store**: CA bundles under `cert/`, re-read on every login
//! - **Three policy namespaces**: `apps`, `workspaces`, `orgs`, each with a
//!   `default` fallback
//! - **Leased grants**: 5 minute TTL, ceiling at certificate expiry, renewable
//!   in bounded steps
//! - **HTTP binding**: login, renewal and bearer-protected administration

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth_backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod login;
pub mod pki;
pub mod policy;
pub mod server;
pub mod storage;

#[cfg(test)]
mod testing;

pub use auth_backend::AuthBackend;
pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| Error::Internal(format!("failed to install tracing subscriber: {e}")))
}
