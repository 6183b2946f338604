//! Per-side session configuration.
//!
//! Construction takes an explicit config struct per side: no global mutable
//! state, everything flows through these structs.

use std::path::PathBuf;
use std::time::Duration;

/// Client-side session configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path to the pinned server host public key.
    pub trust_store_path: PathBuf,

    /// Timeout applied to the whole handshake (key-exchange + auth + service request).
    pub handshake_timeout: Duration,

    /// Identification string sent in `KEX_INIT`.
    pub client_id: String,
}

impl ClientConfig {
    pub fn new(trust_store_path: impl Into<PathBuf>) -> Self {
        Self {
            trust_store_path: trust_store_path.into(),
            handshake_timeout: Duration::from_secs(120),
            client_id: concat!("rssh-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Server-side session configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the server's RSA host private key.
    pub host_private_key_path: PathBuf,

    /// Path to the server's RSA host public key.
    pub host_public_key_path: PathBuf,

    /// Timeout applied to the whole handshake.
    pub handshake_timeout: Duration,
}

impl ServerConfig {
    pub fn new(
        host_private_key_path: impl Into<PathBuf>,
        host_public_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host_private_key_path: host_private_key_path.into(),
            host_public_key_path: host_public_key_path.into(),
            handshake_timeout: Duration::from_secs(120),
        }
    }
}
