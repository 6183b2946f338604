//! Host-key pinning for clients, and the user-directory abstraction servers
//! authenticate against.

use rsa::RsaPublicKey;

use crate::crypto::rsa_keys;
use crate::error::{Error, Result};

/// A client's pinned server identity.
///
/// Loaded once at session setup; a `KEX_REPLY` presenting any other key is
/// rejected before a single byte of authentication data is sent.
pub struct TrustStore {
    pinned_key: RsaPublicKey,
}

impl TrustStore {
    /// Load the pinned key from a file on disk.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self {
            pinned_key: rsa_keys::load_public(path)?,
        })
    }

    pub fn from_key(pinned_key: RsaPublicKey) -> Self {
        Self { pinned_key }
    }

    /// Check a server-presented key against the pinned identity.
    ///
    /// Comparison is over the SPKI DER encoding, matching the wire
    /// representation the server sends in `KEX_REPLY.server_rsa_pub`.
    pub fn verify(&self, presented: &RsaPublicKey) -> Result<()> {
        let pinned = rsa_keys::encode_public(&self.pinned_key)?;
        let presented = rsa_keys::encode_public(presented)?;

        if pinned == presented {
            Ok(())
        } else {
            Err(Error::HostKeyMismatch)
        }
    }
}

/// A user's stored credentials, as kept by a [`UserDirectory`].
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Hex-encoded SHA-256 of the user's password.
    pub password_hash: String,
    /// Base64 SPKI-encoded authorized public keys.
    pub authorized_keys: Vec<String>,
}

/// Abstraction over the server's user database.
///
/// Opaque to the core: `rssh` never reads or writes the backing store.
pub trait UserDirectory: Send + Sync {
    /// Look up a user's stored credentials.
    fn lookup(&self, username: &str) -> Option<UserRecord>;

    /// Reload the directory from its backing store, in response to
    /// `RELOAD_USERS`. The default is a no-op for directories with nothing
    /// to reload (e.g. a static in-memory map built at startup).
    fn reload(&self) -> Result<()> {
        Ok(())
    }
}

/// Hash a password the way [`UserRecord::password_hash`] expects it:
/// lowercase-hex SHA-256.
pub fn hash_password(password: &str) -> String {
    use sha2::{Digest, Sha256};

    Sha256::digest(password.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
