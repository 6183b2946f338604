//! Symmetric key derivation from the Diffie-Hellman shared secret.

use sha2::{Digest, Sha256};

/// The derived encryption and integrity keys for one session.
#[derive(Debug)]
pub struct Keys {
    /// The AES-256-CBC encryption key.
    pub encryption_key: [u8; 32],
    /// The HMAC-SHA256 key.
    pub mac_key: [u8; 32],
}

impl Keys {
    /// Derive the record-layer keys from the raw Diffie-Hellman shared secret.
    ///
    /// `key = SHA-256(shared_secret)`, `mac_key = SHA-256(shared_secret ‖ 0x01)`.
    pub fn derive(shared_secret: &[u8]) -> Self {
        let encryption_key = Sha256::digest(shared_secret).into();

        let mac_key = {
            let mut hasher = Sha256::new();
            hasher.update(shared_secret);
            hasher.update([0x01]);
            hasher.finalize().into()
        };

        Self {
            encryption_key,
            mac_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_and_mac_keys_differ() {
        let keys = Keys::derive(b"some shared secret");

        assert_ne!(keys.encryption_key, keys.mac_key);
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = Keys::derive(b"shared");
        let b = Keys::derive(b"shared");

        assert_eq!(a.encryption_key, b.encryption_key);
        assert_eq!(a.mac_key, b.mac_key);
    }
}
