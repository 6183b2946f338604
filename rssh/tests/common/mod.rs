use std::path::PathBuf;

use rssh::crypto::rsa_keys;
use rssh::session::trust::{hash_password, UserDirectory, UserRecord};
use rssh::session::{ClientConfig, ServerConfig};

/// A fresh RSA host keypair, persisted under a unique temp path per call so
/// concurrent tests never collide.
pub struct HostKeys {
    pub private_path: PathBuf,
    pub public_path: PathBuf,
}

impl HostKeys {
    pub fn generate() -> Self {
        let id = uuid::Uuid::new_v4();
        let private_path = std::env::temp_dir().join(format!("rssh-test-host-{id}.key"));
        let public_path = std::env::temp_dir().join(format!("rssh-test-host-{id}.pub"));

        let private = rsa_keys::generate(&mut rand::thread_rng()).unwrap();
        let public = rsa::RsaPublicKey::from(&private);

        rsa_keys::save_private(&private_path, &private).unwrap();
        rsa_keys::save_public(&public_path, &public).unwrap();

        Self {
            private_path,
            public_path,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(&self.private_path, &self.public_path)
    }
}

impl Drop for HostKeys {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.private_path);
        let _ = std::fs::remove_file(&self.public_path);
    }
}

/// A trust store file pinned to one particular host's public key.
pub struct PinnedTrustStore {
    pub path: PathBuf,
}

impl PinnedTrustStore {
    pub fn pinned_to(public_key_path: &std::path::Path) -> Self {
        let id = uuid::Uuid::new_v4();
        let path = std::env::temp_dir().join(format!("rssh-test-trust-{id}.pub"));
        std::fs::copy(public_key_path, &path).unwrap();
        Self { path }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.path)
    }
}

impl Drop for PinnedTrustStore {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// A single-account user directory, for exercising password authentication.
pub struct OneUser {
    username: String,
    record: UserRecord,
}

impl OneUser {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            record: UserRecord {
                password_hash: hash_password(password),
                authorized_keys: Vec::new(),
            },
        }
    }
}

impl UserDirectory for OneUser {
    fn lookup(&self, username: &str) -> Option<UserRecord> {
        (username == self.username).then(|| self.record.clone())
    }
}
