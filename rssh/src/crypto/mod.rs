//! Key-agreement, key derivation and host/user RSA key handling.

pub mod dh;
pub mod kdf;
pub mod rsa_keys;

pub use dh::KeyPair as DhKeyPair;
pub use kdf::Keys;
