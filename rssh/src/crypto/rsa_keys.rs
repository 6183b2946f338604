//! RSA host-key and user-key loading, signing and verification.
//!
//! Keys are persisted as the base64 encoding of their DER representation:
//! SPKI for public keys, PKCS#8 for private keys. There is no PEM framing,
//! matching the wire format used for `server_rsa_pub` in `KEX_REPLY`.

use base64::Engine as _;
use rsa::{
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;
use signature::{SignatureEncoding, Signer, Verifier};

use crate::error::Result;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Generate a fresh 2048-bit RSA host keypair.
pub fn generate(rng: &mut (impl rand::RngCore + rand::CryptoRng)) -> Result<RsaPrivateKey> {
    Ok(RsaPrivateKey::new(rng, 2048)?)
}

/// Encode a public key as base64 of its SPKI DER representation.
pub fn encode_public(key: &RsaPublicKey) -> Result<String> {
    let der = key.to_public_key_der()?;

    Ok(BASE64.encode(der.as_bytes()))
}

/// Decode a public key from base64 of its SPKI DER representation.
pub fn decode_public(encoded: &str) -> Result<RsaPublicKey> {
    let der = BASE64.decode(encoded)?;

    Ok(RsaPublicKey::from_public_key_der(&der)?)
}

/// Encode a private key as base64 of its PKCS#8 DER representation.
pub fn encode_private(key: &RsaPrivateKey) -> Result<String> {
    let der = key.to_pkcs8_der()?;

    Ok(BASE64.encode(der.as_bytes()))
}

/// Decode a private key from base64 of its PKCS#8 DER representation.
pub fn decode_private(encoded: &str) -> Result<RsaPrivateKey> {
    let der = BASE64.decode(encoded)?;

    Ok(RsaPrivateKey::from_pkcs8_der(&der)?)
}

/// Load a public key from a file on disk.
pub fn load_public(path: impl AsRef<std::path::Path>) -> Result<RsaPublicKey> {
    decode_public(std::fs::read_to_string(path)?.trim())
}

/// Load a private key from a file on disk.
pub fn load_private(path: impl AsRef<std::path::Path>) -> Result<RsaPrivateKey> {
    decode_private(std::fs::read_to_string(path)?.trim())
}

/// Save a public key to a file on disk.
pub fn save_public(path: impl AsRef<std::path::Path>, key: &RsaPublicKey) -> Result<()> {
    Ok(std::fs::write(path, encode_public(key)?)?)
}

/// Save a private key to a file on disk.
pub fn save_private(path: impl AsRef<std::path::Path>, key: &RsaPrivateKey) -> Result<()> {
    Ok(std::fs::write(path, encode_private(key)?)?)
}

/// Sign `data` with RSA-PKCS#1 v1.5 over SHA-256.
pub fn sign(data: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let signing_key = SigningKey::<Sha256>::new(key.clone());
    let signature: Signature = signing_key.try_sign(data)?;

    Ok(signature.to_vec())
}

/// Verify an RSA-PKCS#1 v1.5/SHA-256 `signature` over `data` against `key`.
pub fn verify(data: &[u8], signature: &[u8], key: &RsaPublicKey) -> Result<()> {
    let verifying_key = VerifyingKey::<Sha256>::new(key.clone());
    let signature = Signature::try_from(signature).map_err(|_| signature::Error::new())?;

    verifying_key.verify(data, &signature)?;

    Ok(())
}
