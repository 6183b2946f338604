//! The record layer: AES-256-CBC encryption with an encrypt-then-MAC
//! HMAC-SHA256 integrity tag, exactly as fixed by the protocol (no
//! negotiation, no alternate ciphers).

use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use digest::Mac;
use hmac::Hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::crypto::Keys;
use crate::error::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Size of the per-frame initialization vector, in bytes.
pub const IV_SIZE: usize = 16;
/// Size of the HMAC-SHA256 tag, in bytes.
pub const TAG_SIZE: usize = 32;

/// Encrypt `plaintext` under `keys`, returning `iv ‖ ciphertext ‖ tag`.
pub fn seal(plaintext: &[u8], keys: &Keys, rng: &mut impl RngCore) -> Vec<u8> {
    let mut iv = [0u8; IV_SIZE];
    rng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(&keys.encryption_key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let tag = mac_over(&iv, &ciphertext, &keys.mac_key);

    let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len() + TAG_SIZE);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out.extend_from_slice(&tag);

    out
}

/// Verify and decrypt a `iv ‖ ciphertext ‖ tag` record produced by [`seal`].
///
/// HMAC verification strictly precedes decryption: a tampered record never
/// reaches the cipher.
pub fn open(record: &[u8], keys: &Keys) -> Result<Vec<u8>> {
    if record.len() < IV_SIZE + TAG_SIZE {
        return Err(Error::FramingError(
            "encrypted record shorter than iv + tag".into(),
        ));
    }

    let (iv, rest) = record.split_at(IV_SIZE);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_SIZE);

    verify(iv, ciphertext, tag, &keys.mac_key)?;

    Aes256CbcDec::new(&keys.encryption_key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::IntegrityFailure)
}

fn mac_over(iv: &[u8], ciphertext: &[u8], mac_key: &[u8; 32]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(mac_key).expect("HMAC accepts any key length");
    mac.update(iv);
    mac.update(ciphertext);

    mac.finalize().into_bytes().to_vec()
}

fn verify(iv: &[u8], ciphertext: &[u8], tag: &[u8], mac_key: &[u8; 32]) -> Result<()> {
    let mut mac = HmacSha256::new_from_slice(mac_key).expect("HMAC accepts any key length");
    mac.update(iv);
    mac.update(ciphertext);

    mac.verify_slice(tag).map_err(|_| Error::IntegrityFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Keys {
        Keys::derive(b"a shared secret for tests")
    }

    #[test]
    fn round_trips_plaintext() {
        let keys = keys();
        let mut rng = rand::thread_rng();

        let record = seal(b"the quick brown fox", &keys, &mut rng);
        let recovered = open(&record, &keys).unwrap();

        assert_eq!(recovered, b"the quick brown fox");
    }

    #[test]
    fn round_trips_empty_plaintext() {
        let keys = keys();
        let mut rng = rand::thread_rng();

        let record = seal(b"", &keys, &mut rng);
        let recovered = open(&record, &keys).unwrap();

        assert!(recovered.is_empty());
    }

    #[test]
    fn tampered_ciphertext_fails_integrity_before_decryption() {
        let keys = keys();
        let mut rng = rand::thread_rng();

        let mut record = seal(b"authenticated data", &keys, &mut rng);
        let last = record.len() - TAG_SIZE - 1;
        record[last] ^= 0xff;

        assert!(matches!(open(&record, &keys), Err(Error::IntegrityFailure)));
    }

    #[test]
    fn tampered_tag_fails_integrity() {
        let keys = keys();
        let mut rng = rand::thread_rng();

        let mut record = seal(b"authenticated data", &keys, &mut rng);
        let last = record.len() - 1;
        record[last] ^= 0xff;

        assert!(matches!(open(&record, &keys), Err(Error::IntegrityFailure)));
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let keys = keys();
        let other_keys = Keys::derive(b"a different shared secret");
        let mut rng = rand::thread_rng();

        let record = seal(b"authenticated data", &keys, &mut rng);

        assert!(matches!(
            open(&record, &other_keys),
            Err(Error::IntegrityFailure)
        ));
    }

    #[test]
    fn fresh_iv_per_call() {
        let keys = keys();
        let mut rng = rand::thread_rng();

        let a = seal(b"same plaintext", &keys, &mut rng);
        let b = seal(b"same plaintext", &keys, &mut rng);

        assert_ne!(&a[..IV_SIZE], &b[..IV_SIZE]);
    }
}
