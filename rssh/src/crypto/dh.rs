//! Diffie-Hellman key-agreement over the fixed RFC 3526 group 14 MODP group.
//!
//! The suite is not negotiated: every session performs the same 2048-bit
//! modular-exponentiation group with generator `2`, matching the "fixed
//! suite" non-goal of the wider protocol.

use rand::RngCore;
use rsa::BigUint;

/// The 2048-bit MODP group 14 prime, as specified by RFC 3526 §3.
const GROUP14_PRIME_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD",
    "129024E088A67CC74020BBEA63B139B22514A08798E3404",
    "DDEF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C",
    "245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406",
    "B7EDEE386BFB5A899FA5AE9F24117C4B1FE649286651ECE",
    "45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8FD",
    "24CF5F83655D23DCA3AD961C62F356208552BB9ED529077",
    "096966D670C354E4ABC9804F1746C08CA18217C32905E46",
    "2E36CE3BE39E772C180E86039B2783A2EC07A28FB5C55DF",
    "06F4C52C9DE2BCBF6955817183995497CEA956AE515D226",
    "1898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

/// The generator for the group 14 MODP group.
const GENERATOR: u64 = 2;

fn prime() -> BigUint {
    BigUint::parse_bytes(GROUP14_PRIME_HEX.as_bytes(), 16)
        .expect("group 14 prime is a fixed, valid hex literal")
}

/// A Diffie-Hellman keypair for one handshake.
///
/// The private exponent is drawn uniformly from `[2, p-2]` and is never
/// reused across handshakes: a fresh [`KeyPair`] is generated per connection.
pub struct KeyPair {
    private: BigUint,
    public: BigUint,
}

impl KeyPair {
    /// Generate a fresh keypair using the provided CSPRNG.
    pub fn generate(rng: &mut impl RngCore) -> Self {
        let p = prime();
        // Reducing modulo (p-3) and shifting by 2 yields a uniform value in [2, p-2].
        let modulus = &p - BigUint::from(3u32);

        let mut buf = vec![0u8; (p.bits() as usize).div_ceil(8)];
        rng.fill_bytes(&mut buf);
        let private = BigUint::from_bytes_be(&buf) % &modulus + BigUint::from(2u32);

        let public = BigUint::from(GENERATOR).modpow(&private, &p);

        Self { private, public }
    }

    /// The public value `g^x mod p`, as raw big-endian bytes.
    pub fn public_bytes(&self) -> Vec<u8> {
        self.public.to_bytes_be()
    }

    /// Compute the shared secret `their_pub^x mod p`, as raw big-endian bytes
    /// with any leading zero byte stripped.
    pub fn compute_shared(&self, their_public: &[u8]) -> Vec<u8> {
        let p = prime();
        let their_public = BigUint::from_bytes_be(their_public);

        let shared = their_public.modpow(&self.private, &p);
        let mut bytes = shared.to_bytes_be();

        while bytes.first() == Some(&0) && bytes.len() > 1 {
            bytes.remove(0);
        }

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypairs_agree_on_a_shared_secret() {
        let mut rng = rand::thread_rng();

        let client = KeyPair::generate(&mut rng);
        let server = KeyPair::generate(&mut rng);

        let client_shared = client.compute_shared(&server.public_bytes());
        let server_shared = server.compute_shared(&client.public_bytes());

        assert_eq!(client_shared, server_shared);
    }

    #[test]
    fn public_values_are_smaller_than_the_prime() {
        let mut rng = rand::thread_rng();
        let pair = KeyPair::generate(&mut rng);

        assert!(BigUint::from_bytes_be(&pair.public_bytes()) < prime());
    }
}
