//! X25519 key pairs for the handshake (RFC 7748).

use std::fmt;

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::{NoiseError, Result};

pub const PUBLIC_KEY_LEN: usize = 32;

/// An X25519 key pair. Used both for the long-lived static identity and for
/// the per-connection ephemeral key.
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self::from_secret(StaticSecret::from(bytes))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.public.to_bytes()
    }

    /// Secret scalar, for persisting a static identity.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// X25519 with a peer public key. Low-order peer keys are rejected.
    pub(crate) fn agree(&self, peer: &[u8; PUBLIC_KEY_LEN]) -> Result<Zeroizing<[u8; 32]>> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*peer));
        if !shared.was_contributory() {
            return Err(NoiseError::WeakSharedSecret);
        }
        Ok(Zeroizing::new(shared.to_bytes()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .finish_non_exhaustive()
    }
}

pub(crate) fn public_key(bytes: &[u8], what: &str) -> Result<[u8; PUBLIC_KEY_LEN]> {
    bytes.try_into().map_err(|_| {
        NoiseError::InvalidKey(format!("{what}: expected {PUBLIC_KEY_LEN} bytes, got {}", bytes.len()))
    })
}
