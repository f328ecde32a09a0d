//! AES-256-GCM with counter nonces
//!
//! Key size: 32 bytes.  Nonce: 12 bytes.  Tag: 16 bytes (appended).
//!
//! Nonce layout:
//!   [ 0 0 0 0 | counter as big-endian u64 ]
//!
//! The caller owns the counter. A (key, counter) pair must never be used twice.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};

use crate::error::{NoiseError, Result};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

pub fn nonce(counter: u64) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[4..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

pub fn seal(key: &[u8; KEY_LEN], counter: u64, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| NoiseError::Encrypt)?;
    let nonce = nonce(counter);
    cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| NoiseError::Encrypt)
}

pub fn open(key: &[u8; KEY_LEN], counter: u64, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_LEN {
        return Err(NoiseError::AuthenticationFailed);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| NoiseError::AuthenticationFailed)?;
    let nonce = nonce(counter);
    cipher
        .decrypt(Nonce::from_slice(&nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| NoiseError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_is_right_justified_big_endian() {
        assert_eq!(nonce(0), [0u8; 12]);
        assert_eq!(nonce(1), [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(
            nonce(0x0102_0304_0506_0708),
            [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = [7u8; 32];
        let ct = seal(&key, 3, b"aad", b"hello").unwrap();
        assert_eq!(ct.len(), 5 + TAG_LEN);
        assert_eq!(open(&key, 3, b"aad", &ct).unwrap(), b"hello");
    }

    #[test]
    fn wrong_counter_or_aad_fails() {
        let key = [7u8; 32];
        let ct = seal(&key, 3, b"aad", b"hello").unwrap();
        assert!(matches!(open(&key, 4, b"aad", &ct), Err(NoiseError::AuthenticationFailed)));
        assert!(matches!(open(&key, 3, b"dda", &ct), Err(NoiseError::AuthenticationFailed)));
        assert!(matches!(open(&key, 3, b"aad", &ct[..4]), Err(NoiseError::AuthenticationFailed)));
    }
}
