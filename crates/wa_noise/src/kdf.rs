//! HKDF-SHA256 extract + expand into 64 bytes, split as two 32-byte halves.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{NoiseError, Result};

pub const OKM_LEN: usize = 64;

/// `HKDF(salt, ikm, info = "")` → 64 bytes.
pub fn extract_and_expand(salt: &[u8; 32], ikm: &[u8]) -> Result<Zeroizing<[u8; OKM_LEN]>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new([0u8; OKM_LEN]);
    hk.expand(&[], okm.as_mut())
        .map_err(|e| NoiseError::KeyDerivation(e.to_string()))?;
    Ok(okm)
}

/// Split 64 bytes of key material into `([0..32], [32..64])`.
pub fn split(okm: &[u8; OKM_LEN]) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let mut first = Zeroizing::new([0u8; 32]);
    let mut second = Zeroizing::new([0u8; 32]);
    first.copy_from_slice(&okm[..32]);
    second.copy_from_slice(&okm[32..]);
    (first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    // HKDF with empty info is HMAC(salt, ikm) followed by two HMAC blocks.
    #[test]
    fn matches_manual_hmac_construction() {
        use hkdf::hmac::{Hmac, Mac};

        let salt = [0x42u8; 32];
        let ikm = b"shared secret";
        let okm = extract_and_expand(&salt, ikm).unwrap();

        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&salt).unwrap();
        mac.update(ikm);
        let prk = mac.finalize().into_bytes();

        let mut t1 = <Hmac<Sha256> as Mac>::new_from_slice(&prk).unwrap();
        t1.update(&[1]);
        let t1 = t1.finalize().into_bytes();
        let mut t2 = <Hmac<Sha256> as Mac>::new_from_slice(&prk).unwrap();
        t2.update(&t1);
        t2.update(&[2]);
        let t2 = t2.finalize().into_bytes();

        assert_eq!(&okm[..32], t1.as_slice());
        assert_eq!(&okm[32..], t2.as_slice());
    }

    #[test]
    fn split_halves() {
        let mut okm = [0u8; 64];
        okm[..32].fill(1);
        okm[32..].fill(2);
        let (a, b) = split(&okm);
        assert_eq!(*a, [1u8; 32]);
        assert_eq!(*b, [2u8; 32]);
    }
}
