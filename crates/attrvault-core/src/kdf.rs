//! Key-stretching primitives.
//!
//! Both functions here are frozen wire contracts: values encrypted under an
//! older engine configuration must keep decrypting byte-for-byte, so the
//! iteration counts and digest choices below must never change. A stronger
//! derivation belongs in a new [`Mode`](crate::config::Mode), not here.

use md5::{Digest, Md5};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use zeroize::Zeroizing;

/// PBKDF2-HMAC-SHA1 iteration count used to mix a salt into a key.
///
/// Historical default of the original engine; all persisted salted
/// ciphertexts were produced with this count.
pub const PBKDF2_ITERATIONS: u32 = 2000;

/// Digest rounds for [`bytes_to_key_iv`] (OpenSSL `EVP_BytesToKey` default).
pub const BYTES_TO_KEY_ROUNDS: u32 = 2048;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// AES block / CBC IV length in bytes.
pub const IV_LEN: usize = 16;

/// Mix a salt into key material with PBKDF2-HMAC-SHA1.
///
/// Returns a 32-byte AES-256 key. The low iteration count is deliberate:
/// it matches the derivation every already-persisted value used.
pub fn mix_salt_into_key(key: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha1>(key, salt, PBKDF2_ITERATIONS, out.as_mut());
    out
}

/// Derive a key and IV from a password using the OpenSSL `EVP_BytesToKey`
/// construction (MD5, no salt, [`BYTES_TO_KEY_ROUNDS`] rounds).
///
/// This is the implicit-IV derivation used when no IV is stored alongside
/// the ciphertext: the same password always yields the same key/IV pair.
pub fn bytes_to_key_iv(password: &[u8]) -> (Zeroizing<[u8; KEY_LEN]>, [u8; IV_LEN]) {
    let mut material = Zeroizing::new(Vec::with_capacity(KEY_LEN + IV_LEN));
    let mut block: Zeroizing<[u8; 16]> = Zeroizing::new([0u8; 16]);
    let mut first = true;

    while material.len() < KEY_LEN + IV_LEN {
        let mut hasher = Md5::new();
        if !first {
            hasher.update(block.as_ref());
        }
        hasher.update(password);
        block.copy_from_slice(&hasher.finalize());
        for _ in 1..BYTES_TO_KEY_ROUNDS {
            let digest = Md5::digest(block.as_ref());
            block.copy_from_slice(&digest);
        }
        material.extend_from_slice(block.as_ref());
        first = false;
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&material[..KEY_LEN]);
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&material[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_salt_into_key_vector() {
        // PBKDF2-HMAC-SHA1("0123456789abcdef0123456789abcdef", "saltsalt", 2000)
        let key = mix_salt_into_key(b"0123456789abcdef0123456789abcdef", b"saltsalt");
        assert_eq!(
            hex::encode(key.as_ref()),
            "2b5fa534f1b30c5b729cff5ad87a175c12050db9ab7ffa8a3688688ebadbbb12"
        );
    }

    #[test]
    fn test_bytes_to_key_iv_vector() {
        let (key, iv) = bytes_to_key_iv(b"my-static-secret");
        assert_eq!(
            hex::encode(key.as_ref()),
            "35c2eaeefdd95774c2397bb5fc153cd8c31919d5619784bb6fab83484311787e"
        );
        assert_eq!(hex::encode(iv), "55393ca829a46a49b386362d340b8aea");
    }

    #[test]
    fn test_bytes_to_key_iv_deterministic() {
        let (k1, iv1) = bytes_to_key_iv(b"password");
        let (k2, iv2) = bytes_to_key_iv(b"password");
        assert_eq!(k1.as_ref(), k2.as_ref());
        assert_eq!(iv1, iv2);

        let (k3, _) = bytes_to_key_iv(b"other-password");
        assert_ne!(k1.as_ref(), k3.as_ref());
    }
}
