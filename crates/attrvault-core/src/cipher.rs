//! AES-256-CBC primitive and secure randomness.
//!
//! CBC with PKCS7 padding carries no authentication tag; the unpad check on
//! decrypt is the engine's primary integrity signal and is surfaced as
//! [`VaultError::Decryption`].

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Result, VaultError};
use crate::kdf::{IV_LEN, KEY_LEN};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encrypt plaintext with AES-256-CBC/PKCS7.
pub fn encrypt(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt AES-256-CBC/PKCS7 ciphertext.
///
/// A padding failure means a wrong key, tampered ciphertext, or an IV/salt
/// mismatch; the cipher mode cannot distinguish between them.
pub fn decrypt(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % IV_LEN != 0 {
        return Err(VaultError::Decryption(format!(
            "ciphertext length {} is not a positive multiple of the block size",
            ciphertext.len()
        )));
    }

    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| {
            VaultError::Decryption(
                "padding check failed (wrong key, tampered ciphertext, or IV/salt mismatch)"
                    .to_string(),
            )
        })
}

/// Generate a fresh random IV from the OS CSPRNG.
pub fn random_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Generate `len` fresh random salt bytes from the OS CSPRNG.
pub fn random_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";
    const IV: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

    #[test]
    fn test_encrypt_known_vector() {
        let ct = encrypt(KEY, &IV, b"hello");
        // Cross-checked against OpenSSL AES-256-CBC with the same key/IV.
        assert_eq!(base64_encode(&ct), "MYNSl5uYV6V9tOH5RSXtDA==");
    }

    #[test]
    fn test_round_trip() {
        let ct = encrypt(KEY, &IV, b"attribute plaintext, longer than one block");
        let pt = decrypt(KEY, &IV, &ct).unwrap();
        assert_eq!(pt, b"attribute plaintext, longer than one block");
    }

    #[test]
    fn test_wrong_key_fails() {
        let ct = encrypt(KEY, &IV, b"hello");
        let wrong: [u8; 32] = *b"fedcba9876543210fedcba9876543210";
        assert!(matches!(
            decrypt(&wrong, &IV, &ct),
            Err(VaultError::Decryption(_))
        ));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let ct = encrypt(KEY, &IV, b"hello");
        assert!(decrypt(KEY, &IV, &ct[..15]).is_err());
        assert!(decrypt(KEY, &IV, b"").is_err());
    }

    #[test]
    fn test_random_iv_unique() {
        assert_ne!(random_iv(), random_iv());
        assert_ne!(random_salt(8), random_salt(8));
    }

    fn base64_encode(bytes: &[u8]) -> String {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        STANDARD.encode(bytes)
    }
}
