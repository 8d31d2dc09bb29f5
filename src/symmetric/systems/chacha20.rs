//! ChaCha20-Poly1305 对称加密实现
//!
//! 约定与 AES-GCM 相同：12 字节随机 nonce，16 字节认证标签单独返回。
use crate::common::errors::{CryptoError, Result};
use crate::data::{Algorithm, CipherParts, CipherView};
use crate::symmetric::traits::SymmetricCryptographicSystem;
use chacha20poly1305::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Nonce, Tag};

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

#[derive(Debug)]
pub struct ChaCha20System;

impl SymmetricCryptographicSystem for ChaCha20System {
    const ALGORITHM: Algorithm = Algorithm::ChaCha20Poly1305;
    const KEY_SIZE: usize = 32;

    fn encrypt(
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts> {
        Self::check_key(key)?;
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyMaterial("bad ChaCha20 key".to_string()))?;
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(&nonce, additional_data.unwrap_or(&[]), &mut buffer)
            .map_err(|_| {
                CryptoError::InvalidInput("ChaCha20-Poly1305 encryption failed".to_string())
            })?;

        Ok(CipherParts {
            ciphertext: buffer,
            iv: None,
            nonce: Some(nonce.to_vec()),
            tag: Some(tag.to_vec()),
        })
    }

    fn decrypt(
        key: &[u8],
        input: &CipherView<'_>,
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        Self::check_key(key)?;
        let nonce = input.require_nonce(NONCE_SIZE)?;
        let tag = input.require_tag(TAG_SIZE)?;
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyMaterial("bad ChaCha20 key".to_string()))?;

        let mut buffer = input.ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce),
                additional_data.unwrap_or(&[]),
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| CryptoError::auth_failure(Self::ALGORITHM))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_with_aad() {
        let key = ChaCha20System::generate_key().unwrap();
        let parts = ChaCha20System::encrypt(&key, b"booking ref 42", Some(b"hdr")).unwrap();
        assert_eq!(parts.nonce.as_ref().unwrap().len(), NONCE_SIZE);
        assert_eq!(parts.tag.as_ref().unwrap().len(), TAG_SIZE);
        assert!(parts.iv.is_none());

        let plain = ChaCha20System::decrypt(&key, &parts.view(), Some(b"hdr")).unwrap();
        assert_eq!(plain, b"booking ref 42");
    }

    #[test]
    fn test_empty_plaintext() {
        let key = ChaCha20System::generate_key().unwrap();
        let parts = ChaCha20System::encrypt(&key, b"", None).unwrap();
        assert!(parts.ciphertext.is_empty());
        let plain = ChaCha20System::decrypt(&key, &parts.view(), None).unwrap();
        assert!(plain.is_empty());
    }

    #[test]
    fn test_tamper_detection() {
        let key = ChaCha20System::generate_key().unwrap();
        let parts = ChaCha20System::encrypt(&key, b"integrity matters", None).unwrap();

        for i in 0..parts.ciphertext.len() {
            let mut tampered = parts.clone();
            tampered.ciphertext[i] ^= 0x01;
            assert!(matches!(
                ChaCha20System::decrypt(&key, &tampered.view(), None),
                Err(CryptoError::DecryptionAuthenticationFailure { .. })
            ));
        }

        let mut tampered = parts.clone();
        if let Some(tag) = tampered.tag.as_mut() {
            tag[0] ^= 0x01;
        }
        assert!(matches!(
            ChaCha20System::decrypt(&key, &tampered.view(), None),
            Err(CryptoError::DecryptionAuthenticationFailure { .. })
        ));
    }
}
