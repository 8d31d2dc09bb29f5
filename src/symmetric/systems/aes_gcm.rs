//! AES-256-GCM 对称加密实现
use crate::common::errors::{CryptoError, Result};
use crate::data::{Algorithm, CipherParts, CipherView};
use crate::symmetric::traits::SymmetricCryptographicSystem;
use aes_gcm::aead::{AeadInPlace, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce, Tag};

const KEY_SIZE: usize = 32;
pub(crate) const NONCE_SIZE: usize = 12;
pub(crate) const TAG_SIZE: usize = 16; // AES-GCM's tag is 16 bytes

/// AES-256-GCM 对称加密系统
///
/// 每次调用生成随机的 12 字节 IV，认证标签单独返回。
#[derive(Debug)]
pub struct AesGcmSystem;

impl SymmetricCryptographicSystem for AesGcmSystem {
    const ALGORITHM: Algorithm = Algorithm::Aes256Gcm;
    const KEY_SIZE: usize = KEY_SIZE;

    fn encrypt(
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts> {
        Self::check_key(key)?;
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyMaterial("bad AES-256 key".to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(&nonce, additional_data.unwrap_or(&[]), &mut buffer)
            .map_err(|_| CryptoError::InvalidInput("AES-GCM encryption failed".to_string()))?;

        Ok(CipherParts {
            ciphertext: buffer,
            iv: Some(nonce.to_vec()),
            nonce: None,
            tag: Some(tag.to_vec()),
        })
    }

    fn decrypt(
        key: &[u8],
        input: &CipherView<'_>,
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        Self::check_key(key)?;
        let iv = input.require_iv(NONCE_SIZE)?;
        let tag = input.require_tag(TAG_SIZE)?;
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyMaterial("bad AES-256 key".to_string()))?;

        let mut buffer = input.ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(iv),
                additional_data.unwrap_or(&[]),
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| CryptoError::auth_failure(Self::ALGORITHM))?;

        Ok(buffer)
    }
}
