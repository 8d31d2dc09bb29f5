//! NaCl secretbox (XSalsa20-Poly1305)
//!
//! 库生成的 24 字节 nonce 前置于密文，整体作为一个认证单元。
use crate::common::errors::{CryptoError, Result};
use crate::data::{Algorithm, CipherParts, CipherView};
use crate::symmetric::traits::SymmetricCryptographicSystem;
use crypto_secretbox::aead::{Aead, AeadCore, KeyInit, OsRng};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};

const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;

#[derive(Debug)]
pub struct SecretBoxSystem;

impl SymmetricCryptographicSystem for SecretBoxSystem {
    const ALGORITHM: Algorithm = Algorithm::NaclSecretbox;
    const KEY_SIZE: usize = 32;

    fn encrypt(
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts> {
        Self::check_key(key)?;
        Self::reject_aad(additional_data)?;
        let cipher = XSalsa20Poly1305::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyMaterial("bad secretbox key".to_string()))?;
        let nonce = XSalsa20Poly1305::generate_nonce(&mut OsRng);

        let sealed = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::InvalidInput("secretbox encryption failed".to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + sealed.len());
        combined.extend_from_slice(nonce.as_slice());
        combined.extend_from_slice(&sealed);
        Ok(CipherParts::opaque(combined))
    }

    fn decrypt(
        key: &[u8],
        input: &CipherView<'_>,
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        Self::check_key(key)?;
        Self::reject_aad(additional_data)?;
        if input.ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::MalformedCiphertext(
                "secretbox ciphertext is too short".to_string(),
            ));
        }
        let (nonce, sealed) = input.ciphertext.split_at(NONCE_SIZE);
        let cipher = XSalsa20Poly1305::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyMaterial("bad secretbox key".to_string()))?;

        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::auth_failure(Self::ALGORITHM))
    }
}
