//! Fernet 令牌
//!
//! 输出单个不透明的认证令牌（AES-128-CBC + HMAC-SHA256），不向调用方暴露 IV 或标签。
//! 密钥以 32 字节原始形式保存，交给 `fernet` 时再编码为 URL-safe base64。
use crate::common::errors::{CryptoError, Result};
use crate::common::utils::ZeroizingVec;
use crate::data::{Algorithm, CipherParts, CipherView};
use crate::symmetric::traits::SymmetricCryptographicSystem;
use base64::{Engine, engine::general_purpose::URL_SAFE};
use fernet::Fernet;
use zeroize::Zeroizing;

#[derive(Debug)]
pub struct FernetSystem;

impl FernetSystem {
    fn cipher(key: &[u8]) -> Result<Fernet> {
        Self::check_key(key)?;
        let encoded = Zeroizing::new(URL_SAFE.encode(key));
        Fernet::new(&encoded)
            .ok_or_else(|| CryptoError::InvalidKeyMaterial("bad Fernet key".to_string()))
    }
}

impl SymmetricCryptographicSystem for FernetSystem {
    const ALGORITHM: Algorithm = Algorithm::Fernet;
    const KEY_SIZE: usize = 32;

    fn generate_key() -> Result<ZeroizingVec> {
        let encoded = Zeroizing::new(Fernet::generate_key());
        let raw = URL_SAFE.decode(encoded.as_bytes())?;
        Ok(ZeroizingVec(raw))
    }

    fn encrypt(
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts> {
        Self::reject_aad(additional_data)?;
        let token = Self::cipher(key)?.encrypt(plaintext);
        Ok(CipherParts::opaque(token.into_bytes()))
    }

    fn decrypt(
        key: &[u8],
        input: &CipherView<'_>,
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        Self::reject_aad(additional_data)?;
        let fernet = Self::cipher(key)?;
        let token = std::str::from_utf8(input.ciphertext)
            .map_err(|_| CryptoError::auth_failure(Self::ALGORITHM))?;
        fernet
            .decrypt(token)
            .map_err(|_| CryptoError::auth_failure(Self::ALGORITHM))
    }
}
