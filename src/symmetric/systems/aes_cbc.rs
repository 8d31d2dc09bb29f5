//! AES-256-CBC 对称加密实现
//!
//! 随机 16 字节 IV，PKCS#7 填充到 128 位分组。
//! 该模式不提供完整性保护：被篡改的密文可能解出错误明文而不报错。
use crate::common::errors::{CryptoError, Result};
use crate::common::utils::random_bytes;
use crate::data::{Algorithm, CipherParts, CipherView};
use crate::symmetric::traits::SymmetricCryptographicSystem;
use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const IV_SIZE: usize = 16;

#[derive(Debug)]
pub struct AesCbcSystem;

impl SymmetricCryptographicSystem for AesCbcSystem {
    const ALGORITHM: Algorithm = Algorithm::Aes256Cbc;
    const KEY_SIZE: usize = 32;

    fn encrypt(
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts> {
        Self::check_key(key)?;
        Self::reject_aad(additional_data)?;
        let iv = random_bytes(IV_SIZE)?;

        let ciphertext = Aes256CbcEnc::new_from_slices(key, &iv)
            .map_err(|_| CryptoError::InvalidKeyMaterial("bad AES-256-CBC key/iv".to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        Ok(CipherParts {
            ciphertext,
            iv: Some(iv),
            nonce: None,
            tag: None,
        })
    }

    fn decrypt(
        key: &[u8],
        input: &CipherView<'_>,
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        Self::check_key(key)?;
        Self::reject_aad(additional_data)?;
        let iv = input.require_iv(IV_SIZE)?;

        Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidKeyMaterial("bad AES-256-CBC key/iv".to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(input.ciphertext)
            .map_err(|_| CryptoError::MalformedCiphertext("CBC decryption failed".to_string()))
    }
}
