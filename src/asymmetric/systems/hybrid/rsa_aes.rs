//! RSA + AES-256-GCM 信封加密
//!
//! 每条消息生成新的 32 字节 AES 密钥，载荷用 AES-256-GCM 加密，
//! AES 密钥用接收方公钥做 RSA-OAEP 加密。密文布局：
//!
//! ```text
//! [4 字节大端长度 L][L 字节 RSA 加密的 AES 密钥][AES-GCM 密文]
//! ```
//!
//! 内层 AES 步骤产生的 IV 与标签放在外层 `EncryptedData` 的 `iv`/`tag` 字段。

use crate::asymmetric::systems::traditional::rsa::{
    generate_keypair, oaep_decrypt, oaep_encrypt, parse_private_key, parse_public_key,
};
use crate::asymmetric::traits::AsymmetricCryptographicSystem;
use crate::common::config::CryptoConfig;
use crate::common::errors::{CryptoError, Result};
use crate::common::utils::{ZeroizingVec, random_key_32};
use crate::data::{Algorithm, CipherParts, CipherView};
use crate::symmetric::systems::AesGcmSystem;
use crate::symmetric::traits::SymmetricCryptographicSystem;
use zeroize::Zeroizing;

const LENGTH_PREFIX: usize = 4;

/// 拆分信封密文，返回 (RSA 加密的密钥段, AES 密文段)
pub fn split_envelope(ciphertext: &[u8]) -> Result<(&[u8], &[u8])> {
    if ciphertext.len() < LENGTH_PREFIX {
        return Err(CryptoError::MalformedCiphertext(
            "envelope is too short to contain length prefix".to_string(),
        ));
    }
    let (len_slice, rest) = ciphertext.split_at(LENGTH_PREFIX);
    let mut len_bytes = [0u8; LENGTH_PREFIX];
    len_bytes.copy_from_slice(len_slice);
    let key_len = u32::from_be_bytes(len_bytes) as usize;

    if rest.len() < key_len {
        return Err(CryptoError::MalformedCiphertext(
            "envelope length prefix exceeds payload".to_string(),
        ));
    }
    Ok(rest.split_at(key_len))
}

pub struct HybridRsaAesSystem;

impl AsymmetricCryptographicSystem for HybridRsaAesSystem {
    const ALGORITHM: Algorithm = Algorithm::HybridRsaAes;

    fn generate_keypair(config: &CryptoConfig) -> Result<(String, ZeroizingVec)> {
        generate_keypair(config.rsa_key_bits)
    }

    fn encrypt(
        public_key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts> {
        let public_key = parse_public_key(public_key)?;
        let data_key = random_key_32()?;

        let inner = AesGcmSystem::encrypt(data_key.as_ref(), plaintext, additional_data)?;
        let wrapped_key = oaep_encrypt(&public_key, data_key.as_ref())?;

        let mut envelope =
            Vec::with_capacity(LENGTH_PREFIX + wrapped_key.len() + inner.ciphertext.len());
        envelope.extend_from_slice(&(wrapped_key.len() as u32).to_be_bytes());
        envelope.extend_from_slice(&wrapped_key);
        envelope.extend_from_slice(&inner.ciphertext);

        Ok(CipherParts {
            ciphertext: envelope,
            iv: inner.iv,
            nonce: None,
            tag: inner.tag,
        })
    }

    fn decrypt(
        private_key: &[u8],
        input: &CipherView<'_>,
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let (wrapped_key, body) = split_envelope(input.ciphertext)?;
        let private_key = parse_private_key(private_key)?;
        let data_key = Zeroizing::new(oaep_decrypt(&private_key, wrapped_key, Self::ALGORITHM)?);

        let inner = CipherView {
            ciphertext: body,
            iv: input.iv,
            nonce: None,
            tag: input.tag,
        };
        AesGcmSystem::decrypt(&data_key, &inner, additional_data)
            .map_err(|e| match e {
                CryptoError::DecryptionAuthenticationFailure { .. } => {
                    CryptoError::auth_failure(Self::ALGORITHM)
                }
                other => other,
            })
    }
}
