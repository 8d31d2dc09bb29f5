//! 主密钥：包装注册表中的所有密钥字节。
use crate::common::errors::{CryptoError, Result};
use crate::common::utils::ZeroizingVec;
use crate::data::CipherView;
use crate::keys::record::WrappedKey;
use crate::symmetric::systems::AesGcmSystem;
use crate::symmetric::traits::SymmetricCryptographicSystem;
use rand_core::{OsRng, TryRngCore};
use secrecy::{ExposeSecret, SecretBox};

#[cfg(feature = "secure-storage")]
use secrecy::SecretString;

const MASTER_KEY_SIZE: usize = 32;

/// 只存在于进程内存中的根密钥，丢弃时清零
pub struct MasterKey {
    key: SecretBox<[u8; MASTER_KEY_SIZE]>,
}

impl MasterKey {
    /// 生成一个新的随机主密钥
    pub fn generate() -> Result<Self> {
        let mut key = Box::new([0u8; MASTER_KEY_SIZE]);
        OsRng.try_fill_bytes(key.as_mut())?;
        Ok(Self {
            key: SecretBox::new(key),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MASTER_KEY_SIZE {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "master key must be {} bytes, got {}",
                MASTER_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = Box::new([0u8; MASTER_KEY_SIZE]);
        key.copy_from_slice(bytes);
        Ok(Self {
            key: SecretBox::new(key),
        })
    }

    /// 使用 Argon2id 从口令派生主密钥
    #[cfg(feature = "secure-storage")]
    pub fn from_passphrase(passphrase: &SecretString, salt: &[u8]) -> Result<Self> {
        let mut key = Box::new([0u8; MASTER_KEY_SIZE]);
        argon2::Argon2::default()
            .hash_password_into(passphrase.expose_secret().as_bytes(), salt, key.as_mut())
            .map_err(|e| CryptoError::InvalidInput(format!("master key derivation failed: {}", e)))?;
        Ok(Self {
            key: SecretBox::new(key),
        })
    }

    /// 包装密钥字节，密钥 ID 作为附加认证数据，防止记录被挪用到其他 ID 下
    pub(crate) fn wrap(&self, key_id: &str, material: &[u8]) -> Result<WrappedKey> {
        let parts = AesGcmSystem::encrypt(
            self.key.expose_secret(),
            material,
            Some(key_id.as_bytes()),
        )?;
        match (parts.iv, parts.tag) {
            (Some(iv), Some(tag)) => Ok(WrappedKey {
                iv,
                tag,
                ciphertext: parts.ciphertext,
            }),
            _ => Err(CryptoError::InvalidKeyMaterial(
                "master key wrap produced no iv/tag".to_string(),
            )),
        }
    }

    pub(crate) fn unwrap(&self, key_id: &str, wrapped: &WrappedKey) -> Result<ZeroizingVec> {
        let view = CipherView {
            ciphertext: &wrapped.ciphertext,
            iv: Some(&wrapped.iv),
            nonce: None,
            tag: Some(&wrapped.tag),
        };
        AesGcmSystem::decrypt(self.key.expose_secret(), &view, Some(key_id.as_bytes()))
            .map(ZeroizingVec)
            .map_err(|_| {
                CryptoError::InvalidKeyMaterial(format!("key {} could not be unwrapped", key_id))
            })
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}
