use crate::common::utils::{ZeroizingVec, b64};
use crate::data::{Algorithm, KeyType, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub(crate) const DEPRECATED: &str = "deprecated";
pub(crate) const REPLACED_BY: &str = "replaced_by";
pub(crate) const SALT: &str = "salt";

/// 密钥的公开描述信息，不含任何密钥字节
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub key_id: String,
    pub key_type: KeyType,
    pub algorithm: Algorithm,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub max_usage: Option<u64>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl KeyInfo {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_deprecated(&self) -> bool {
        self.metadata
            .get(DEPRECATED)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn replaced_by(&self) -> Option<&str> {
        self.metadata.get(REPLACED_BY).and_then(|v| v.as_str())
    }
}

/// 主密钥包装后的密钥字节（AES-256-GCM，密钥 ID 作为附加认证数据）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WrappedKey {
    #[serde(with = "b64")]
    pub iv: Vec<u8>,
    #[serde(with = "b64")]
    pub tag: Vec<u8>,
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

/// 注册表条目，也是交给 `KeyStore` 持久化的唯一形式
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredKey {
    pub info: KeyInfo,
    pub wrapped: WrappedKey,
}

/// 解包后的密钥，只在一次操作的调用栈内存在
///
/// 离开作用域时密钥字节被清零；`Debug` 输出不含密钥字节。
pub struct EncryptionKey {
    info: KeyInfo,
    material: ZeroizingVec,
}

impl EncryptionKey {
    pub(crate) fn new(info: KeyInfo, material: ZeroizingVec) -> Self {
        Self { info, material }
    }

    pub fn info(&self) -> &KeyInfo {
        &self.info
    }

    pub fn key_id(&self) -> &str {
        &self.info.key_id
    }

    pub fn key_type(&self) -> KeyType {
        self.info.key_type
    }

    pub fn algorithm(&self) -> Algorithm {
        self.info.algorithm
    }

    pub fn material(&self) -> &[u8] {
        &self.material
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("info", &self.info)
            .field("material", &"[REDACTED]")
            .finish()
    }
}
