//! 算法标识、密钥类型与自描述的 `EncryptedData` 载体。
//!
//! `EncryptedData` 跨进程边界时以 JSON 表示：字节字段为带填充的标准 base64，
//! 缺省字段写为 `null`，字段顺序固定为
//! `ciphertext, algorithm, key_id, iv, tag, salt, nonce, signature, metadata`。

use crate::common::errors::{CryptoError, Result};
use crate::common::utils::b64;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 密钥与密文上附带的自由格式元数据
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// 元数据中记录附加认证数据的字段名
pub const AAD_METADATA_KEY: &str = "aad";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Fernet,
    #[serde(rename = "aes_256_gcm")]
    Aes256Gcm,
    #[serde(rename = "aes_256_cbc")]
    Aes256Cbc,
    #[serde(rename = "chacha20_poly1305")]
    ChaCha20Poly1305,
    NaclSecretbox,
    RsaOaep,
    HybridRsaAes,
    /// 仅用于签名的 RSA 密钥
    RsaPss,
}

impl Algorithm {
    pub const ALL: [Algorithm; 8] = [
        Algorithm::Fernet,
        Algorithm::Aes256Gcm,
        Algorithm::Aes256Cbc,
        Algorithm::ChaCha20Poly1305,
        Algorithm::NaclSecretbox,
        Algorithm::RsaOaep,
        Algorithm::HybridRsaAes,
        Algorithm::RsaPss,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Fernet => "fernet",
            Algorithm::Aes256Gcm => "aes_256_gcm",
            Algorithm::Aes256Cbc => "aes_256_cbc",
            Algorithm::ChaCha20Poly1305 => "chacha20_poly1305",
            Algorithm::NaclSecretbox => "nacl_secretbox",
            Algorithm::RsaOaep => "rsa_oaep",
            Algorithm::HybridRsaAes => "hybrid_rsa_aes",
            Algorithm::RsaPss => "rsa_pss",
        }
    }

    /// 密钥材料是否为 RSA 密钥对
    pub fn is_asymmetric(&self) -> bool {
        matches!(
            self,
            Algorithm::RsaOaep | Algorithm::HybridRsaAes | Algorithm::RsaPss
        )
    }

    /// 是否支持附加认证数据
    pub fn supports_aad(&self) -> bool {
        matches!(
            self,
            Algorithm::Aes256Gcm | Algorithm::ChaCha20Poly1305 | Algorithm::HybridRsaAes
        )
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Symmetric,
    AsymmetricPublic,
    AsymmetricPrivate,
    SigningPublic,
    SigningPrivate,
    Master,
    DataEncryptionKey,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Symmetric => "symmetric",
            KeyType::AsymmetricPublic => "asymmetric_public",
            KeyType::AsymmetricPrivate => "asymmetric_private",
            KeyType::SigningPublic => "signing_public",
            KeyType::SigningPrivate => "signing_private",
            KeyType::Master => "master",
            KeyType::DataEncryptionKey => "data_encryption_key",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, KeyType::AsymmetricPublic | KeyType::SigningPublic)
    }

    pub fn is_private(&self) -> bool {
        matches!(self, KeyType::AsymmetricPrivate | KeyType::SigningPrivate)
    }

    /// 私钥类型对应的公钥类型
    pub fn public_counterpart(&self) -> Option<KeyType> {
        match self {
            KeyType::AsymmetricPrivate => Some(KeyType::AsymmetricPublic),
            KeyType::SigningPrivate => Some(KeyType::SigningPublic),
            _ => None,
        }
    }

    /// 判断该类型能否承载给定算法的密钥材料
    pub fn fits(&self, algorithm: Algorithm) -> bool {
        if algorithm.is_asymmetric() {
            self.is_private() || self.is_public()
        } else {
            matches!(
                self,
                KeyType::Symmetric | KeyType::Master | KeyType::DataEncryptionKey
            )
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次加密操作的完整、自描述结果
///
/// 解密只需要本结构体和对所引用密钥的访问权。生成后不再修改。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncryptedData {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    pub algorithm: Algorithm,
    pub key_id: String,
    #[serde(default, with = "b64::option")]
    pub iv: Option<Vec<u8>>,
    #[serde(default, with = "b64::option")]
    pub tag: Option<Vec<u8>>,
    #[serde(default, with = "b64::option")]
    pub salt: Option<Vec<u8>>,
    #[serde(default, with = "b64::option")]
    pub nonce: Option<Vec<u8>>,
    #[serde(default, with = "b64::option")]
    pub signature: Option<Vec<u8>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl EncryptedData {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 加密时记录在元数据中的附加认证数据
    pub fn associated_data(&self) -> Result<Option<Vec<u8>>> {
        match self.metadata.get(AAD_METADATA_KEY) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(encoded)) => Ok(Some(STANDARD.decode(encoded)?)),
            Some(_) => Err(CryptoError::MalformedCiphertext(
                "aad metadata must be a base64 string".to_string(),
            )),
        }
    }

    pub fn view(&self) -> CipherView<'_> {
        CipherView {
            ciphertext: &self.ciphertext,
            iv: self.iv.as_deref(),
            nonce: self.nonce.as_deref(),
            tag: self.tag.as_deref(),
        }
    }

    /// 附上签名，返回新的实例；原实例保持不变
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }
}

/// 算法适配器的原始输出，由调用方补齐密钥 ID 和元数据后成为 `EncryptedData`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CipherParts {
    pub ciphertext: Vec<u8>,
    pub iv: Option<Vec<u8>>,
    pub nonce: Option<Vec<u8>>,
    pub tag: Option<Vec<u8>>,
}

impl CipherParts {
    pub fn opaque(ciphertext: Vec<u8>) -> Self {
        Self {
            ciphertext,
            ..Default::default()
        }
    }

    pub fn view(&self) -> CipherView<'_> {
        CipherView {
            ciphertext: &self.ciphertext,
            iv: self.iv.as_deref(),
            nonce: self.nonce.as_deref(),
            tag: self.tag.as_deref(),
        }
    }
}

/// 解密时对密文各部分的借用视图
#[derive(Clone, Copy, Debug)]
pub struct CipherView<'a> {
    pub ciphertext: &'a [u8],
    pub iv: Option<&'a [u8]>,
    pub nonce: Option<&'a [u8]>,
    pub tag: Option<&'a [u8]>,
}

impl<'a> CipherView<'a> {
    pub(crate) fn require_iv(&self, len: usize) -> Result<&'a [u8]> {
        require_len("iv", self.iv, len)
    }

    pub(crate) fn require_nonce(&self, len: usize) -> Result<&'a [u8]> {
        require_len("nonce", self.nonce, len)
    }

    pub(crate) fn require_tag(&self, len: usize) -> Result<&'a [u8]> {
        require_len("tag", self.tag, len)
    }
}

fn require_len<'a>(field: &str, value: Option<&'a [u8]>, len: usize) -> Result<&'a [u8]> {
    match value {
        Some(v) if v.len() == len => Ok(v),
        Some(v) => Err(CryptoError::MalformedCiphertext(format!(
            "{} must be {} bytes, got {}",
            field,
            len,
            v.len()
        ))),
        None => Err(CryptoError::MalformedCiphertext(format!("missing {}", field))),
    }
}
