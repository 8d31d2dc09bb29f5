use crate::common::errors::Result;
use rand_core::{OsRng, TryRngCore};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// 自动清零的字节向量，用于密钥等敏感数据
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingVec(#[serde(with = "serde_bytes")] pub Vec<u8>);

impl ZeroizingVec {
    /// 生成指定长度的随机字节
    pub fn random(len: usize) -> Result<Self> {
        let mut bytes = vec![0u8; len];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for ZeroizingVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ZeroizingVec([REDACTED; {}])", self.0.len())
    }
}

impl Deref for ZeroizingVec {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for ZeroizingVec {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ZeroizingVec {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// 从系统随机源取 `len` 个字节（非机密用途：IV、盐）
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

/// 生成一个 32 字节的一次性对称密钥
pub fn random_key_32() -> Result<Zeroizing<[u8; 32]>> {
    let mut key = Zeroizing::new([0u8; 32]);
    OsRng.try_fill_bytes(key.as_mut())?;
    Ok(key)
}

/// 用新鲜随机字节多次覆写缓冲区，最后清零
///
/// 在 Rust 中这只能保证当前缓冲区被擦除；此前发生过的移动或重新分配留下的副本无法追溯。
pub fn overwrite(buf: &mut [u8], passes: u8) -> Result<()> {
    for _ in 0..passes.max(1) {
        OsRng.try_fill_bytes(buf)?;
    }
    buf.zeroize();
    Ok(())
}

/// `Vec<u8>` 与 `Option<Vec<u8>>` 的 base64 serde 适配（标准字母表，带填充）
pub(crate) mod b64 {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            let encoded = Option::<String>::deserialize(deserializer)?;
            encoded
                .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_leaves_zeroes() {
        let mut buf = b"sensitive information".to_vec();
        overwrite(&mut buf, 3).unwrap();
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_random_material_differs() {
        let a = ZeroizingVec::random(32).unwrap();
        let b = ZeroizingVec::random(32).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = ZeroizingVec(vec![0xAB; 4]);
        assert_eq!(format!("{:?}", key), "ZeroizingVec([REDACTED; 4])");
    }
}
