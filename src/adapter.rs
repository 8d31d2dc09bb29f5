//! 运行时算法分发：把 `Algorithm` 映射到具体的加密系统实现。
//!
//! 各加密系统以关联常量和静态方法描述自己，这里用零大小的泛型包装把它们
//! 统一成 `&'static dyn AlgorithmAdapter`，供管理器按算法名选择。

use crate::asymmetric::systems::traditional::rsa;
use crate::asymmetric::systems::{HybridRsaAesSystem, RsaOaepSystem};
use crate::asymmetric::traits::AsymmetricCryptographicSystem;
use crate::common::config::CryptoConfig;
use crate::common::errors::{CryptoError, Result};
use crate::common::utils::ZeroizingVec;
use crate::data::{Algorithm, CipherParts, EncryptedData};
use crate::keys::record::EncryptionKey;
use crate::symmetric::systems::{
    AesCbcSystem, AesGcmSystem, ChaCha20System, FernetSystem, SecretBoxSystem,
};
use crate::symmetric::traits::SymmetricCryptographicSystem;
use std::marker::PhantomData;

/// 新生成的密钥材料
pub enum KeyMaterial {
    /// 对称密钥字节
    Secret(ZeroizingVec),
    /// RSA 密钥对，私钥为 PKCS#8 PEM
    KeyPair {
        public_pem: String,
        private_pem: ZeroizingVec,
    },
}

/// 每个算法对外的统一契约
pub trait AlgorithmAdapter: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// 按算法要求的尺寸和形状生成密钥材料
    fn generate(&self, config: &CryptoConfig) -> Result<KeyMaterial>;

    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &EncryptionKey,
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts>;

    /// 解密所需的一切都来自 `data` 本身和传入的密钥
    fn decrypt(&self, data: &EncryptedData, key: &EncryptionKey) -> Result<Vec<u8>>;
}

pub struct SymmetricAdapter<T>(PhantomData<fn() -> T>);

impl<T> SymmetricAdapter<T> {
    const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: SymmetricCryptographicSystem> AlgorithmAdapter for SymmetricAdapter<T> {
    fn algorithm(&self) -> Algorithm {
        T::ALGORITHM
    }

    fn generate(&self, _config: &CryptoConfig) -> Result<KeyMaterial> {
        T::generate_key().map(KeyMaterial::Secret)
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &EncryptionKey,
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts> {
        T::encrypt(key.material(), plaintext, additional_data)
    }

    fn decrypt(&self, data: &EncryptedData, key: &EncryptionKey) -> Result<Vec<u8>> {
        let aad = data.associated_data()?;
        T::decrypt(key.material(), &data.view(), aad.as_deref())
    }
}

pub struct AsymmetricAdapter<T>(PhantomData<fn() -> T>);

impl<T> AsymmetricAdapter<T> {
    const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: AsymmetricCryptographicSystem> AlgorithmAdapter for AsymmetricAdapter<T> {
    fn algorithm(&self) -> Algorithm {
        T::ALGORITHM
    }

    fn generate(&self, config: &CryptoConfig) -> Result<KeyMaterial> {
        let (public_pem, private_pem) = T::generate_keypair(config)?;
        Ok(KeyMaterial::KeyPair {
            public_pem,
            private_pem,
        })
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &EncryptionKey,
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts> {
        // 传入私钥时就地推导出公钥
        if key.key_type().is_private() {
            let public_pem = rsa::public_pem_from_private(key.material())?;
            T::encrypt(public_pem.as_bytes(), plaintext, additional_data)
        } else {
            T::encrypt(key.material(), plaintext, additional_data)
        }
    }

    fn decrypt(&self, data: &EncryptedData, key: &EncryptionKey) -> Result<Vec<u8>> {
        if !key.key_type().is_private() {
            return Err(CryptoError::UnsupportedKeyType {
                key_type: key.key_type().to_string(),
                algorithm: T::ALGORITHM.to_string(),
            });
        }
        let aad = data.associated_data()?;
        T::decrypt(key.material(), &data.view(), aad.as_deref())
    }
}

static FERNET: SymmetricAdapter<FernetSystem> = SymmetricAdapter::new();
static AES_256_GCM: SymmetricAdapter<AesGcmSystem> = SymmetricAdapter::new();
static AES_256_CBC: SymmetricAdapter<AesCbcSystem> = SymmetricAdapter::new();
static CHACHA20_POLY1305: SymmetricAdapter<ChaCha20System> = SymmetricAdapter::new();
static NACL_SECRETBOX: SymmetricAdapter<SecretBoxSystem> = SymmetricAdapter::new();
static RSA_OAEP: AsymmetricAdapter<RsaOaepSystem> = AsymmetricAdapter::new();
static HYBRID_RSA_AES: AsymmetricAdapter<HybridRsaAesSystem> = AsymmetricAdapter::new();

/// 查找算法对应的适配器。`rsa_pss` 只用于签名，没有加密适配器。
pub fn adapter_for(algorithm: Algorithm) -> Result<&'static dyn AlgorithmAdapter> {
    Ok(match algorithm {
        Algorithm::Fernet => &FERNET,
        Algorithm::Aes256Gcm => &AES_256_GCM,
        Algorithm::Aes256Cbc => &AES_256_CBC,
        Algorithm::ChaCha20Poly1305 => &CHACHA20_POLY1305,
        Algorithm::NaclSecretbox => &NACL_SECRETBOX,
        Algorithm::RsaOaep => &RSA_OAEP,
        Algorithm::HybridRsaAes => &HYBRID_RSA_AES,
        Algorithm::RsaPss => {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "{} is a signing algorithm",
                algorithm
            )));
        }
    })
}

/// 为任意算法生成密钥材料，包括只用于签名的 `rsa_pss`
pub fn generate_material(algorithm: Algorithm, config: &CryptoConfig) -> Result<KeyMaterial> {
    match algorithm {
        Algorithm::RsaPss => {
            let (public_pem, private_pem) = rsa::generate_keypair(config.rsa_key_bits)?;
            Ok(KeyMaterial::KeyPair {
                public_pem,
                private_pem,
            })
        }
        other => adapter_for(other)?.generate(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{KeyType, Metadata};
    use crate::keys::record::KeyInfo;
    use chrono::Utc;

    fn key(algorithm: Algorithm, key_type: KeyType, material: Vec<u8>) -> EncryptionKey {
        let info = KeyInfo {
            key_id: "k".to_string(),
            key_type,
            algorithm,
            created_at: Utc::now(),
            expires_at: None,
            usage_count: 0,
            max_usage: None,
            metadata: Metadata::new(),
        };
        EncryptionKey::new(info, ZeroizingVec(material))
    }

    fn seal(parts: CipherParts, algorithm: Algorithm) -> EncryptedData {
        EncryptedData {
            ciphertext: parts.ciphertext,
            algorithm,
            key_id: "k".to_string(),
            iv: parts.iv,
            tag: parts.tag,
            salt: None,
            nonce: parts.nonce,
            signature: None,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_dispatch_matches_algorithm() {
        for algorithm in Algorithm::ALL {
            match adapter_for(algorithm) {
                Ok(adapter) => assert_eq!(adapter.algorithm(), algorithm),
                Err(e) => {
                    assert_eq!(algorithm, Algorithm::RsaPss);
                    assert!(matches!(e, CryptoError::UnsupportedAlgorithm(_)));
                }
            }
        }
    }

    #[test]
    fn test_symmetric_roundtrip_through_adapter() {
        let config = CryptoConfig::default();
        for algorithm in [
            Algorithm::Fernet,
            Algorithm::Aes256Gcm,
            Algorithm::Aes256Cbc,
            Algorithm::ChaCha20Poly1305,
            Algorithm::NaclSecretbox,
        ] {
            let adapter = adapter_for(algorithm).unwrap();
            let KeyMaterial::Secret(material) = adapter.generate(&config).unwrap() else {
                panic!("{} should produce a secret key", algorithm);
            };
            let key = key(algorithm, KeyType::Symmetric, material.0.clone());
            let parts = adapter.encrypt(b"itinerary", &key, None).unwrap();
            let data = seal(parts, algorithm);
            assert_eq!(adapter.decrypt(&data, &key).unwrap(), b"itinerary");
        }
    }

    #[test]
    fn test_public_key_cannot_decrypt() {
        let KeyMaterial::KeyPair {
            public_pem,
            private_pem,
        } = generate_material(Algorithm::RsaOaep, &CryptoConfig::default()).unwrap()
        else {
            panic!("rsa_oaep should produce a key pair");
        };
        let adapter = adapter_for(Algorithm::RsaOaep).unwrap();
        let public = key(
            Algorithm::RsaOaep,
            KeyType::AsymmetricPublic,
            public_pem.into_bytes(),
        );
        let private = key(
            Algorithm::RsaOaep,
            KeyType::AsymmetricPrivate,
            private_pem.0.clone(),
        );

        let data = seal(adapter.encrypt(b"hi", &private, None).unwrap(), Algorithm::RsaOaep);
        assert!(matches!(
            adapter.decrypt(&data, &public),
            Err(CryptoError::UnsupportedKeyType { .. })
        ));
        assert_eq!(adapter.decrypt(&data, &private).unwrap(), b"hi");
    }
}
