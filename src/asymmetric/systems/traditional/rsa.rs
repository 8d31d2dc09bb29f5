//! `RsaOaepSystem` 提供了基于 RSA-OAEP (SHA-256) 的非对称加解密功能。
//!
//! 单次可加密的明文上限为 `k - 2*hLen - 2` 字节，2048 位密钥配 SHA-256 即 190 字节。

use crate::asymmetric::traits::AsymmetricCryptographicSystem;
use crate::common::config::CryptoConfig;
use crate::common::errors::{CryptoError, Result};
use crate::common::utils::ZeroizingVec;
use crate::data::{Algorithm, CipherParts, CipherView};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::rand_core::OsRng as RsaOsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

const SHA256_LEN: usize = 32;

/// 生成 RSA 密钥对，返回 (SPKI 公钥 PEM, PKCS#8 私钥 PEM)
pub fn generate_keypair(bits: usize) -> Result<(String, ZeroizingVec)> {
    let mut rng = RsaOsRng;
    let private_key = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| CryptoError::InvalidKeyMaterial(format!("RSA key generation failed: {}", e)))?;
    let public_pem = export_public_pem(&RsaPublicKey::from(&private_key))?;
    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|_| CryptoError::InvalidKeyMaterial("RSA private key export failed".to_string()))?;
    Ok((public_pem, ZeroizingVec(private_pem.as_bytes().to_vec())))
}

pub fn parse_private_key(pem: &[u8]) -> Result<RsaPrivateKey> {
    let pem = std::str::from_utf8(pem)
        .map_err(|_| CryptoError::InvalidKeyMaterial("RSA private key is not PEM".to_string()))?;
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|_| CryptoError::InvalidKeyMaterial("RSA private key could not be parsed".to_string()))
}

pub fn parse_public_key(pem: &[u8]) -> Result<RsaPublicKey> {
    let pem = std::str::from_utf8(pem)
        .map_err(|_| CryptoError::InvalidKeyMaterial("RSA public key is not PEM".to_string()))?;
    RsaPublicKey::from_public_key_pem(pem)
        .map_err(|_| CryptoError::InvalidKeyMaterial("RSA public key could not be parsed".to_string()))
}

pub fn export_public_pem(public_key: &RsaPublicKey) -> Result<String> {
    public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::Serialization(format!("RSA public key export failed: {}", e)))
}

/// 从私钥 PEM 推导公钥 PEM
pub fn public_pem_from_private(private_pem: &[u8]) -> Result<String> {
    let private_key = parse_private_key(private_pem)?;
    export_public_pem(&RsaPublicKey::from(&private_key))
}

/// OAEP(SHA-256) 下该公钥能加密的最大明文长度
pub fn max_oaep_plaintext(public_key: &RsaPublicKey) -> usize {
    public_key.size().saturating_sub(2 * SHA256_LEN + 2)
}

/// 用已解析的公钥执行 OAEP 加密，先检查长度上限
pub(crate) fn oaep_encrypt(public_key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let max = max_oaep_plaintext(public_key);
    if plaintext.len() > max {
        return Err(CryptoError::PayloadTooLargeForAsymmetric {
            max,
            actual: plaintext.len(),
        });
    }
    let mut rng = RsaOsRng;
    public_key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|_| CryptoError::InvalidInput("RSA-OAEP encryption failed".to_string()))
}

pub(crate) fn oaep_decrypt(
    private_key: &RsaPrivateKey,
    ciphertext: &[u8],
    algorithm: Algorithm,
) -> Result<Vec<u8>> {
    private_key
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| CryptoError::auth_failure(algorithm))
}

/// PSS 在该模数下允许的最大盐长：`emLen - hLen - 2`，2048 位密钥为 222 字节
pub fn max_pss_salt_len(public_key: &RsaPublicKey) -> usize {
    let em_bits = (public_key.n().bits() as usize).saturating_sub(1);
    em_bits.div_ceil(8).saturating_sub(SHA256_LEN + 2)
}

/// RSA-PSS 签名：SHA-256 摘要，MGF1(SHA-256)，最大盐长
pub fn pss_sign(private_key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>> {
    let salt_len = max_pss_salt_len(&private_key.to_public_key());
    let digest = Sha256::digest(message);
    let mut rng = RsaOsRng;
    private_key
        .sign_with_rng(&mut rng, Pss::new_with_salt::<Sha256>(salt_len), &digest)
        .map_err(|_| CryptoError::InvalidKeyMaterial("RSA-PSS signing failed".to_string()))
}

/// 验证 RSA-PSS 签名，参数与 `pss_sign` 相同
pub fn pss_verify(public_key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> Result<()> {
    let salt_len = max_pss_salt_len(public_key);
    let digest = Sha256::digest(message);
    public_key
        .verify(Pss::new_with_salt::<Sha256>(salt_len), &digest, signature)
        .map_err(|_| CryptoError::SignatureVerificationFailure)
}

/// RSA-OAEP 加密系统实现
pub struct RsaOaepSystem;

impl AsymmetricCryptographicSystem for RsaOaepSystem {
    const ALGORITHM: Algorithm = Algorithm::RsaOaep;

    fn generate_keypair(config: &CryptoConfig) -> Result<(String, ZeroizingVec)> {
        generate_keypair(config.rsa_key_bits)
    }

    fn encrypt(
        public_key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts> {
        if additional_data.is_some_and(|aad| !aad.is_empty()) {
            return Err(CryptoError::InvalidInput(
                "rsa_oaep does not authenticate associated data".to_string(),
            ));
        }
        let public_key = parse_public_key(public_key)?;
        Ok(CipherParts::opaque(oaep_encrypt(&public_key, plaintext)?))
    }

    fn decrypt(
        private_key: &[u8],
        input: &CipherView<'_>,
        _additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let private_key = parse_private_key(private_key)?;
        oaep_decrypt(&private_key, input.ciphertext, Self::ALGORITHM)
    }
}
