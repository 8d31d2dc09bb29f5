//! 定义了非对称加密系统的核心 Trait。
use crate::common::config::CryptoConfig;
use crate::common::errors::Result;
use crate::common::utils::ZeroizingVec;
use crate::data::{Algorithm, CipherParts, CipherView};

/// `AsymmetricCryptographicSystem` 定义了非对称加密算法必须实现的核心功能。
///
/// 密钥以 PEM 文本的字节形式传递：公钥为 SPKI，私钥为 PKCS#8。
pub trait AsymmetricCryptographicSystem {
    const ALGORITHM: Algorithm;

    /// 生成密钥对，返回 (公钥 PEM, 私钥 PEM)
    fn generate_keypair(config: &CryptoConfig) -> Result<(String, ZeroizingVec)>;

    /// 使用公钥加密
    fn encrypt(
        public_key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts>;

    /// 使用私钥解密
    fn decrypt(
        private_key: &[u8],
        input: &CipherView<'_>,
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>>;
}
