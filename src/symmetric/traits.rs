use crate::common::errors::{CryptoError, Result};
use crate::common::utils::ZeroizingVec;
use crate::data::{Algorithm, CipherParts, CipherView};

/// 对称加密系统的公共特征
///
/// 每个实现都是无状态的：密钥由调用方按次传入，实现不保存任何密钥副本。
pub trait SymmetricCryptographicSystem {
    /// 该系统对应的算法标识
    const ALGORITHM: Algorithm;

    /// 密钥的期望长度（以字节为单位）。
    const KEY_SIZE: usize;

    /// 生成一个新的密钥。
    fn generate_key() -> Result<ZeroizingVec> {
        ZeroizingVec::random(Self::KEY_SIZE)
    }

    /// 使用密钥加密数据。
    fn encrypt(
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherParts>;

    /// 使用密钥解密数据。
    fn decrypt(
        key: &[u8],
        input: &CipherView<'_>,
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>>;

    /// 校验密钥长度
    fn check_key(key: &[u8]) -> Result<()> {
        if key.len() != Self::KEY_SIZE {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "{} expects a {}-byte key, got {}",
                Self::ALGORITHM,
                Self::KEY_SIZE,
                key.len()
            )));
        }
        Ok(())
    }

    /// 不支持附加认证数据的系统拒绝调用方传入的 AAD
    fn reject_aad(additional_data: Option<&[u8]>) -> Result<()> {
        match additional_data {
            Some(aad) if !aad.is_empty() => Err(CryptoError::InvalidInput(format!(
                "{} does not authenticate associated data",
                Self::ALGORITHM
            ))),
            _ => Ok(()),
        }
    }
}
