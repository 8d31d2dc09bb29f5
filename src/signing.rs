//! RSA-PSS 签名服务，与加密共用同一个密钥注册表。

use crate::asymmetric::systems::traditional::rsa::{
    parse_private_key, parse_public_key, pss_sign, pss_verify,
};
use crate::common::errors::{CryptoError, Result};
use crate::keys::KeyManager;
use std::sync::Arc;
use tracing::debug;

pub struct SigningService {
    keys: Arc<KeyManager>,
}

impl SigningService {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// 用 RSA 私钥对数据签名（PSS，SHA-256，MGF1-SHA-256，最大盐长）。
    /// 每次签名计入该私钥的一次使用。
    pub fn sign_data(&self, data: &[u8], signing_key_id: &str) -> Result<Vec<u8>> {
        let key = self.keys.checkout(signing_key_id)?;
        if !key.algorithm().is_asymmetric() || !key.key_type().is_private() {
            return Err(CryptoError::UnsupportedKeyType {
                key_type: key.key_type().to_string(),
                algorithm: key.algorithm().to_string(),
            });
        }
        let private_key = parse_private_key(key.material())?;
        let signature = pss_sign(&private_key, data)?;
        debug!(key_id = %signing_key_id, "data signed");
        Ok(signature)
    }

    /// 验证签名。任何失败（密钥缺失、过期、格式错误、签名不匹配）都返回 `false`。
    ///
    /// 传入私钥 ID 时使用其公钥部分验证。验证只检查过期，不计入使用次数。
    pub fn verify_signature(&self, data: &[u8], signature: &[u8], public_key_id: &str) -> bool {
        match self.try_verify(data, signature, public_key_id) {
            Ok(()) => true,
            Err(e) => {
                debug!(key_id = %public_key_id, error = %e, "signature rejected");
                false
            }
        }
    }

    fn try_verify(&self, data: &[u8], signature: &[u8], public_key_id: &str) -> Result<()> {
        let key = self.keys.inspect(public_key_id)?;
        if !key.algorithm().is_asymmetric() {
            return Err(CryptoError::UnsupportedKeyType {
                key_type: key.key_type().to_string(),
                algorithm: key.algorithm().to_string(),
            });
        }
        let public_key = if key.key_type().is_private() {
            parse_private_key(key.material())?.to_public_key()
        } else {
            parse_public_key(key.material())?
        };
        pss_verify(&public_key, data, signature)
    }
}
