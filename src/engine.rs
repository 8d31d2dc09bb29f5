//! `EncryptionManager`：加密核心的显式上下文对象。
//!
//! 启动时用主密钥和配置构造一次，按引用（或 `Arc`）传给调用方。
//! 它持有密钥注册表、签名服务和各算法的默认密钥，对外提供完整的加解密 API。

use crate::adapter::adapter_for;
use crate::common::config::ConfigFile;
use crate::common::errors::{CryptoError, Result};
use crate::data::{AAD_METADATA_KEY, Algorithm, EncryptedData, KeyType, Metadata};
use crate::keys::record::SALT;
use crate::keys::{KeyInfo, KeyManager, KeyOptions, MasterKey};
use crate::message::SecureMessageProtocol;
use crate::signing::SigningService;
use crate::storage::{FileKeyStore, InMemoryKeyStore, KeyStore};
use arc_swap::ArcSwap;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// 元数据中标记"该算法默认密钥"的字段名
const DEFAULT_KEY_MARKER: &str = "default_key";

pub struct EncryptionManager {
    config: Arc<ArcSwap<ConfigFile>>,
    keys: Arc<KeyManager>,
    signer: SigningService,
    // 每个算法当前的默认密钥；锁同时保证并发首用时只生成一个
    default_keys: Mutex<HashMap<Algorithm, String>>,
    default_creation: Mutex<HashMap<Algorithm, Arc<Mutex<()>>>>,
}

impl EncryptionManager {
    /// 按配置选择存储：设置了 `key_store_path` 时使用文件存储并加载已有注册表，否则只在内存中保存。
    pub fn new(config: ConfigFile, master: MasterKey) -> Result<Self> {
        let store: Arc<dyn KeyStore> = match &config.storage.key_store_path {
            Some(path) => Arc::new(FileKeyStore::open(path)?),
            None => Arc::new(InMemoryKeyStore::new()),
        };
        Self::open(config, master, store)
    }

    /// 使用调用方提供的存储，并加载其中已有的密钥
    pub fn open(config: ConfigFile, master: MasterKey, store: Arc<dyn KeyStore>) -> Result<Self> {
        let config = Arc::new(ArcSwap::from_pointee(config));
        let keys = Arc::new(KeyManager::open(master, store, config.clone())?);
        info!(keys = keys.len(), "encryption manager ready");
        Ok(Self {
            config,
            signer: SigningService::new(keys.clone()),
            keys,
            default_keys: Mutex::new(HashMap::new()),
            default_creation: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> Arc<ConfigFile> {
        self.config.load_full()
    }

    /// 原子替换配置，进行中的操作继续使用旧配置
    pub fn update_config(&self, config: ConfigFile) {
        self.config.store(Arc::new(config));
        info!("configuration updated");
    }

    pub fn signing(&self) -> &SigningService {
        &self.signer
    }

    pub fn messages(&self) -> SecureMessageProtocol<'_> {
        SecureMessageProtocol::new(self)
    }

    // --- 密钥 ---

    pub fn generate_key(
        &self,
        algorithm: Algorithm,
        key_type: KeyType,
        ttl: Option<Duration>,
        metadata: Option<Metadata>,
    ) -> Result<String> {
        self.keys.generate_key(algorithm, key_type, ttl, metadata)
    }

    pub fn generate_key_with(
        &self,
        algorithm: Algorithm,
        key_type: KeyType,
        options: KeyOptions,
    ) -> Result<String> {
        self.keys.generate_key_with(algorithm, key_type, options)
    }

    pub fn rotate_key(&self, key_id: &str) -> Result<String> {
        let new_id = self.keys.rotate_key(key_id)?;
        self.replace_default(key_id, &new_id);
        Ok(new_id)
    }

    pub fn rotate_key_with_grace(&self, key_id: &str, grace: Duration) -> Result<String> {
        let new_id = self.keys.rotate_key_with_grace(key_id, grace)?;
        self.replace_default(key_id, &new_id);
        Ok(new_id)
    }

    pub fn derive_key(
        &self,
        password: &SecretString,
        salt: Option<&[u8]>,
        iterations: Option<u32>,
    ) -> Result<(String, Vec<u8>)> {
        self.keys.derive_key(password, salt, iterations)
    }

    pub fn secure_delete_key(&self, key_id: &str) -> bool {
        let deleted = self.keys.secure_delete_key(key_id);
        if deleted {
            self.defaults().retain(|_, id| id.as_str() != key_id);
        }
        deleted
    }

    pub fn get_key_info(&self, key_id: &str) -> Result<KeyInfo> {
        self.keys.get_key_info(key_id)
    }

    pub fn list_keys(
        &self,
        key_type: Option<KeyType>,
        algorithm: Option<Algorithm>,
        include_expired: bool,
    ) -> Vec<KeyInfo> {
        self.keys.list_keys(key_type, algorithm, include_expired)
    }

    pub fn needs_rotation(&self, key_id: &str) -> Result<bool> {
        self.keys.needs_rotation(key_id)
    }

    pub fn purge_expired_keys(&self) -> usize {
        let purged = self.keys.purge_expired_keys();
        let keys = &self.keys;
        self.defaults().retain(|_, id| keys.contains(id));
        purged
    }

    pub fn export_public_key(&self, key_id: &str) -> Result<String> {
        self.keys.export_public_key(key_id)
    }

    pub fn import_public_key(&self, pem: &str, key_type: KeyType) -> Result<String> {
        self.keys.import_public_key(pem, key_type)
    }

    /// 当前用于该算法的默认密钥 ID；尚不存在时生成一个
    pub fn default_key_id(&self, algorithm: Algorithm) -> Result<String> {
        if algorithm == Algorithm::RsaPss {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "{} has no default encryption key",
                algorithm
            )));
        }
        if let Some(key_id) = self.current_default(algorithm) {
            return Ok(key_id);
        }

        // 同一算法只生成一次；RSA 生成较慢，不占用 default_keys 锁
        let creation = self.creation_lock(algorithm);
        let _creating = creation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(key_id) = self.current_default(algorithm) {
            return Ok(key_id);
        }

        let key_type = if algorithm.is_asymmetric() {
            KeyType::AsymmetricPrivate
        } else {
            KeyType::Symmetric
        };
        let mut metadata = Metadata::new();
        metadata.insert(DEFAULT_KEY_MARKER.to_string(), true.into());
        let key_id = self
            .keys
            .generate_key(algorithm, key_type, None, Some(metadata))?;
        self.defaults().insert(algorithm, key_id.clone());
        debug!(key_id = %key_id, algorithm = %algorithm, "created default key");
        Ok(key_id)
    }

    fn creation_lock(&self, algorithm: Algorithm) -> Arc<Mutex<()>> {
        self.default_creation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(algorithm)
            .or_default()
            .clone()
    }

    fn current_default(&self, algorithm: Algorithm) -> Option<String> {
        let mut defaults = self.defaults();
        let candidate = defaults
            .get(&algorithm)
            .cloned()
            .or_else(|| self.find_marked_default(algorithm));
        let key_id = candidate.and_then(|id| self.follow_replacements(&id))?;
        defaults.insert(algorithm, key_id.clone());
        Some(key_id)
    }

    fn defaults(&self) -> MutexGuard<'_, HashMap<Algorithm, String>> {
        self.default_keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn replace_default(&self, old_id: &str, new_id: &str) {
        for id in self.defaults().values_mut() {
            if *id == old_id {
                *id = new_id.to_string();
            }
        }
    }

    /// 重启后从注册表中找回带默认标记的最新密钥
    fn find_marked_default(&self, algorithm: Algorithm) -> Option<String> {
        self.keys
            .list_keys(None, Some(algorithm), true)
            .into_iter()
            .filter(|info| info.key_type.is_private() || !info.algorithm.is_asymmetric())
            .filter(|info| info.metadata.get(DEFAULT_KEY_MARKER).is_some())
            .next_back()
            .map(|info| info.key_id)
    }

    /// 沿 `replaced_by` 找到当前有效的替代者；链条终点已过期时返回 `None`
    fn follow_replacements(&self, key_id: &str) -> Option<String> {
        let mut current = key_id.to_string();
        for _ in 0..=self.keys.len() {
            let info = self.keys.get_key_info(&current).ok()?;
            match info.replaced_by() {
                Some(next) => current = next.to_string(),
                None if info.is_expired() => return None,
                None => return Some(current),
            }
        }
        None
    }

    // --- 加解密 ---

    /// 加密数据。未指定密钥时使用该算法的默认密钥。
    ///
    /// 附加认证数据以 base64 记录在结果的 `metadata["aad"]` 中，解密时自动取用。
    pub fn encrypt(
        &self,
        data: &[u8],
        algorithm: Algorithm,
        key_id: Option<&str>,
        aad: Option<&[u8]>,
    ) -> Result<EncryptedData> {
        let adapter = adapter_for(algorithm)?;
        let aad = aad.filter(|aad| !aad.is_empty());
        if aad.is_some() && !algorithm.supports_aad() {
            return Err(CryptoError::InvalidInput(format!(
                "{} does not authenticate associated data",
                algorithm
            )));
        }

        let requested = match key_id {
            Some(key_id) => key_id.to_string(),
            None => self.default_key_id(algorithm)?,
        };
        check_compatible(&self.keys.get_key_info(&requested)?, algorithm)?;

        // 用公钥加密的结果记在私钥名下，解密时直接可用
        let (record_id, key) = self.keys.checkout_for_encryption(&requested)?;
        let parts = adapter.encrypt(data, &key, aad)?;

        let mut metadata = Metadata::new();
        metadata.insert("encrypted_at".to_string(), Utc::now().to_rfc3339().into());
        if let Some(aad) = aad {
            metadata.insert(AAD_METADATA_KEY.to_string(), STANDARD.encode(aad).into());
        }
        let salt = key
            .info()
            .metadata
            .get(SALT)
            .and_then(|v| v.as_str())
            .map(|encoded| STANDARD.decode(encoded))
            .transpose()?;

        debug!(key_id = %record_id, algorithm = %algorithm, "data encrypted");
        Ok(EncryptedData {
            ciphertext: parts.ciphertext,
            algorithm,
            key_id: record_id,
            iv: parts.iv,
            tag: parts.tag,
            salt,
            nonce: parts.nonce,
            signature: None,
            metadata,
        })
    }

    /// 用 `data.key_id` 指向的密钥解密
    pub fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>> {
        self.decrypt_with(data, &data.key_id)
    }

    /// 用指定的密钥解密，忽略 `data.key_id`
    pub fn decrypt_with(&self, data: &EncryptedData, key_id: &str) -> Result<Vec<u8>> {
        let adapter = adapter_for(data.algorithm)?;
        let info = self.keys.get_key_info(key_id)?;
        check_compatible(&info, data.algorithm)?;
        if info.key_type.is_public() {
            return Err(CryptoError::UnsupportedKeyType {
                key_type: info.key_type.to_string(),
                algorithm: data.algorithm.to_string(),
            });
        }

        let key = self.keys.checkout(key_id)?;
        let plaintext = adapter.decrypt(data, &key)?;
        debug!(key_id = %key_id, algorithm = %data.algorithm, "data decrypted");
        Ok(plaintext)
    }

    /// 用同一把密钥并行加密多条数据
    pub fn encrypt_batch<T>(
        &self,
        items: &[T],
        algorithm: Algorithm,
        key_id: Option<&str>,
    ) -> Result<Vec<EncryptedData>>
    where
        T: AsRef<[u8]> + Sync,
    {
        let key_id = match key_id {
            Some(key_id) => key_id.to_string(),
            None => self.default_key_id(algorithm)?,
        };

        #[cfg(feature = "parallel")]
        let iter = items.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = items.iter();

        iter.map(|item| self.encrypt(item.as_ref(), algorithm, Some(&key_id), None))
            .collect()
    }

    // --- 签名 ---

    pub fn sign_data(&self, data: &[u8], signing_key_id: &str) -> Result<Vec<u8>> {
        self.signer.sign_data(data, signing_key_id)
    }

    pub fn verify_signature(&self, data: &[u8], signature: &[u8], public_key_id: &str) -> bool {
        self.signer.verify_signature(data, signature, public_key_id)
    }

    /// 清除内存中的全部密钥；主密钥随管理器一起在释放时清零
    pub fn close(&self) {
        self.defaults().clear();
        self.keys.close();
        info!("encryption manager closed");
    }
}

impl std::fmt::Debug for EncryptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionManager")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// 密钥必须与算法一致；RSA 密钥对可在各 RSA 算法之间通用
fn check_compatible(info: &KeyInfo, algorithm: Algorithm) -> Result<()> {
    if info.algorithm == algorithm || (info.algorithm.is_asymmetric() && algorithm.is_asymmetric())
    {
        return Ok(());
    }
    Err(CryptoError::KeyAlgorithmMismatch {
        key_id: info.key_id.clone(),
        expected: algorithm.to_string(),
        actual: info.algorithm.to_string(),
    })
}
