//! 密钥管理器：唯一接触原始密钥字节的组件。
//!
//! 注册表中只保存主密钥包装后的密钥；解包后的副本只存在于单次操作的调用栈内，
//! 以 `EncryptionKey` 的形式返回，离开作用域即清零。

pub mod master;
pub mod record;

pub use self::master::MasterKey;
pub use self::record::{EncryptionKey, KeyInfo, StoredKey, WrappedKey};

use crate::adapter::{KeyMaterial, generate_material};
use crate::asymmetric::systems::traditional::rsa;
use crate::common::config::ConfigFile;
use crate::common::errors::{CryptoError, Result};
use crate::common::utils::{overwrite, random_bytes};
use crate::data::{Algorithm, KeyType, Metadata};
use crate::rotation::KeyLifecycle;
use crate::storage::KeyStore;
use arc_swap::ArcSwap;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

/// 公钥伴随记录的 ID 后缀
pub const PUBLIC_KEY_SUFFIX: &str = "_public";

const DERIVED_KEY_SIZE: usize = 32;

/// 私钥 ID 对应的公钥 ID
pub fn public_key_id(key_id: &str) -> String {
    format!("{}{}", key_id, PUBLIC_KEY_SUFFIX)
}

/// 新密钥的可选参数；未指定的项取自当前配置的轮换策略
#[derive(Clone, Debug, Default)]
pub struct KeyOptions {
    pub ttl: Option<Duration>,
    pub max_usage: Option<u64>,
    pub metadata: Option<Metadata>,
}

pub struct KeyManager {
    master: MasterKey,
    registry: DashMap<String, StoredKey>,
    store: Arc<dyn KeyStore>,
    config: Arc<ArcSwap<ConfigFile>>,
    // 同一时刻只允许一次轮换，防止同一密钥产生两个"当前"替代者
    rotation_lock: Mutex<()>,
}

impl KeyManager {
    pub fn new(
        master: MasterKey,
        store: Arc<dyn KeyStore>,
        config: Arc<ArcSwap<ConfigFile>>,
    ) -> Self {
        Self {
            master,
            registry: DashMap::new(),
            store,
            config,
            rotation_lock: Mutex::new(()),
        }
    }

    /// 从存储中加载已有的注册表。每条记录都必须能被当前主密钥解包。
    pub fn open(
        master: MasterKey,
        store: Arc<dyn KeyStore>,
        config: Arc<ArcSwap<ConfigFile>>,
    ) -> Result<Self> {
        let manager = Self::new(master, store, config);
        let records = manager.store.load_all()?;
        for record in records {
            manager.master.unwrap(&record.info.key_id, &record.wrapped)?;
            manager.registry.insert(record.info.key_id.clone(), record);
        }
        info!(keys = manager.registry.len(), "key registry loaded");
        Ok(manager)
    }

    pub fn config(&self) -> Arc<ConfigFile> {
        self.config.load_full()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn contains(&self, key_id: &str) -> bool {
        self.registry.contains_key(key_id)
    }

    // --- 生成 ---

    /// 生成新密钥并返回其 ID。RSA 系列算法同时在 `{key_id}_public` 下保存公钥。
    pub fn generate_key(
        &self,
        algorithm: Algorithm,
        key_type: KeyType,
        ttl: Option<Duration>,
        metadata: Option<Metadata>,
    ) -> Result<String> {
        self.generate_key_with(
            algorithm,
            key_type,
            KeyOptions {
                ttl,
                max_usage: None,
                metadata,
            },
        )
    }

    pub fn generate_key_with(
        &self,
        algorithm: Algorithm,
        key_type: KeyType,
        options: KeyOptions,
    ) -> Result<String> {
        let unsupported = || CryptoError::UnsupportedKeyType {
            key_type: key_type.to_string(),
            algorithm: algorithm.to_string(),
        };
        // 非对称密钥总是成对生成，调用方指定的是私钥类型
        if !key_type.fits(algorithm) || (algorithm.is_asymmetric() && !key_type.is_private()) {
            return Err(unsupported());
        }

        let config = self.config.load();
        let ttl = options.ttl.or_else(|| config.rotation.default_ttl());
        let now = Utc::now();
        let info = KeyInfo {
            key_id: Uuid::new_v4().to_string(),
            key_type,
            algorithm,
            created_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
            usage_count: 0,
            max_usage: options.max_usage.or(config.rotation.max_usage_count),
            metadata: options.metadata.unwrap_or_default(),
        };
        let key_id = info.key_id.clone();

        match generate_material(algorithm, &config.crypto)? {
            KeyMaterial::Secret(material) => self.insert(info, &material)?,
            KeyMaterial::KeyPair {
                public_pem,
                private_pem,
            } => {
                let public_type = key_type.public_counterpart().ok_or_else(unsupported)?;
                // 使用次数只记在私钥上
                let public_info = KeyInfo {
                    key_id: public_key_id(&key_id),
                    key_type: public_type,
                    max_usage: None,
                    ..info.clone()
                };
                self.insert(info, &private_pem)?;
                self.insert(public_info, public_pem.as_bytes())?;
            }
        }

        info!(key_id = %key_id, algorithm = %algorithm, key_type = %key_type, "generated key");
        Ok(key_id)
    }

    fn insert(&self, info: KeyInfo, material: &[u8]) -> Result<()> {
        let wrapped = self.master.wrap(&info.key_id, material)?;
        let record = StoredKey { info, wrapped };
        self.store.save(&record)?;
        self.registry.insert(record.info.key_id.clone(), record);
        Ok(())
    }

    /// 在已持有条目锁的情况下更新描述信息：先落盘，再改内存
    fn commit_info(&self, record: &mut StoredKey, info: KeyInfo) -> Result<()> {
        self.store.save(&StoredKey {
            info: info.clone(),
            wrapped: record.wrapped.clone(),
        })?;
        record.info = info;
        Ok(())
    }

    // --- 取用 ---

    /// 解包密钥，不计入使用次数
    pub fn get_key(&self, key_id: &str) -> Result<EncryptionKey> {
        let record = self
            .registry
            .get(key_id)
            .ok_or_else(|| CryptoError::not_found(key_id))?;
        let material = self.master.unwrap(key_id, &record.wrapped)?;
        Ok(EncryptionKey::new(record.info.clone(), material))
    }

    /// 执行过期、使用上限检查并计入一次使用
    pub fn validate_key(&self, key_id: &str) -> Result<KeyInfo> {
        let mut record = self
            .registry
            .get_mut(key_id)
            .ok_or_else(|| CryptoError::not_found(key_id))?;
        let config = self.config.load();
        let mut info = record.info.clone();
        KeyLifecycle::new(&config.rotation).admit(&mut info)?;
        self.commit_info(&mut record, info.clone())?;
        Ok(info)
    }

    /// 校验并解包，整个过程持有该密钥的条目锁
    pub(crate) fn checkout(&self, key_id: &str) -> Result<EncryptionKey> {
        let mut record = self
            .registry
            .get_mut(key_id)
            .ok_or_else(|| CryptoError::not_found(key_id))?;
        let config = self.config.load();
        let mut info = record.info.clone();
        KeyLifecycle::new(&config.rotation).admit(&mut info)?;
        let material = self.master.unwrap(key_id, &record.wrapped)?;
        self.commit_info(&mut record, info.clone())?;
        debug!(key_id = %key_id, usage_count = info.usage_count, "key checked out");
        Ok(EncryptionKey::new(info, material))
    }

    /// 只检查过期并解包，不计入使用次数，也不改写存储
    pub(crate) fn inspect(&self, key_id: &str) -> Result<EncryptionKey> {
        let record = self
            .registry
            .get(key_id)
            .ok_or_else(|| CryptoError::not_found(key_id))?;
        if record.info.is_expired() {
            return Err(CryptoError::KeyExpired {
                key_id: key_id.to_string(),
            });
        }
        let material = self.master.unwrap(key_id, &record.wrapped)?;
        Ok(EncryptionKey::new(record.info.clone(), material))
    }

    /// 公钥伴随记录所属的私钥 ID
    fn owner_of(&self, key_id: &str) -> Option<String> {
        let owner = key_id.strip_suffix(PUBLIC_KEY_SUFFIX)?;
        self.registry
            .get(owner)
            .filter(|r| r.info.key_type.is_private())
            .map(|_| owner.to_string())
    }

    /// 取出加密用的密钥，返回 (记录在密文上的密钥 ID, 密钥)。
    ///
    /// RSA 密钥对用公钥材料加密，使用次数计在私钥上；传入私钥或公钥 ID 结果相同。
    pub(crate) fn checkout_for_encryption(&self, key_id: &str) -> Result<(String, EncryptionKey)> {
        let (owner, public_id) = match self.owner_of(key_id) {
            Some(owner) => (owner, key_id.to_string()),
            None => {
                let public_id = public_key_id(key_id);
                if !self.registry.contains_key(&public_id) {
                    return Ok((key_id.to_string(), self.checkout(key_id)?));
                }
                (key_id.to_string(), public_id)
            }
        };
        let public = self.inspect(&public_id)?;
        self.validate_key(&owner)?;
        Ok((owner, public))
    }

    // --- 轮换 ---

    /// 按配置的宽限期轮换密钥
    pub fn rotate_key(&self, key_id: &str) -> Result<String> {
        let grace = self.config.load().rotation.grace_period();
        self.rotate_key_with_grace(key_id, grace)
    }

    /// 生成同算法、同类型的新密钥，把旧密钥标记为弃用并把过期时间收紧到宽限期结束。
    ///
    /// 对已经轮换过的密钥重复调用会返回原有的替代者，不会再生成新密钥。
    pub fn rotate_key_with_grace(&self, key_id: &str, grace: Duration) -> Result<String> {
        let _guard = self
            .rotation_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let old = self.get_key_info(key_id)?;
        if old.key_type.is_public() {
            return Err(CryptoError::InvalidInput(format!(
                "public key {} rotates together with its private key",
                key_id
            )));
        }
        if let Some(existing) = old.replaced_by() {
            debug!(key_id = %key_id, replaced_by = %existing, "key already rotated");
            return Ok(existing.to_string());
        }

        let mut metadata = Metadata::new();
        metadata.insert("rotated_from".to_string(), key_id.into());
        let new_id = self.generate_key_with(
            old.algorithm,
            old.key_type,
            KeyOptions {
                ttl: old.expires_at.map(|expires_at| expires_at - old.created_at),
                max_usage: old.max_usage,
                metadata: Some(metadata),
            },
        )?;

        let config = self.config.load();
        let lifecycle = KeyLifecycle::new(&config.rotation);
        if let Err(e) = self.retire_pair(key_id, &new_id, grace, &lifecycle) {
            // 旧密钥没有指向新密钥，新密钥不能留下，否则重试会产生第二个替代者
            warn!(key_id = %key_id, discarded = %new_id, error = %e, "rotation failed");
            for id in [public_key_id(&new_id), new_id] {
                if self.registry.contains_key(&id) && !self.secure_delete_key(&id) {
                    warn!(key_id = %id, "failed to discard replacement key");
                }
            }
            return Err(e);
        }

        info!(
            key_id = %key_id,
            replaced_by = %new_id,
            grace_seconds = grace.num_seconds(),
            "rotated key"
        );
        Ok(new_id)
    }

    /// 弃用私钥及其公钥伴随记录；公钥一侧失败时恢复私钥原有的描述信息
    fn retire_pair(
        &self,
        key_id: &str,
        new_key_id: &str,
        grace: Duration,
        lifecycle: &KeyLifecycle<'_>,
    ) -> Result<()> {
        let previous = self.retire(key_id, new_key_id, grace, lifecycle)?;
        let old_public = public_key_id(key_id);
        if !self.registry.contains_key(&old_public) {
            return Ok(());
        }
        if let Err(e) = self.retire(&old_public, &public_key_id(new_key_id), grace, lifecycle) {
            self.restore_info(previous);
            return Err(e);
        }
        Ok(())
    }

    /// 返回弃用前的描述信息
    fn retire(
        &self,
        key_id: &str,
        new_key_id: &str,
        grace: Duration,
        lifecycle: &KeyLifecycle<'_>,
    ) -> Result<KeyInfo> {
        let mut record = self
            .registry
            .get_mut(key_id)
            .ok_or_else(|| CryptoError::not_found(key_id))?;
        let previous = record.info.clone();
        let mut info = previous.clone();
        lifecycle.retire(&mut info, new_key_id, grace);
        self.commit_info(&mut record, info)?;
        Ok(previous)
    }

    /// 内存总是恢复；落盘失败只告警
    fn restore_info(&self, info: KeyInfo) {
        let Some(mut record) = self.registry.get_mut(&info.key_id) else {
            return;
        };
        let restored = StoredKey {
            info: info.clone(),
            wrapped: record.wrapped.clone(),
        };
        if let Err(e) = self.store.save(&restored) {
            warn!(key_id = %info.key_id, error = %e, "failed to persist restored key info");
        }
        record.info = info;
    }

    // --- 派生 ---

    /// PBKDF2-HMAC-SHA256 口令派生 32 字节 AES-256-GCM 密钥，返回 (密钥 ID, 盐)。
    ///
    /// 未给出盐时生成随机盐；未给出迭代次数时使用配置值。
    pub fn derive_key(
        &self,
        password: &SecretString,
        salt: Option<&[u8]>,
        iterations: Option<u32>,
    ) -> Result<(String, Vec<u8>)> {
        let config = self.config.load();
        let iterations = iterations.unwrap_or(config.crypto.pbkdf2_iterations);
        if iterations == 0 {
            return Err(CryptoError::InvalidInput(
                "PBKDF2 iteration count must be positive".to_string(),
            ));
        }
        let salt = match salt {
            Some(salt) if salt.is_empty() => {
                return Err(CryptoError::InvalidInput("salt must not be empty".to_string()));
            }
            Some(salt) => salt.to_vec(),
            None => random_bytes(config.crypto.salt_len)?,
        };

        let mut derived = Zeroizing::new([0u8; DERIVED_KEY_SIZE]);
        pbkdf2_hmac::<Sha256>(
            password.expose_secret().as_bytes(),
            &salt,
            iterations,
            derived.as_mut(),
        );

        let mut metadata = Metadata::new();
        metadata.insert("derived".to_string(), true.into());
        metadata.insert("kdf".to_string(), "pbkdf2_hmac_sha256".into());
        metadata.insert("iterations".to_string(), iterations.into());
        metadata.insert(record::SALT.to_string(), STANDARD.encode(&salt).into());

        let now = Utc::now();
        let ttl = config.rotation.default_ttl();
        let info = KeyInfo {
            key_id: Uuid::new_v4().to_string(),
            key_type: KeyType::Symmetric,
            algorithm: Algorithm::Aes256Gcm,
            created_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
            usage_count: 0,
            max_usage: config.rotation.max_usage_count,
            metadata,
        };
        let key_id = info.key_id.clone();
        self.insert(info, derived.as_ref())?;

        info!(key_id = %key_id, iterations, "derived key from password");
        Ok((key_id, salt))
    }

    // --- 删除 ---

    /// 从存储和注册表中移除密钥，并多遍覆写其包装缓冲区。
    ///
    /// 密钥不存在或存储删除失败时返回 `false`。
    pub fn secure_delete_key(&self, key_id: &str) -> bool {
        // remove 持有分片写锁，和并发的 get_key 互斥
        let Some((_, mut record)) = self.registry.remove(key_id) else {
            return false;
        };
        if let Err(e) = self.store.delete(key_id) {
            warn!(key_id = %key_id, error = %e, "key store delete failed, entry kept");
            self.registry.insert(key_id.to_string(), record);
            return false;
        }

        let passes = self.config.load().storage.secure_delete_passes;
        if let Err(e) = Self::scrub(&mut record, passes) {
            warn!(key_id = %key_id, error = %e, "overwrite pass failed, buffer zeroized only");
        }
        info!(key_id = %key_id, passes, "securely deleted key");
        true
    }

    fn scrub(record: &mut StoredKey, passes: u8) -> Result<()> {
        overwrite(&mut record.wrapped.ciphertext, passes)?;
        overwrite(&mut record.wrapped.iv, passes)?;
        overwrite(&mut record.wrapped.tag, passes)
    }

    /// 删除所有已过期的密钥，返回删除数量
    pub fn purge_expired_keys(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .registry
            .iter()
            .filter(|r| r.info.is_expired_at(now))
            .map(|r| r.key().clone())
            .collect();
        let purged = expired
            .iter()
            .filter(|key_id| self.secure_delete_key(key_id))
            .count();
        if purged > 0 {
            info!(purged, "purged expired keys");
        }
        purged
    }

    /// 清除内存中的全部条目；持久化存储不受影响
    pub fn close(&self) {
        let passes = self.config.load().storage.secure_delete_passes;
        let ids: Vec<String> = self.registry.iter().map(|r| r.key().clone()).collect();
        for key_id in ids {
            if let Some((_, mut record)) = self.registry.remove(&key_id) {
                if let Err(e) = Self::scrub(&mut record, passes) {
                    warn!(key_id = %key_id, error = %e, "overwrite pass failed, buffer zeroized only");
                }
            }
        }
        debug!("key registry cleared");
    }

    // --- 查询 ---

    pub fn get_key_info(&self, key_id: &str) -> Result<KeyInfo> {
        self.registry
            .get(key_id)
            .map(|r| r.info.clone())
            .ok_or_else(|| CryptoError::not_found(key_id))
    }

    /// 按类型和算法筛选密钥，按创建时间排序
    pub fn list_keys(
        &self,
        key_type: Option<KeyType>,
        algorithm: Option<Algorithm>,
        include_expired: bool,
    ) -> Vec<KeyInfo> {
        let now = Utc::now();
        let mut keys: Vec<KeyInfo> = self
            .registry
            .iter()
            .map(|r| r.info.clone())
            .filter(|info| key_type.is_none_or(|t| info.key_type == t))
            .filter(|info| algorithm.is_none_or(|a| info.algorithm == a))
            .filter(|info| include_expired || !info.is_expired_at(now))
            .collect();
        keys.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.key_id.cmp(&b.key_id))
        });
        keys
    }

    pub fn needs_rotation(&self, key_id: &str) -> Result<bool> {
        let info = self.get_key_info(key_id)?;
        let config = self.config.load();
        Ok(KeyLifecycle::new(&config.rotation).needs_rotation(&info))
    }

    // --- 公钥交换 ---

    /// 导出 PEM 公钥。可以传入私钥 ID 或公钥 ID；不计入使用次数。
    pub fn export_public_key(&self, key_id: &str) -> Result<String> {
        let info = self.get_key_info(key_id)?;
        if !info.algorithm.is_asymmetric() {
            return Err(CryptoError::UnsupportedKeyType {
                key_type: info.key_type.to_string(),
                algorithm: info.algorithm.to_string(),
            });
        }
        if info.key_type.is_private() {
            let public_id = public_key_id(key_id);
            if self.registry.contains_key(&public_id) {
                return self.export_public_key(&public_id);
            }
            let key = self.get_key(key_id)?;
            return rsa::public_pem_from_private(key.material());
        }
        let key = self.get_key(key_id)?;
        String::from_utf8(key.material().to_vec())
            .map_err(|_| CryptoError::InvalidKeyMaterial(format!("{} is not PEM text", key_id)))
    }

    /// 登记对端的 PEM 公钥，返回新的密钥 ID。
    ///
    /// `signing_public` 登记为 `rsa_pss`，`asymmetric_public` 登记为 `hybrid_rsa_aes`；
    /// RSA 系列密钥在各 RSA 算法之间通用。
    pub fn import_public_key(&self, pem: &str, key_type: KeyType) -> Result<String> {
        let algorithm = match key_type {
            KeyType::SigningPublic => Algorithm::RsaPss,
            KeyType::AsymmetricPublic => Algorithm::HybridRsaAes,
            other => {
                return Err(CryptoError::UnsupportedKeyType {
                    key_type: other.to_string(),
                    algorithm: "rsa".to_string(),
                });
            }
        };
        let public_key = rsa::parse_public_key(pem.as_bytes())?;
        let normalized = rsa::export_public_pem(&public_key)?;

        let mut metadata = Metadata::new();
        metadata.insert("imported".to_string(), true.into());
        let info = KeyInfo {
            key_id: Uuid::new_v4().to_string(),
            key_type,
            algorithm,
            created_at: Utc::now(),
            expires_at: None,
            usage_count: 0,
            max_usage: None,
            metadata,
        };
        let key_id = info.key_id.clone();
        self.insert(info, normalized.as_bytes())?;
        info!(key_id = %key_id, key_type = %key_type, "imported public key");
        Ok(key_id)
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("keys", &self.registry.len())
            .finish_non_exhaustive()
    }
}
