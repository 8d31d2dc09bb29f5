//! Traits for abstracting key persistence.
// 中文: 用于抽象密钥持久化的 Trait。

use crate::common::errors::Result;
use crate::keys::record::StoredKey;

/// Durable backing store for the wrapped key registry.
///
/// Implementations only ever see `StoredKey` records, whose key bytes are
/// already wrapped under the master key. Plaintext key material never
/// reaches a store. A database, KMS or Vault adapter implements this trait
/// outside the crate.
///
/// 中文: 包装后密钥注册表的持久化后端。
///
/// 实现者只会拿到已被主密钥包装的 `StoredKey` 记录，明文密钥永远不会到达存储层。
pub trait KeyStore: Send + Sync + 'static {
    /// Inserts or replaces the record for `record.info.key_id`.
    /// 中文: 插入或覆盖 `record.info.key_id` 对应的记录。
    fn save(&self, record: &StoredKey) -> Result<()>;

    /// Removes a record. Returns `false` if it did not exist.
    /// 中文: 删除记录；不存在时返回 `false`。
    fn delete(&self, key_id: &str) -> Result<bool>;

    /// Loads every stored record.
    /// 中文: 加载全部记录。
    fn load_all(&self) -> Result<Vec<StoredKey>>;
}
