//! In-process `KeyStore`, the default when no key store path is configured.
// 中文: 进程内的 `KeyStore`，未配置持久化路径时的默认实现。

use super::traits::KeyStore;
use crate::common::errors::Result;
use crate::keys::record::StoredKey;
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryKeyStore {
    records: DashMap<String, StoredKey>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn save(&self, record: &StoredKey) -> Result<()> {
        self.records
            .insert(record.info.key_id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, key_id: &str) -> Result<bool> {
        Ok(self.records.remove(key_id).is_some())
    }

    fn load_all(&self) -> Result<Vec<StoredKey>> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}
