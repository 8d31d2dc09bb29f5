//! Single-file JSON `KeyStore`.
// 中文: 单文件 JSON 形式的 `KeyStore`。

use super::traits::KeyStore;
use crate::common::errors::{CryptoError, Result};
use crate::keys::record::StoredKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const REGISTRY_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Default)]
struct RegistryFile {
    version: u32,
    keys: BTreeMap<String, StoredKey>,
}

/// Persists the wrapped registry as one JSON document.
///
/// Every mutation rewrites the whole file through a temporary file and a
/// rename, so a crash never leaves a half-written registry behind.
///
/// 中文: 将包装后的注册表整体保存为一个 JSON 文档。
/// 每次修改都先写临时文件再重命名，崩溃时不会留下写了一半的注册表。
pub struct FileKeyStore {
    path: PathBuf,
    keys: Mutex<BTreeMap<String, StoredKey>>,
}

impl FileKeyStore {
    /// Opens the registry at `path`, creating parent directories as needed.
    /// A missing file is treated as an empty registry.
    ///
    /// 中文: 打开 `path` 处的注册表，必要时创建父目录；文件不存在视为空注册表。
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let keys = if path.exists() {
            let json = fs::read_to_string(&path)?;
            let file: RegistryFile = serde_json::from_str(&json)?;
            if file.version != REGISTRY_VERSION {
                return Err(CryptoError::Storage(format!(
                    "unsupported registry version {}",
                    file.version
                )));
            }
            file.keys
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            keys: Mutex::new(keys),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, keys: &BTreeMap<String, StoredKey>) -> Result<()> {
        let file = RegistryFile {
            version: REGISTRY_VERSION,
            keys: keys.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        // Atomic write: the temp file is synced before the rename.
        // 中文: 原子写入：临时文件先落盘再重命名。
        let temp_path = self.path.with_extension("tmp");
        let mut temp = File::create(&temp_path)?;
        temp.write_all(json.as_bytes())?;
        temp.sync_all()?;
        drop(temp);
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredKey>> {
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyStore for FileKeyStore {
    fn save(&self, record: &StoredKey) -> Result<()> {
        let mut keys = self.lock();
        let previous = keys.insert(record.info.key_id.clone(), record.clone());
        if let Err(e) = self.persist(&keys) {
            // 写盘失败时回滚内存状态
            match previous {
                Some(prev) => keys.insert(record.info.key_id.clone(), prev),
                None => keys.remove(&record.info.key_id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn delete(&self, key_id: &str) -> Result<bool> {
        let mut keys = self.lock();
        let Some(previous) = keys.remove(key_id) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&keys) {
            keys.insert(key_id.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    fn load_all(&self) -> Result<Vec<StoredKey>> {
        Ok(self.lock().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Algorithm, KeyType, Metadata};
    use crate::keys::record::{KeyInfo, WrappedKey};
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(id: &str) -> StoredKey {
        StoredKey {
            info: KeyInfo {
                key_id: id.to_string(),
                key_type: KeyType::Symmetric,
                algorithm: Algorithm::ChaCha20Poly1305,
                created_at: Utc::now(),
                expires_at: None,
                usage_count: 2,
                max_usage: Some(10),
                metadata: Metadata::new(),
            },
            wrapped: WrappedKey {
                iv: vec![1; 12],
                tag: vec![2; 16],
                ciphertext: vec![3; 32],
            },
        }
    }

    #[test]
    fn test_save_reopen_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("keys.json");
        let a = record("a");
        let b = record("b");

        let store = FileKeyStore::open(&path).unwrap();
        store.save(&a).unwrap();
        store.save(&b).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let reopened = FileKeyStore::open(&path).unwrap();
        let loaded = reopened.load_all().unwrap();
        assert_eq!(loaded, vec![a, b]);

        assert!(reopened.delete("a").unwrap());
        assert!(!reopened.delete("a").unwrap());
        assert_eq!(FileKeyStore::open(&path).unwrap().load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_stale_temp_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        let store = FileKeyStore::open(&path).unwrap();
        store.save(&record("a")).unwrap();

        // 上次写入中断留下的半截临时文件
        fs::write(path.with_extension("tmp"), "{\"version\":1,\"ke").unwrap();
        store.save(&record("b")).unwrap();

        assert!(!path.with_extension("tmp").exists());
        let loaded = FileKeyStore::open(&path).unwrap().load_all().unwrap();
        let ids: Vec<_> = loaded.iter().map(|r| r.info.key_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(&path, r#"{"version":99,"keys":{}}"#).unwrap();
        assert!(matches!(
            FileKeyStore::open(&path),
            Err(CryptoError::Storage(_))
        ));
    }

    #[test]
    fn test_file_never_contains_plain_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        let store = FileKeyStore::open(&path).unwrap();
        store.save(&record("a")).unwrap();

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"wrapped\""));
        assert!(!json.contains("material"));
    }
}
