#![cfg(feature = "async-engine")]

use crate::common::errors::{CryptoError, Result};
use crate::data::{Algorithm, EncryptedData, KeyType, Metadata};
use crate::engine::EncryptionManager;
use chrono::Duration;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::warn;

/// `AsyncEncryptionManager`：`EncryptionManager` 的异步门面。
///
/// 所有加解密都是 CPU 密集型的同步调用，这里把每次调用放到 tokio 的阻塞线程池中执行，
/// 避免占用异步工作线程。
#[derive(Clone)]
pub struct AsyncEncryptionManager {
    inner: Arc<EncryptionManager>,
}

impl AsyncEncryptionManager {
    pub fn new(inner: Arc<EncryptionManager>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<EncryptionManager> {
        &self.inner
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&EncryptionManager) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(inner.as_ref()))
            .await
            .map_err(|e| CryptoError::Task(e.to_string()))?
    }

    pub async fn generate_key(
        &self,
        algorithm: Algorithm,
        key_type: KeyType,
        ttl: Option<Duration>,
        metadata: Option<Metadata>,
    ) -> Result<String> {
        self.run(move |m| m.generate_key(algorithm, key_type, ttl, metadata))
            .await
    }

    pub async fn encrypt(
        &self,
        data: Vec<u8>,
        algorithm: Algorithm,
        key_id: Option<String>,
        aad: Option<Vec<u8>>,
    ) -> Result<EncryptedData> {
        self.run(move |m| m.encrypt(&data, algorithm, key_id.as_deref(), aad.as_deref()))
            .await
    }

    pub async fn decrypt(&self, data: EncryptedData) -> Result<Vec<u8>> {
        self.run(move |m| m.decrypt(&data)).await
    }

    pub async fn encrypt_batch(
        &self,
        items: Vec<Vec<u8>>,
        algorithm: Algorithm,
        key_id: Option<String>,
    ) -> Result<Vec<EncryptedData>> {
        self.run(move |m| m.encrypt_batch(&items, algorithm, key_id.as_deref()))
            .await
    }

    pub async fn sign_data(&self, data: Vec<u8>, signing_key_id: String) -> Result<Vec<u8>> {
        self.run(move |m| m.sign_data(&data, &signing_key_id)).await
    }

    /// 后台任务失败时同样返回 `false`
    pub async fn verify_signature(
        &self,
        data: Vec<u8>,
        signature: Vec<u8>,
        public_key_id: String,
    ) -> bool {
        self.run(move |m| Ok(m.verify_signature(&data, &signature, &public_key_id)))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "signature verification task failed");
                false
            })
    }

    pub async fn rotate_key(&self, key_id: String) -> Result<String> {
        self.run(move |m| m.rotate_key(&key_id)).await
    }

    pub async fn derive_key(
        &self,
        password: SecretString,
        salt: Option<Vec<u8>>,
        iterations: Option<u32>,
    ) -> Result<(String, Vec<u8>)> {
        self.run(move |m| m.derive_key(&password, salt.as_deref(), iterations))
            .await
    }

    pub async fn secure_delete_key(&self, key_id: String) -> bool {
        self.run(move |m| Ok(m.secure_delete_key(&key_id)))
            .await
            .unwrap_or(false)
    }
}
