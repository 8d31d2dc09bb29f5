//! # Seal-Keyring: 多算法加密与密钥管理核心
//!
//! `seal-keyring` 把密钥生命周期、主密钥包装、混合信封加密、签名与安全消息协议
//! 组合到一个显式构造的上下文对象 [`EncryptionManager`] 中。
//!
//! ## 核心概念
//!
//! - **`EncryptionManager`**: 启动时用 [`MasterKey`] 和 [`ConfigFile`] 构造一次，对外提供
//!   `encrypt` / `decrypt` / `sign_data` / `rotate_key` 等全部操作。
//! - **`KeyManager`**: 唯一接触原始密钥字节的组件，注册表中只保存主密钥包装后的密钥。
//! - **`AlgorithmAdapter`**: 每个算法一个无状态实现，全部基于 RustCrypto 生态。
//! - **`KeyStore`**: 包装后注册表的持久化后端，内置内存与单文件两种实现。
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seal_keyring::{Algorithm, ConfigFile, EncryptionManager, KeyType, MasterKey};
//!
//! fn main() -> seal_keyring::Result<()> {
//!     let manager = EncryptionManager::new(ConfigFile::default(), MasterKey::generate()?)?;
//!
//!     let key_id = manager.generate_key(Algorithm::Aes256Gcm, KeyType::Symmetric, None, None)?;
//!     let encrypted = manager.encrypt(b"Confidential booking note", Algorithm::Aes256Gcm, Some(&key_id), None)?;
//!     let wire = encrypted.to_json()?;
//!
//!     let decrypted = manager.decrypt(&seal_keyring::EncryptedData::from_json(&wire)?)?;
//!     assert_eq!(decrypted, b"Confidential booking note");
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod asymmetric;
pub mod common;
pub mod data;
pub mod engine;
pub mod engines;
pub mod keys;
pub mod message;
pub mod rotation;
pub mod signing;
pub mod storage;
pub mod symmetric;

pub use adapter::{AlgorithmAdapter, adapter_for};
pub use common::{ConfigFile, CryptoConfig, CryptoError, Result, StorageConfig};
pub use data::{Algorithm, EncryptedData, KeyType, Metadata};
pub use engine::EncryptionManager;
pub use keys::{EncryptionKey, KeyInfo, KeyManager, KeyOptions, MasterKey};
pub use message::{MessageStage, SecureMessage, SecureMessageProtocol};
pub use rotation::{KeyLifecycle, RotationPolicy};
pub use signing::SigningService;
pub use storage::{FileKeyStore, InMemoryKeyStore, KeyStore};

#[cfg(feature = "async-engine")]
pub use engines::AsyncEncryptionManager;

/// The version of the `seal-keyring` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
