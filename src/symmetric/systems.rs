//! # 对称加密系统模块
//!
//! 本模块是所有对称加密算法的"门面"(façade)。
//! 每个对称加密系统都应实现 `SymmetricCryptographicSystem` 特征。

pub mod aes_cbc;
pub mod aes_gcm;
pub mod chacha20;
pub mod fernet;
pub mod secretbox;

pub use self::aes_cbc::AesCbcSystem;
pub use self::aes_gcm::AesGcmSystem;
pub use self::chacha20::ChaCha20System;
pub use self::fernet::FernetSystem;
pub use self::secretbox::SecretBoxSystem;
