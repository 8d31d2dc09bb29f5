//!
//! # 通用配置模块
//!
//! 包含加密管理器所使用的核心配置结构。
//! 这些结构定义了加密参数、密钥轮换策略和存储行为。
//!
use crate::common::errors::Result;
use crate::rotation::RotationPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 加密参数
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CryptoConfig {
    /// RSA 密钥位数
    #[serde(default = "default_rsa_key_bits")]
    pub rsa_key_bits: usize,
    /// PBKDF2 默认迭代次数
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
    /// 口令派生时随机盐的长度
    #[serde(default = "default_salt_len")]
    pub salt_len: usize,
}

fn default_rsa_key_bits() -> usize {
    2048
}

fn default_pbkdf2_iterations() -> u32 {
    100_000
}

fn default_salt_len() -> usize {
    32
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            rsa_key_bits: default_rsa_key_bits(),
            pbkdf2_iterations: default_pbkdf2_iterations(),
            salt_len: default_salt_len(),
        }
    }
}

/// 存储配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// 包装后密钥注册表的持久化文件；为 `None` 时只保存在内存
    #[serde(default)]
    pub key_store_path: Option<PathBuf>,
    /// 安全删除时随机覆写的遍数
    #[serde(default = "default_secure_delete_passes")]
    pub secure_delete_passes: u8,
}

fn default_secure_delete_passes() -> u8 {
    3
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_store_path: None,
            secure_delete_passes: default_secure_delete_passes(),
        }
    }
}

/// 完整配置文件
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfigFile {
    /// 加密配置
    #[serde(default)]
    pub crypto: CryptoConfig,
    /// 轮换配置
    #[serde(default)]
    pub rotation: RotationPolicy,
    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,
}

impl ConfigFile {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 从 JSON 文件加载配置，缺失的字段取默认值
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
