//!
//! 集成测试的通用辅助函数
//!
#![allow(dead_code)]

use seal_keyring::{ConfigFile, EncryptionManager, MasterKey};

/// 内存存储、默认配置的管理器
pub fn manager() -> EncryptionManager {
    manager_with(ConfigFile::default())
}

pub fn manager_with(config: ConfigFile) -> EncryptionManager {
    EncryptionManager::new(config, MasterKey::generate().unwrap()).unwrap()
}

/// 翻转指定位置的一个字节
pub fn flip(bytes: &mut [u8], index: usize) {
    bytes[index] ^= 0x01;
}
