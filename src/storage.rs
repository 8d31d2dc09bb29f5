//! 包装后密钥注册表的持久化层。
// English: Persistence layer for the wrapped key registry.

pub mod file_storage;
pub mod memory;
pub mod traits;

pub use file_storage::FileKeyStore;
pub use memory::InMemoryKeyStore;
pub use traits::KeyStore;
