//! 非对称加密系统模块

pub mod hybrid;
pub mod traditional;

pub use self::hybrid::HybridRsaAesSystem;
pub use self::traditional::RsaOaepSystem;
