//! 混合（信封）加密：RSA 封装一次性 AES 密钥

pub mod rsa_aes;

pub use self::rsa_aes::HybridRsaAesSystem;
