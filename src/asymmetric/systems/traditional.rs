//! 传统非对称加密（RSA）

pub mod rsa;

pub use self::rsa::RsaOaepSystem;
