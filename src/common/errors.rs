use thiserror::Error;

/// 加密核心对调用方暴露的错误类型
///
/// 错误信息中只允许出现密钥 ID、算法名和失败类型，
/// 不得包含原始密钥、明文或派生出的秘密。
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("key not found: {key_id}")]
    KeyNotFound { key_id: String },

    #[error("key expired: {key_id}")]
    KeyExpired { key_id: String },

    #[error("key usage exceeded: {key_id} (max {max_usage})")]
    KeyUsageExceeded { key_id: String, max_usage: u64 },

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("decryption failed: authentication check did not pass ({algorithm})")]
    DecryptionAuthenticationFailure { algorithm: String },

    #[error("signature verification failed")]
    SignatureVerificationFailure,

    #[error("payload too large for asymmetric encryption: {actual} bytes (max {max})")]
    PayloadTooLargeForAsymmetric { max: usize, actual: usize },

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("key {key_id} is bound to {actual}, not {expected}")]
    KeyAlgorithmMismatch {
        key_id: String,
        expected: String,
        actual: String,
    },

    #[error("key type {key_type} cannot be used with {algorithm}")]
    UnsupportedKeyType { key_type: String, algorithm: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("ciphertext is malformed or truncated: {0}")]
    MalformedCiphertext(String),

    #[error("random source failure: {0}")]
    Random(String),

    #[error("key store error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

impl CryptoError {
    pub(crate) fn auth_failure(algorithm: impl ToString) -> Self {
        CryptoError::DecryptionAuthenticationFailure {
            algorithm: algorithm.to_string(),
        }
    }

    pub(crate) fn not_found(key_id: &str) -> Self {
        CryptoError::KeyNotFound {
            key_id: key_id.to_string(),
        }
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::Serialization(format!("Base64 decode error: {}", err))
    }
}

impl From<rand_core::OsError> for CryptoError {
    fn from(err: rand_core::OsError) -> Self {
        CryptoError::Random(err.to_string())
    }
}
