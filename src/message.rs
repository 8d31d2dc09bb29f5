//! 安全消息协议：混合加密后对密文签名的点对点信封。
//!
//! 发送方：Draft → Encrypted → Signed → Sent
//! 接收方：Received → SignatureVerified | Rejected → Decrypted | Rejected
//!
//! 签名覆盖的是密文而不是明文，接收方在尝试解密之前先验证签名。

use crate::common::errors::{CryptoError, Result};
use crate::data::{Algorithm, EncryptedData};
use crate::engine::EncryptionManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// 加密前的结构化消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecureMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub content: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageStage {
    Draft,
    Encrypted,
    Signed,
    Sent,
    Received,
    SignatureVerified,
    Decrypted,
    Rejected,
}

impl MessageStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStage::Draft => "draft",
            MessageStage::Encrypted => "encrypted",
            MessageStage::Signed => "signed",
            MessageStage::Sent => "sent",
            MessageStage::Received => "received",
            MessageStage::SignatureVerified => "signature_verified",
            MessageStage::Decrypted => "decrypted",
            MessageStage::Rejected => "rejected",
        }
    }
}

impl fmt::Display for MessageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn stage(stage: MessageStage, key_id: &str) {
    debug!(stage = %stage, key_id = %key_id, "secure message");
}

pub struct SecureMessageProtocol<'a> {
    manager: &'a EncryptionManager,
}

impl<'a> SecureMessageProtocol<'a> {
    pub fn new(manager: &'a EncryptionManager) -> Self {
        Self { manager }
    }

    /// 构造消息，用接收方公钥做混合加密，再用发送方私钥对密文签名
    pub fn create_secure_message(
        &self,
        content: serde_json::Value,
        recipient_public_key_id: &str,
        sender_private_key_id: &str,
        message_type: &str,
    ) -> Result<EncryptedData> {
        let message = SecureMessage {
            message_type: message_type.to_string(),
            content,
            timestamp: Utc::now(),
            sender_id: sender_private_key_id.to_string(),
        };
        stage(MessageStage::Draft, sender_private_key_id);

        let payload = Zeroizing::new(serde_json::to_vec(&message)?);
        let encrypted = self.manager.encrypt(
            &payload,
            Algorithm::HybridRsaAes,
            Some(recipient_public_key_id),
            None,
        )?;
        stage(MessageStage::Encrypted, recipient_public_key_id);

        let signature = self
            .manager
            .sign_data(&encrypted.ciphertext, sender_private_key_id)?;
        stage(MessageStage::Signed, sender_private_key_id);

        let envelope = encrypted.with_signature(signature);
        stage(MessageStage::Sent, recipient_public_key_id);
        Ok(envelope)
    }

    /// 先验证密文签名，签名缺失或无效时直接拒绝，不尝试解密
    pub fn decrypt_secure_message(
        &self,
        envelope: &EncryptedData,
        recipient_private_key_id: &str,
        sender_public_key_id: &str,
    ) -> Result<SecureMessage> {
        stage(MessageStage::Received, recipient_private_key_id);
        if envelope.algorithm != Algorithm::HybridRsaAes {
            stage(MessageStage::Rejected, recipient_private_key_id);
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "secure messages use {}, got {}",
                Algorithm::HybridRsaAes,
                envelope.algorithm
            )));
        }

        let verified = envelope.signature.as_deref().is_some_and(|signature| {
            self.manager
                .verify_signature(&envelope.ciphertext, signature, sender_public_key_id)
        });
        if !verified {
            warn!(
                sender_key_id = %sender_public_key_id,
                signed = envelope.signature.is_some(),
                "secure message rejected"
            );
            stage(MessageStage::Rejected, recipient_private_key_id);
            return Err(CryptoError::SignatureVerificationFailure);
        }
        stage(MessageStage::SignatureVerified, recipient_private_key_id);

        let plaintext = self
            .manager
            .decrypt_with(envelope, recipient_private_key_id)
            .map(Zeroizing::new)
            .inspect_err(|_| stage(MessageStage::Rejected, recipient_private_key_id))?;
        let message: SecureMessage = serde_json::from_slice(&plaintext)?;
        stage(MessageStage::Decrypted, recipient_private_key_id);
        Ok(message)
    }
}
