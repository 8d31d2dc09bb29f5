//!
//! # 点对点安全消息测试
//!
//! 两个互相独立的管理器（各自的主密钥和注册表）交换公钥后收发安全消息。
//!

mod common;

use common::{flip, manager};
use seal_keyring::keys::public_key_id;
use seal_keyring::{Algorithm, CryptoError, EncryptionManager, KeyType};
use serde_json::json;

struct Peer {
    manager: EncryptionManager,
    /// 用于接收消息的混合加密私钥
    inbox: String,
    /// 用于签名的私钥
    signer: String,
}

impl Peer {
    fn new() -> Self {
        let manager = manager();
        let inbox = manager
            .generate_key(Algorithm::HybridRsaAes, KeyType::AsymmetricPrivate, None, None)
            .unwrap();
        let signer = manager
            .generate_key(Algorithm::RsaPss, KeyType::SigningPrivate, None, None)
            .unwrap();
        Self {
            manager,
            inbox,
            signer,
        }
    }
}

/// 双方互相登记对方的公钥，返回 (alice 登记的 bob 收件公钥, bob 登记的 alice 签名公钥)
fn exchange(alice: &Peer, bob: &Peer) -> (String, String) {
    let bob_inbox_pem = bob.manager.export_public_key(&bob.inbox).unwrap();
    let alice_signer_pem = alice.manager.export_public_key(&alice.signer).unwrap();
    let bob_inbox = alice
        .manager
        .import_public_key(&bob_inbox_pem, KeyType::AsymmetricPublic)
        .unwrap();
    let alice_signer = bob
        .manager
        .import_public_key(&alice_signer_pem, KeyType::SigningPublic)
        .unwrap();
    (bob_inbox, alice_signer)
}

#[test]
fn test_secure_message_between_peers() {
    let alice = Peer::new();
    let bob = Peer::new();
    let (bob_inbox, alice_signer) = exchange(&alice, &bob);

    let content = json!({
        "booking_id": "BK-2024-0917",
        "guests": ["A. Traveller", "B. Traveller"],
        "total": 1840.5
    });
    let envelope = alice
        .manager
        .messages()
        .create_secure_message(content.clone(), &bob_inbox, &alice.signer, "booking_update")
        .unwrap();

    // 经过 JSON 线路格式传输
    let wire = envelope.to_json().unwrap();
    let received = seal_keyring::EncryptedData::from_json(&wire).unwrap();

    let message = bob
        .manager
        .messages()
        .decrypt_secure_message(&received, &bob.inbox, &alice_signer)
        .unwrap();
    assert_eq!(message.content, content);
    assert_eq!(message.message_type, "booking_update");
    assert_eq!(message.sender_id, alice.signer);
}

#[test]
fn test_tampered_envelope_rejected_before_decryption() {
    let alice = Peer::new();
    let bob = Peer::new();
    let (bob_inbox, alice_signer) = exchange(&alice, &bob);

    let envelope = alice
        .manager
        .messages()
        .create_secure_message(json!("hello"), &bob_inbox, &alice.signer, "note")
        .unwrap();

    let mut tampered = envelope.clone();
    let last = tampered.ciphertext.len() - 1;
    flip(&mut tampered.ciphertext, last);
    assert!(matches!(
        bob.manager
            .messages()
            .decrypt_secure_message(&tampered, &bob.inbox, &alice_signer),
        Err(CryptoError::SignatureVerificationFailure)
    ));

    let mut bad_signature = envelope.clone();
    if let Some(signature) = bad_signature.signature.as_mut() {
        flip(signature, 0);
    }
    assert!(matches!(
        bob.manager
            .messages()
            .decrypt_secure_message(&bad_signature, &bob.inbox, &alice_signer),
        Err(CryptoError::SignatureVerificationFailure)
    ));

    // 拒绝发生在解密之前：收件私钥的使用次数没有增加
    assert_eq!(bob.manager.get_key_info(&bob.inbox).unwrap().usage_count, 0);
}

#[test]
fn test_unsigned_envelope_rejected() {
    let alice = Peer::new();
    let bob = Peer::new();
    let (bob_inbox, alice_signer) = exchange(&alice, &bob);

    let mut envelope = alice
        .manager
        .messages()
        .create_secure_message(json!({"k": 1}), &bob_inbox, &alice.signer, "note")
        .unwrap();
    envelope.signature = None;
    assert!(matches!(
        bob.manager
            .messages()
            .decrypt_secure_message(&envelope, &bob.inbox, &alice_signer),
        Err(CryptoError::SignatureVerificationFailure)
    ));
}

#[test]
fn test_wrong_sender_key_rejected() {
    let alice = Peer::new();
    let bob = Peer::new();
    let mallory = Peer::new();
    let (bob_inbox, _) = exchange(&alice, &bob);
    let mallory_signer = bob
        .manager
        .import_public_key(
            &mallory.manager.export_public_key(&mallory.signer).unwrap(),
            KeyType::SigningPublic,
        )
        .unwrap();

    let envelope = alice
        .manager
        .messages()
        .create_secure_message(json!("from alice"), &bob_inbox, &alice.signer, "note")
        .unwrap();
    assert!(matches!(
        bob.manager
            .messages()
            .decrypt_secure_message(&envelope, &bob.inbox, &mallory_signer),
        Err(CryptoError::SignatureVerificationFailure)
    ));
}

#[test]
fn test_signature_integrity() {
    let alice = Peer::new();
    let data = b"fare table v3".to_vec();
    let signature = alice.manager.sign_data(&data, &alice.signer).unwrap();
    let public = public_key_id(&alice.signer);
    assert!(alice.manager.verify_signature(&data, &signature, &public));

    let mut altered = data.clone();
    flip(&mut altered, 5);
    assert!(!alice.manager.verify_signature(&altered, &signature, &public));
    assert!(!alice.manager.verify_signature(&data, b"not a signature", &public));
}

#[test]
fn test_rsa_oaep_size_bound() {
    let alice = Peer::new();
    let key = alice
        .manager
        .generate_key(Algorithm::RsaOaep, KeyType::AsymmetricPrivate, None, None)
        .unwrap();

    let ok = vec![7u8; 190];
    let encrypted = alice
        .manager
        .encrypt(&ok, Algorithm::RsaOaep, Some(&key), None)
        .unwrap();
    assert_eq!(alice.manager.decrypt(&encrypted).unwrap(), ok);

    assert!(matches!(
        alice
            .manager
            .encrypt(&[7u8; 200], Algorithm::RsaOaep, Some(&key), None),
        Err(CryptoError::PayloadTooLargeForAsymmetric { max: 190, actual: 200 })
    ));
}

#[test]
fn test_hybrid_large_payload_and_envelope_layout() {
    let alice = Peer::new();
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let encrypted = alice
        .manager
        .encrypt(&payload, Algorithm::HybridRsaAes, Some(&alice.inbox), None)
        .unwrap();

    let (wrapped_key, body) =
        seal_keyring::asymmetric::systems::hybrid::rsa_aes::split_envelope(&encrypted.ciphertext)
            .unwrap();
    assert_eq!(wrapped_key.len(), 256);
    assert_eq!(&encrypted.ciphertext[..4], &256u32.to_be_bytes());
    assert_eq!(body.len(), payload.len());
    assert_eq!(alice.manager.decrypt(&encrypted).unwrap(), payload);
}
