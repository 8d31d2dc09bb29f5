//!
//! # 端到端集成测试
//!
//! 覆盖每种算法的往返、AEAD 篡改检测、使用上限、口令派生与安全删除。
//!

mod common;

use common::{flip, manager};
use seal_keyring::keys::KeyOptions;
use seal_keyring::{Algorithm, CryptoError, EncryptedData, KeyType};
use secrecy::SecretString;

const ENCRYPTION_ALGORITHMS: [Algorithm; 7] = [
    Algorithm::Fernet,
    Algorithm::Aes256Gcm,
    Algorithm::Aes256Cbc,
    Algorithm::ChaCha20Poly1305,
    Algorithm::NaclSecretbox,
    Algorithm::RsaOaep,
    Algorithm::HybridRsaAes,
];

fn sample_sizes(algorithm: Algorithm) -> Vec<usize> {
    match algorithm {
        // 单次 RSA-OAEP 的上限
        Algorithm::RsaOaep => vec![0, 1, 190],
        _ => vec![0, 1, 64 * 1024],
    }
}

#[test]
fn test_roundtrip_every_algorithm() {
    let manager = manager();
    for algorithm in ENCRYPTION_ALGORITHMS {
        for size in sample_sizes(algorithm) {
            let plaintext: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let encrypted = manager.encrypt(&plaintext, algorithm, None, None).unwrap();
            assert_eq!(encrypted.algorithm, algorithm);

            let decrypted = manager.decrypt(&encrypted).unwrap();
            assert_eq!(decrypted, plaintext, "{} with {} bytes", algorithm, size);
        }
    }
}

#[test]
fn test_roundtrip_through_wire_format() {
    let manager = manager();
    for algorithm in ENCRYPTION_ALGORITHMS {
        let encrypted = manager
            .encrypt(b"wire format check", algorithm, None, None)
            .unwrap();
        let wire = encrypted.to_json().unwrap();
        let parsed = EncryptedData::from_json(&wire).unwrap();
        assert_eq!(parsed, encrypted);
        assert_eq!(manager.decrypt(&parsed).unwrap(), b"wire format check");
    }
}

#[test]
fn test_aead_tamper_detection() {
    let manager = manager();
    for algorithm in [Algorithm::Aes256Gcm, Algorithm::ChaCha20Poly1305] {
        let encrypted = manager
            .encrypt(b"twenty-four byte message", algorithm, None, None)
            .unwrap();

        for index in 0..encrypted.ciphertext.len() {
            let mut tampered = encrypted.clone();
            flip(&mut tampered.ciphertext, index);
            assert!(matches!(
                manager.decrypt(&tampered),
                Err(CryptoError::DecryptionAuthenticationFailure { .. })
            ));
        }

        let tag_len = encrypted.tag.as_ref().map(Vec::len).unwrap_or_default();
        assert_eq!(tag_len, 16);
        for index in 0..tag_len {
            let mut tampered = encrypted.clone();
            if let Some(tag) = tampered.tag.as_mut() {
                flip(tag, index);
            }
            assert!(matches!(
                manager.decrypt(&tampered),
                Err(CryptoError::DecryptionAuthenticationFailure { .. })
            ));
        }
    }
}

#[test]
fn test_fernet_token_tamper_detection() {
    let manager = manager();
    let encrypted = manager
        .encrypt(b"fernet payload", Algorithm::Fernet, None, None)
        .unwrap();
    assert!(encrypted.iv.is_none() && encrypted.tag.is_none());

    let mut tampered = encrypted.clone();
    let middle = tampered.ciphertext.len() / 2;
    tampered.ciphertext[middle] = if tampered.ciphertext[middle] == b'A' { b'B' } else { b'A' };
    assert!(matches!(
        manager.decrypt(&tampered),
        Err(CryptoError::DecryptionAuthenticationFailure { .. })
    ));
}

#[test]
fn test_confidential_booking_note() {
    let manager = manager();
    let key_id = manager
        .generate_key(Algorithm::Aes256Gcm, KeyType::Symmetric, None, None)
        .unwrap();
    let plaintext = b"Confidential booking note";

    let mut encrypted = manager
        .encrypt(plaintext, Algorithm::Aes256Gcm, Some(&key_id), None)
        .unwrap();
    assert_ne!(encrypted.ciphertext.as_slice(), plaintext.as_slice());
    assert_eq!(encrypted.iv.as_ref().map(Vec::len), Some(12));
    assert_eq!(manager.decrypt(&encrypted).unwrap(), plaintext);

    flip(&mut encrypted.ciphertext, 0);
    assert!(matches!(
        manager.decrypt(&encrypted),
        Err(CryptoError::DecryptionAuthenticationFailure { .. })
    ));
}

#[test]
fn test_usage_cap() {
    let manager = manager();
    let key_id = manager
        .generate_key_with(
            Algorithm::ChaCha20Poly1305,
            KeyType::Symmetric,
            KeyOptions {
                max_usage: Some(3),
                ..Default::default()
            },
        )
        .unwrap();

    for _ in 0..3 {
        manager
            .encrypt(b"x", Algorithm::ChaCha20Poly1305, Some(&key_id), None)
            .unwrap();
    }
    assert!(matches!(
        manager.encrypt(b"x", Algorithm::ChaCha20Poly1305, Some(&key_id), None),
        Err(CryptoError::KeyUsageExceeded { max_usage: 3, .. })
    ));
    assert_eq!(manager.get_key_info(&key_id).unwrap().usage_count, 3);
}

#[test]
fn test_usage_cap_spans_rsa_key_pair() {
    let manager = manager();
    let key_id = manager
        .generate_key_with(
            Algorithm::RsaOaep,
            KeyType::AsymmetricPrivate,
            KeyOptions {
                max_usage: Some(3),
                ..Default::default()
            },
        )
        .unwrap();

    // 加密用公钥材料，解密用私钥，两者共用私钥上的计数
    let first = manager
        .encrypt(b"seat 14A", Algorithm::RsaOaep, Some(&key_id), None)
        .unwrap();
    let second = manager
        .encrypt(b"seat 14B", Algorithm::RsaOaep, Some(&key_id), None)
        .unwrap();
    assert_eq!(manager.decrypt(&first).unwrap(), b"seat 14A");
    assert_eq!(manager.get_key_info(&key_id).unwrap().usage_count, 3);

    assert!(matches!(
        manager.decrypt(&second),
        Err(CryptoError::KeyUsageExceeded { max_usage: 3, .. })
    ));
    assert!(matches!(
        manager.encrypt(b"seat 14C", Algorithm::RsaOaep, Some(&key_id), None),
        Err(CryptoError::KeyUsageExceeded { max_usage: 3, .. })
    ));
}

#[test]
fn test_deterministic_derivation() {
    let manager = manager();
    let password = SecretString::from("correct horse battery staple".to_string());
    let (first, salt) = manager.derive_key(&password, None, Some(10_000)).unwrap();
    let (second, _) = manager
        .derive_key(&password, Some(&salt), Some(10_000))
        .unwrap();
    assert_ne!(first, second);

    // 两把密钥的字节相同：用一把加密，换另一把的 ID 也能解密
    let mut encrypted = manager
        .encrypt(b"derived", Algorithm::Aes256Gcm, Some(&first), None)
        .unwrap();
    assert_eq!(encrypted.salt.as_deref(), Some(salt.as_slice()));
    encrypted.key_id = second;
    assert_eq!(manager.decrypt(&encrypted).unwrap(), b"derived");

    let info = manager.get_key_info(&first).unwrap();
    assert_eq!(info.metadata["iterations"], 10_000);
    assert_eq!(info.algorithm, Algorithm::Aes256Gcm);
}

#[test]
fn test_list_and_info_never_expose_material() {
    let manager = manager();
    let symmetric = manager
        .generate_key(Algorithm::NaclSecretbox, KeyType::Symmetric, None, None)
        .unwrap();
    let signing = manager
        .generate_key(Algorithm::RsaPss, KeyType::SigningPrivate, None, None)
        .unwrap();

    let all = manager.list_keys(None, None, false);
    assert_eq!(all.len(), 3);
    let signing_keys = manager.list_keys(Some(KeyType::SigningPrivate), None, false);
    assert_eq!(signing_keys.len(), 1);
    assert_eq!(signing_keys[0].key_id, signing);

    let info = manager.get_key_info(&symmetric).unwrap();
    let json = serde_json::to_string(&info).unwrap();
    assert!(json.contains(&symmetric));
    assert!(!json.contains("material"));
}

#[test]
fn test_secure_delete() {
    let manager = manager();
    let key_id = manager
        .generate_key(Algorithm::Aes256Cbc, KeyType::Symmetric, None, None)
        .unwrap();
    let encrypted = manager
        .encrypt(b"to be shredded", Algorithm::Aes256Cbc, Some(&key_id), None)
        .unwrap();

    assert!(manager.secure_delete_key(&key_id));
    assert!(!manager.secure_delete_key(&key_id));
    assert!(matches!(
        manager.decrypt(&encrypted),
        Err(CryptoError::KeyNotFound { .. })
    ));
}

#[test]
fn test_batch_encryption() {
    let manager = manager();
    let items: Vec<Vec<u8>> = (0..32).map(|i| format!("item-{}", i).into_bytes()).collect();
    let encrypted = manager
        .encrypt_batch(&items, Algorithm::Aes256Gcm, None)
        .unwrap();
    assert_eq!(encrypted.len(), items.len());

    let key_id = &encrypted[0].key_id;
    assert!(encrypted.iter().all(|e| &e.key_id == key_id));
    assert_eq!(manager.get_key_info(key_id).unwrap().usage_count, 32);
    for (item, data) in items.iter().zip(&encrypted) {
        assert_eq!(&manager.decrypt(data).unwrap(), item);
    }
}

#[cfg(feature = "async-engine")]
#[tokio::test]
async fn test_async_facade() {
    use seal_keyring::AsyncEncryptionManager;
    use std::sync::Arc;

    let manager = AsyncEncryptionManager::new(Arc::new(manager()));
    let signing = manager
        .generate_key(Algorithm::RsaPss, KeyType::SigningPrivate, None, None)
        .await
        .unwrap();

    let signature = manager
        .sign_data(b"async".to_vec(), signing.clone())
        .await
        .unwrap();
    assert!(
        manager
            .verify_signature(b"async".to_vec(), signature, format!("{}_public", signing))
            .await
    );

    let encrypted = manager
        .encrypt(b"async".to_vec(), Algorithm::HybridRsaAes, None, Some(b"ctx".to_vec()))
        .await
        .unwrap();
    assert_eq!(manager.decrypt(encrypted).await.unwrap(), b"async");
}
