//! # Verification Scenario Tests
//!
//! Edge cases and attack shapes that span several components.
//!
//! ## Scenarios Covered
//!
//! 1. **Replay**: window boundaries in both directions, timestamp formats
//! 2. **Forgery**: swapped keys, reused signatures, malleated signatures
//! 3. **Edge Cases**: case-insensitive digests, custom configuration
//! 4. **Recovery**: behaviour after failures and deactivation

use chrono::{Duration, SecondsFormat, Utc};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use provenance_core::{
    FailureReason, Provenance, ProvenanceConfig, PublicKeyInput, RegisterRequest,
    VerificationRequest,
};
use provenance_crypto::codec::encode_base64;
use rand::rngs::OsRng;

fn register(provenance: &Provenance, key_id: &str) -> SigningKey {
    let signing_key = SigningKey::random(&mut OsRng);
    let point = signing_key.verifying_key().to_encoded_point(true);
    provenance
        .register(&RegisterRequest {
            installation_id: format!("install-{}", key_id),
            device_model: "iPhone 15".to_string(),
            os_name: Some("iOS".to_string()),
            os_version: Some("18.1".to_string()),
            public_key: PublicKeyInput {
                id: key_id.to_string(),
                bytes: encode_base64(point.as_bytes()),
                algorithm: "secp256k1".to_string(),
                fingerprint: None,
            },
            device_fingerprint: format!("device-{}", key_id),
        })
        .unwrap();
    signing_key
}

fn sign(signing_key: &SigningKey, digest_hex: &str) -> String {
    let digest = hex::decode(digest_hex).unwrap();
    let signature: Signature = signing_key.sign_prehash(&digest).unwrap();
    encode_base64(&signature.to_bytes())
}

fn digest(seed: u8) -> String {
    hex::encode([seed; 64])
}

// =============================================================================
// REPLAY SCENARIOS
// =============================================================================

#[test]
fn test_scenario_replay_window_edges() {
    let provenance = Provenance::temporary().unwrap();
    let key = register(&provenance, "k1");
    let content = digest(1);
    let signature = sign(&key, &content);
    let now = Utc::now();

    let cases = [
        (-299, true),
        (299, true),
        (-300, true),
        (300, true),
        (-301, false),
        (301, false),
    ];

    for (offset, accepted) in cases {
        let claimed = (now + Duration::seconds(offset)).to_rfc3339();
        let request = VerificationRequest::new(&content, &signature, "k1", claimed);
        let verdict = provenance.verify_image_signature_at(&request, now).unwrap();

        assert_eq!(verdict.valid, accepted, "offset {}s", offset);
        if !accepted {
            assert_eq!(verdict.reason, Some(FailureReason::Stale));
            assert!(verdict.checks.digest_format);
            assert!(!verdict.checks.timestamp_valid);
        }
    }
}

#[test]
fn test_scenario_timestamp_formats() {
    let provenance = Provenance::temporary().unwrap();
    let key = register(&provenance, "k1");
    let content = digest(2);
    let signature = sign(&key, &content);
    let now = Utc::now();

    let accepted = [
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
        now.to_rfc3339_opts(SecondsFormat::Millis, false),
        now.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        now.with_timezone(&chrono::FixedOffset::east_opt(2 * 3600).unwrap())
            .to_rfc3339(),
    ];
    for claimed in accepted {
        let request = VerificationRequest::new(&content, &signature, "k1", &claimed);
        let verdict = provenance.verify_image_signature_at(&request, now).unwrap();
        assert!(verdict.valid, "rejected {}", claimed);
    }

    for claimed in ["", "0", "2026-13-45T99:00:00Z", "yesterday"] {
        let request = VerificationRequest::new(&content, &signature, "k1", claimed);
        let verdict = provenance.verify_image_signature_at(&request, now).unwrap();
        assert_eq!(verdict.reason, Some(FailureReason::Stale), "accepted {:?}", claimed);
    }
}

#[test]
fn test_scenario_replayed_signature_accepted_inside_window() {
    // Replay protection is the timestamp window; the same claim twice inside
    // it verifies twice and is logged twice.
    let provenance = Provenance::temporary().unwrap();
    let key = register(&provenance, "k1");
    let content = digest(3);
    let request =
        VerificationRequest::new(&content, sign(&key, &content), "k1", Utc::now().to_rfc3339());

    assert!(provenance.verify_image_signature(&request).unwrap().valid);
    assert!(provenance.verify_image_signature(&request).unwrap().valid);
    assert_eq!(provenance.stats().unwrap().valid, 2);
}

// =============================================================================
// FORGERY SCENARIOS
// =============================================================================

#[test]
fn test_scenario_signature_reused_for_other_content() {
    let provenance = Provenance::temporary().unwrap();
    let key = register(&provenance, "k1");
    let signature = sign(&key, &digest(4));

    let request =
        VerificationRequest::new(digest(5), &signature, "k1", Utc::now().to_rfc3339());
    let verdict = provenance.verify_image_signature(&request).unwrap();

    assert_eq!(verdict.reason, Some(FailureReason::SignatureMismatch));
}

#[test]
fn test_scenario_high_s_malleation_rejected() {
    let provenance = Provenance::temporary().unwrap();
    let key = register(&provenance, "k1");
    let content = digest(6);
    let raw = hex::decode(&content).unwrap();
    let signature: Signature = key.sign_prehash(&raw).unwrap();

    // (r, n - s) is the mirrored signature for the same key and digest
    let (r, s) = signature.split_scalars();
    let malleated = Signature::from_scalars(r.to_bytes(), (-*s).to_bytes()).unwrap();

    let request = VerificationRequest::new(
        &content,
        encode_base64(&malleated.to_bytes()),
        "k1",
        Utc::now().to_rfc3339(),
    );
    let verdict = provenance.verify_image_signature(&request).unwrap();

    assert!(!verdict.valid);
    assert_eq!(verdict.reason, Some(FailureReason::SignatureMismatch));
}

#[test]
fn test_scenario_every_signature_bit_matters() {
    let provenance = Provenance::temporary().unwrap();
    let key = register(&provenance, "k1");
    let content = digest(7);
    let raw = hex::decode(&content).unwrap();
    let signature: Signature = key.sign_prehash(&raw).unwrap();
    let bytes = signature.to_bytes().to_vec();
    let now = Utc::now();

    for byte in (0..64).step_by(9) {
        let mut tampered = bytes.clone();
        tampered[byte] ^= 0x80;
        let request =
            VerificationRequest::new(&content, encode_base64(&tampered), "k1", now.to_rfc3339());
        let verdict = provenance.verify_image_signature_at(&request, now).unwrap();
        assert!(!verdict.valid, "byte {} flip verified", byte);
    }
}

// =============================================================================
// EDGE CASES
// =============================================================================

#[test]
fn test_scenario_uppercase_digest() {
    let provenance = Provenance::temporary().unwrap();
    let key = register(&provenance, "k1");
    let content = hex::encode([0xabu8; 64]);
    let signature = sign(&key, &content);

    let request = VerificationRequest::new(
        content.to_uppercase(),
        signature,
        "k1",
        Utc::now().to_rfc3339(),
    );
    let verdict = provenance.verify_image_signature(&request).unwrap();

    assert!(verdict.valid);
    assert_eq!(verdict.content_digest, content.to_uppercase());
}

#[test]
fn test_scenario_custom_configuration() {
    let config = ProvenanceConfig::from_toml_str(
        r#"
        [storage]
        temporary = true

        [registry]
        display_prefix = "Camera-"

        [verification]
        replay_window_secs = 10
        record_raw_signature = false
        "#,
    )
    .unwrap();
    let provenance = Provenance::new(config).unwrap();
    let key = register(&provenance, "k1");
    let content = digest(8);
    let signature = sign(&key, &content);
    let now = Utc::now();

    let fresh =
        VerificationRequest::new(&content, &signature, "k1", now.to_rfc3339());
    let verdict = provenance.verify_image_signature_at(&fresh, now).unwrap();
    assert!(verdict.valid);
    assert_eq!(verdict.device.unwrap().display_name, "Camera-1");

    let late = VerificationRequest::new(
        &content,
        &signature,
        "k1",
        (now - Duration::seconds(11)).to_rfc3339(),
    );
    let verdict = provenance.verify_image_signature_at(&late, now).unwrap();
    assert_eq!(verdict.reason, Some(FailureReason::Stale));

    let entries = provenance.recent_attempts(2).unwrap();
    assert!(entries.iter().all(|e| e.attempt.raw_signature.is_none()));
}

#[test]
fn test_scenario_listing_order_and_summary() {
    let provenance = Provenance::temporary().unwrap();
    for key_id in ["c", "a", "b"] {
        register(&provenance, key_id);
    }

    let devices = provenance.list_devices().unwrap();
    let order: Vec<(&str, u64)> = devices
        .iter()
        .map(|d| (d.public_key_id.as_str(), d.sequence))
        .collect();
    assert_eq!(order, vec![("c", 1), ("a", 2), ("b", 3)]);

    let summary = provenance.fleet_summary().unwrap();
    assert_eq!(summary.total_devices, 3);
    assert_eq!(summary.latest.unwrap().display_name, "Device3");
}

// =============================================================================
// RECOVERY
// =============================================================================

#[test]
fn test_scenario_failures_do_not_block_later_success() {
    let provenance = Provenance::temporary().unwrap();
    let key = register(&provenance, "k1");
    let content = digest(9);
    let now = Utc::now();

    for _ in 0..5 {
        let garbage = VerificationRequest::new(&content, "AAAA", "k1", now.to_rfc3339());
        provenance.verify_image_signature_at(&garbage, now).unwrap();
    }

    let good = VerificationRequest::new(&content, sign(&key, &content), "k1", now.to_rfc3339());
    assert!(provenance.verify_image_signature_at(&good, now).unwrap().valid);

    let stats = provenance.stats().unwrap();
    assert_eq!(stats.total, 6);
    assert_eq!(stats.valid, 1);
    assert_eq!(stats.success_rate, 0.1667);
}

#[test]
fn test_scenario_deactivation_cycle() {
    let provenance = Provenance::temporary().unwrap();
    let key = register(&provenance, "k1");
    let content = digest(10);
    let now = Utc::now();
    let request = VerificationRequest::new(&content, sign(&key, &content), "k1", now.to_rfc3339());

    provenance.set_active("k1", false).unwrap();
    let verdict = provenance.verify_image_signature_at(&request, now).unwrap();
    assert_eq!(verdict.reason, Some(FailureReason::KeyNotFound));
    assert!(verdict.device.is_none());

    provenance.set_active("k1", true).unwrap();
    assert!(provenance.verify_image_signature_at(&request, now).unwrap().valid);

    // Both attempts are logged; only the active one is tied to the device
    assert_eq!(provenance.stats().unwrap().total, 2);
    assert_eq!(provenance.device_attempts("k1").unwrap().len(), 1);
}
