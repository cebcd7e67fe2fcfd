use super::*;
use chrono::TimeZone;
use shared::protocol::EventKind;

const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().expect("timestamp")
}

fn created_body() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "type": "user.created",
        "data": {
            "id": "user_1",
            "email_addresses": [{ "email_address": "a@x.com" }],
            "first_name": "A",
            "last_name": "B",
            "image_url": "https://img.example/a.png"
        }
    }))
    .expect("body")
}

fn signed_headers(verifier: &WebhookVerifier, sent_at: i64, body: &[u8]) -> WebhookHeaders {
    WebhookHeaders {
        id: Some("msg_1".to_string()),
        timestamp: Some(sent_at.to_string()),
        signature: Some(verifier.sign("msg_1", sent_at, body)),
    }
}

#[test]
fn matches_published_svix_vector() {
    let verifier = WebhookVerifier::new(SECRET).expect("verifier");
    let body = br#"{"test": 2432232314}"#;
    assert_eq!(
        verifier.sign("msg_p5jXN8AQM9LWM0D4loKWxJek", 1614265330, body),
        "v1,g0hM9SsE+OTPJTGt/tmIKtSyZlE3uFJELVlNIOLJ1OE="
    );

    let headers = WebhookHeaders {
        id: Some("msg_p5jXN8AQM9LWM0D4loKWxJek".to_string()),
        timestamp: Some("1614265330".to_string()),
        signature: Some("v1,g0hM9SsE+OTPJTGt/tmIKtSyZlE3uFJELVlNIOLJ1OE=".to_string()),
    };
    // Authentic, but not an identity event.
    let err = verifier
        .verify_at(&headers, body, at(1614265330))
        .expect_err("payload is not an event");
    assert!(matches!(err, VerifyError::InvalidPayload(_)));
    assert!(!err.is_unauthorized());
}

#[test]
fn accepts_signed_event_and_parses_it() {
    let verifier = WebhookVerifier::new(SECRET).expect("verifier");
    let body = created_body();
    let headers = signed_headers(&verifier, 1_700_000_000, &body);

    let event = verifier
        .verify_at(&headers, &body, at(1_700_000_010))
        .expect("verified");
    assert_eq!(event.kind, EventKind::Created);
    assert_eq!(event.subject_id().as_str(), "user_1");
}

#[test]
fn rejects_tampered_body() {
    let verifier = WebhookVerifier::new(SECRET).expect("verifier");
    let body = created_body();
    let headers = signed_headers(&verifier, 1_700_000_000, &body);

    let mut tampered = body.clone();
    let last = tampered.len() - 2;
    tampered[last] = b' ';
    let err = verifier
        .verify_at(&headers, &tampered, at(1_700_000_000))
        .expect_err("tampered");
    assert!(matches!(err, VerifyError::InvalidSignature));
    assert!(err.is_unauthorized());
}

#[test]
fn rejects_signature_from_another_secret() {
    let verifier = WebhookVerifier::new(SECRET).expect("verifier");
    let impostor = WebhookVerifier::new("whsec_c2VjcmV0LWZyb20tZWxzZXdoZXJl").expect("impostor");
    let body = created_body();
    let headers = signed_headers(&impostor, 1_700_000_000, &body);

    let err = verifier
        .verify_at(&headers, &body, at(1_700_000_000))
        .expect_err("wrong secret");
    assert!(matches!(err, VerifyError::InvalidSignature));
}

#[test]
fn rejects_replayed_id_with_other_message_id() {
    let verifier = WebhookVerifier::new(SECRET).expect("verifier");
    let body = created_body();
    let mut headers = signed_headers(&verifier, 1_700_000_000, &body);
    headers.id = Some("msg_2".to_string());

    let err = verifier
        .verify_at(&headers, &body, at(1_700_000_000))
        .expect_err("misrouted");
    assert!(matches!(err, VerifyError::InvalidSignature));
}

#[test]
fn accepts_any_matching_entry_among_several() {
    let verifier = WebhookVerifier::new(SECRET).expect("verifier");
    let body = created_body();
    let mut headers = signed_headers(&verifier, 1_700_000_000, &body);
    let valid = headers.signature.take().expect("signature");
    headers.signature = Some(format!("v1,Zm9yZ2Vk v2,abc {valid}"));

    verifier
        .verify_at(&headers, &body, at(1_700_000_000))
        .expect("one entry matches");
}

#[test]
fn ignores_entries_with_unknown_version() {
    let verifier = WebhookVerifier::new(SECRET).expect("verifier");
    let body = created_body();
    let mut headers = signed_headers(&verifier, 1_700_000_000, &body);
    let valid = headers.signature.take().expect("signature");
    headers.signature = Some(valid.replacen("v1,", "v1a,", 1));

    let err = verifier
        .verify_at(&headers, &body, at(1_700_000_000))
        .expect_err("unknown version only");
    assert!(matches!(err, VerifyError::InvalidSignature));
}

#[test]
fn rejects_timestamps_outside_tolerance() {
    let verifier = WebhookVerifier::new(SECRET).expect("verifier");
    let body = created_body();
    let headers = signed_headers(&verifier, 1_700_000_000, &body);

    let stale = verifier
        .verify_at(&headers, &body, at(1_700_000_000 + 301))
        .expect_err("too old");
    assert!(matches!(stale, VerifyError::TimestampOutOfTolerance));

    let future = verifier
        .verify_at(&headers, &body, at(1_700_000_000 - 301))
        .expect_err("too new");
    assert!(matches!(future, VerifyError::TimestampOutOfTolerance));

    verifier
        .verify_at(&headers, &body, at(1_700_000_000 + 300))
        .expect("edge of window");
}

#[test]
fn custom_tolerance_is_honoured() {
    let verifier = WebhookVerifier::new(SECRET)
        .expect("verifier")
        .with_tolerance(Duration::from_secs(5));
    let body = created_body();
    let headers = signed_headers(&verifier, 1_700_000_000, &body);

    let err = verifier
        .verify_at(&headers, &body, at(1_700_000_006))
        .expect_err("outside narrow window");
    assert!(matches!(err, VerifyError::TimestampOutOfTolerance));
}

#[test]
fn reports_missing_and_malformed_headers() {
    let verifier = WebhookVerifier::new(SECRET).expect("verifier");
    let body = created_body();
    let complete = signed_headers(&verifier, 1_700_000_000, &body);

    let mut no_id = complete.clone();
    no_id.id = None;
    assert!(matches!(
        verifier.verify_at(&no_id, &body, at(1_700_000_000)),
        Err(VerifyError::MissingHeader(SVIX_ID_HEADER))
    ));

    let mut blank_signature = complete.clone();
    blank_signature.signature = Some("  ".to_string());
    assert!(matches!(
        verifier.verify_at(&blank_signature, &body, at(1_700_000_000)),
        Err(VerifyError::MissingHeader(SVIX_SIGNATURE_HEADER))
    ));

    let mut bad_timestamp = complete;
    bad_timestamp.timestamp = Some("yesterday".to_string());
    assert!(matches!(
        verifier.verify_at(&bad_timestamp, &body, at(1_700_000_000)),
        Err(VerifyError::InvalidTimestamp)
    ));
}

#[test]
fn secret_prefix_is_optional_and_validated() {
    let bare = WebhookVerifier::new("MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw").expect("bare secret");
    let prefixed = WebhookVerifier::new(SECRET).expect("prefixed secret");
    assert_eq!(bare.sign("m", 1, b"{}"), prefixed.sign("m", 1, b"{}"));

    assert!(matches!(
        WebhookVerifier::new("whsec_"),
        Err(SecretError::Empty)
    ));
    assert!(matches!(
        WebhookVerifier::new("whsec_not base64!"),
        Err(SecretError::InvalidBase64(_))
    ));
}
