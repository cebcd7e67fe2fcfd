use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use shared::domain::UserId;

fn user(id: &str) -> UserRecord {
    UserRecord {
        id: UserId::new(id),
        email: format!("{id}@x.com"),
        display_name: "A B".to_string(),
        avatar_url: String::new(),
    }
}

#[derive(Default)]
struct CountingTokenProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenProvider for CountingTokenProvider {
    async fn get_token(&self, _session: &Session) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some("counted".to_string()))
    }
}

#[test]
fn gate_requires_both_flags_and_a_user() {
    let mut session = Session::default();
    assert!(!session.is_ready());

    session.user_loaded = true;
    session.token_loaded = true;
    assert!(!session.is_ready());

    session.user = Some(user("user_1"));
    assert!(session.is_ready());

    session.token_loaded = false;
    assert!(!session.is_ready());
}

#[tokio::test]
async fn closed_gate_never_consults_the_token_provider() {
    let provider = Arc::new(CountingTokenProvider::default());
    let handle = SessionHandle::new(provider.clone());

    assert_eq!(handle.bearer_token().await.expect("token"), None);
    handle.set_user(Some(user("user_1")));
    assert_eq!(handle.bearer_token().await.expect("token"), None);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

    handle.set_token_loaded(true);
    assert_eq!(
        handle.bearer_token().await.expect("token").as_deref(),
        Some("counted")
    );
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn subscribers_observe_sign_in_and_sign_out() {
    let handle = SessionHandle::new(Arc::new(StaticTokenProvider::new("t")));
    let mut updates = handle.subscribe();
    assert!(!updates.borrow_and_update().is_ready());

    handle.sign_in(user("user_1"));
    updates.changed().await.expect("signed in");
    assert!(updates.borrow_and_update().is_ready());
    assert_eq!(
        handle.current_user().map(|u| u.id),
        Some(UserId::new("user_1"))
    );

    handle.sign_out();
    updates.changed().await.expect("signed out");
    assert!(!updates.borrow_and_update().is_ready());
    assert!(handle.current_user().is_none());
}

#[tokio::test]
async fn empty_static_provider_yields_no_token() {
    let handle = SessionHandle::new(Arc::new(StaticTokenProvider::empty()));
    handle.sign_in(user("user_1"));
    assert_eq!(handle.bearer_token().await.expect("token"), None);
}

#[derive(Debug, Deserialize)]
struct DecodedClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

#[tokio::test]
async fn jwt_provider_mints_token_for_session_user() {
    let provider = JwtTokenProvider::new(b"shared-secret", 60);
    let mut session = Session {
        user_loaded: true,
        token_loaded: true,
        user: Some(user("user_42")),
        ..Session::default()
    };

    let token = provider
        .get_token(&session)
        .await
        .expect("mint")
        .expect("token");
    let decoded = decode::<DecodedClaims>(
        &token,
        &DecodingKey::from_secret(b"shared-secret"),
        &Validation::default(),
    )
    .expect("decode");
    assert_eq!(decoded.claims.sub, "user_42");
    assert_eq!(decoded.claims.exp - decoded.claims.iat, 60);

    session.user = None;
    assert!(provider.get_token(&session).await.expect("mint").is_none());
}

#[tokio::test]
async fn jwt_provider_rejects_out_of_range_ttl() {
    let session = Session {
        user_loaded: true,
        token_loaded: true,
        user: Some(user("user_42")),
        ..Session::default()
    };

    for ttl in [i64::MAX, i64::MIN] {
        let provider = JwtTokenProvider::new(b"shared-secret", ttl);
        let err = provider.get_token(&session).await.expect_err("ttl overflow");
        assert!(err.to_string().contains("out of range"));
    }
}

#[test]
fn every_gate_opening_is_counted() {
    let handle = SessionHandle::new(Arc::new(StaticTokenProvider::new("t")));
    assert_eq!(handle.snapshot().opened, 0);

    handle.sign_in(user("user_1"));
    handle.sign_in(user("user_2"));
    assert_eq!(handle.snapshot().opened, 1);

    handle.sign_out();
    handle.sign_in(user("user_1"));
    assert_eq!(handle.snapshot().opened, 2);

    handle.set_token_loaded(false);
    handle.set_token_loaded(true);
    assert_eq!(handle.snapshot().opened, 3);
}
