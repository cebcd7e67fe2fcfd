use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use shared::domain::UserRecord;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user_loaded: bool,
    pub token_loaded: bool,
    pub user: Option<UserRecord>,
    /// Bumped each time the gate goes from closed to open.
    pub opened: u64,
}

impl Session {
    /// The readiness gate. Nothing authorized is issued while this is false.
    pub fn is_ready(&self) -> bool {
        self.user_loaded && self.token_loaded && self.user.is_some()
    }
}

/// Supplies a bearer token for the current session on demand.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, session: &Session) -> Result<Option<String>>;
}

pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn empty() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _session: &Session) -> Result<Option<String>> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Serialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Mints a short-lived HS256 token per call, with the session user as `sub`.
pub struct JwtTokenProvider {
    key: EncodingKey,
    ttl_seconds: i64,
}

impl JwtTokenProvider {
    pub fn new(secret: &[u8], ttl_seconds: i64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl_seconds,
        }
    }
}

#[async_trait]
impl TokenProvider for JwtTokenProvider {
    async fn get_token(&self, session: &Session) -> Result<Option<String>> {
        let Some(user) = &session.user else {
            return Ok(None);
        };
        let now = Utc::now();
        let exp = Duration::try_seconds(self.ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| anyhow!("token ttl of {}s is out of range", self.ttl_seconds))?;
        let claims = Claims {
            sub: user.id.0.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        Ok(Some(encode(&Header::default(), &claims, &self.key)?))
    }
}

/// Shared, observable session state plus the token source bound to it.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<watch::Sender<Session>>,
    tokens: Arc<dyn TokenProvider>,
}

impl SessionHandle {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            state: Arc::new(state),
            tokens,
        }
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.state.borrow().user.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn set_user(&self, user: Option<UserRecord>) {
        self.update(|session| {
            session.user_loaded = true;
            session.user = user;
        });
    }

    pub fn set_token_loaded(&self, loaded: bool) {
        self.update(|session| session.token_loaded = loaded);
    }

    pub fn sign_in(&self, user: UserRecord) {
        self.update(|session| {
            session.user_loaded = true;
            session.token_loaded = true;
            session.user = Some(user);
        });
    }

    /// Leaves the user loaded as "nobody", which keeps the gate closed.
    pub fn sign_out(&self) {
        self.update(|session| {
            session.user_loaded = true;
            session.token_loaded = true;
            session.user = None;
        });
    }

    fn update(&self, modify: impl FnOnce(&mut Session)) {
        self.state.send_modify(|session| {
            let was_ready = session.is_ready();
            modify(session);
            if !was_ready && session.is_ready() {
                session.opened += 1;
            }
        });
    }

    /// `Ok(None)` when the gate is closed; the provider is not consulted.
    pub async fn bearer_token(&self) -> Result<Option<String>> {
        let session = self.snapshot();
        if !session.is_ready() {
            return Ok(None);
        }
        self.tokens.get_token(&session).await
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
