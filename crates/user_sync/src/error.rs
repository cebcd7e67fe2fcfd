use shared::domain::UserId;
use thiserror::Error;

/// Problems with the configured signing secret. Raised once, at startup.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("signing secret is empty")]
    Empty,
    #[error("signing secret is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("signing secret cannot be used as an HMAC-SHA256 key")]
    InvalidKey,
}

/// Why a delivery was refused before any processing took place.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("timestamp header is not an integer")]
    InvalidTimestamp,
    #[error("timestamp outside the accepted window")]
    TimestampOutOfTolerance,
    #[error("no matching signature")]
    InvalidSignature,
    #[error("verified body is not an identity event: {0}")]
    InvalidPayload(String),
}

impl VerifyError {
    /// Every variant except a malformed (but authentic) body is an
    /// authentication failure.
    pub fn is_unauthorized(&self) -> bool {
        !matches!(self, Self::InvalidPayload(_))
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("event for subject {subject} carries no email address")]
    MissingEmailAddress { subject: UserId },
    #[error("user store failure: {0:#}")]
    Store(anyhow::Error),
}
