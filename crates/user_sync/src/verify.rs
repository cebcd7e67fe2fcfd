use std::{fmt, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared::protocol::IdentityEvent;

use crate::error::{SecretError, VerifyError};

type HmacSha256 = Hmac<Sha256>;

pub const SVIX_ID_HEADER: &str = "svix-id";
pub const SVIX_TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SVIX_SIGNATURE_HEADER: &str = "svix-signature";
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// The three svix delivery headers, as received. Absent headers stay `None`
/// so the verifier can report which one was missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub signature: Option<String>,
}

/// Checks svix-style HMAC-SHA256 signatures over the raw request body.
///
/// Signed content is `"{svix-id}.{svix-timestamp}.{body}"`. The signature
/// header may carry several space-separated `v1,<base64>` entries (secret
/// rotation); any one matching is enough.
#[derive(Clone)]
pub struct WebhookVerifier {
    mac: HmacSha256,
    tolerance: Duration,
}

impl fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Result<Self, SecretError> {
        let encoded = secret.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);
        if encoded.is_empty() {
            return Err(SecretError::Empty);
        }
        let key = STANDARD
            .decode(encoded)
            .map_err(|e| SecretError::InvalidBase64(e.to_string()))?;
        let mac = HmacSha256::new_from_slice(&key).map_err(|_| SecretError::InvalidKey)?;
        Ok(Self {
            mac,
            tolerance: DEFAULT_TOLERANCE,
        })
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    pub fn verify(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> Result<IdentityEvent, VerifyError> {
        self.verify_at(headers, body, Utc::now())
    }

    /// Verifies against an explicit clock reading. The body is parsed only
    /// after the signature has been accepted.
    pub fn verify_at(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<IdentityEvent, VerifyError> {
        let msg_id = required(&headers.id, SVIX_ID_HEADER)?;
        let timestamp = required(&headers.timestamp, SVIX_TIMESTAMP_HEADER)?;
        let signatures = required(&headers.signature, SVIX_SIGNATURE_HEADER)?;

        let sent_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| VerifyError::InvalidTimestamp)?;
        if now.timestamp().abs_diff(sent_at) > self.tolerance.as_secs() {
            return Err(VerifyError::TimestampOutOfTolerance);
        }

        let expected = self.keyed(msg_id, timestamp, body);
        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, encoded)| STANDARD.decode(encoded).ok())
            .any(|candidate| expected.clone().verify_slice(&candidate).is_ok());
        if !matched {
            return Err(VerifyError::InvalidSignature);
        }

        serde_json::from_slice(body).map_err(|e| VerifyError::InvalidPayload(e.to_string()))
    }

    /// Produces a `v1,<base64>` signature entry for the given delivery.
    pub fn sign(&self, msg_id: &str, timestamp: i64, body: &[u8]) -> String {
        let tag = self
            .keyed(msg_id, &timestamp.to_string(), body)
            .finalize()
            .into_bytes();
        format!("{SIGNATURE_VERSION},{}", STANDARD.encode(tag))
    }

    fn keyed(&self, msg_id: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        mac
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, VerifyError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or(VerifyError::MissingHeader(name))
}

#[cfg(test)]
#[path = "tests/verify_tests.rs"]
mod tests;
