//! Server side of identity sync: verify a signed webhook delivery, then apply
//! the event to the local user store.

pub mod error;
pub mod processor;
pub mod verify;

pub use error::{SecretError, SyncError, VerifyError};
pub use processor::{apply_event, user_record_from_event, SyncOutcome, UpsertOutcome, UserStore};
pub use verify::{
    WebhookHeaders, WebhookVerifier, DEFAULT_TOLERANCE, SVIX_ID_HEADER, SVIX_SIGNATURE_HEADER,
    SVIX_TIMESTAMP_HEADER,
};
