use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{UserId, UserRecord},
    protocol::{EventKind, IdentityEvent},
};
use tracing::{info, warn};

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Primary-key user store the processor writes through. Each call must be
/// atomic on its own; no ordering is assumed across calls.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert_user(&self, record: &UserRecord) -> Result<UpsertOutcome>;
    /// Returns whether a record was removed.
    async fn delete_user(&self, id: &UserId) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created { replaced_existing: bool },
    Updated { inserted: bool },
    Deleted { existed: bool },
    Ignored { event_type: String },
}

pub fn user_record_from_event(event: &IdentityEvent) -> Result<UserRecord, SyncError> {
    let data = &event.data;
    let email = data
        .email_addresses
        .first()
        .map(|address| address.email_address.clone())
        .ok_or_else(|| SyncError::MissingEmailAddress {
            subject: data.id.clone(),
        })?;

    Ok(UserRecord {
        id: data.id.clone(),
        email,
        display_name: format!("{} {}", data.first_name, data.last_name),
        avatar_url: data.image_url.clone(),
    })
}

/// Applies exactly one effect for the event. `created` and `updated` both
/// write through an upsert, so redelivery and `updated`-before-`created`
/// reordering converge on the latest payload.
pub async fn apply_event<S>(store: &S, event: &IdentityEvent) -> Result<SyncOutcome, SyncError>
where
    S: UserStore + ?Sized,
{
    let subject = event.subject_id();
    let outcome = match &event.kind {
        EventKind::Created => {
            let record = user_record_from_event(event)?;
            let written = store.upsert_user(&record).await.map_err(SyncError::Store)?;
            if written == UpsertOutcome::Replaced {
                warn!(
                    user_id = %subject,
                    "webhook: created event for existing user; applied as update"
                );
            }
            SyncOutcome::Created {
                replaced_existing: written == UpsertOutcome::Replaced,
            }
        }
        EventKind::Updated => {
            let record = user_record_from_event(event)?;
            let written = store.upsert_user(&record).await.map_err(SyncError::Store)?;
            SyncOutcome::Updated {
                inserted: written == UpsertOutcome::Inserted,
            }
        }
        EventKind::Deleted => {
            let existed = store.delete_user(subject).await.map_err(SyncError::Store)?;
            SyncOutcome::Deleted { existed }
        }
        EventKind::Other(raw) => {
            info!(event_type = %raw, user_id = %subject, "webhook: unhandled event type");
            SyncOutcome::Ignored {
                event_type: raw.clone(),
            }
        }
    };

    info!(
        user_id = %subject,
        event_type = event.kind.as_wire(),
        ?outcome,
        "webhook: sync effect applied"
    );
    Ok(outcome)
}

#[cfg(test)]
#[path = "tests/processor_tests.rs"]
mod tests;
