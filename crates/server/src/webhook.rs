use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use shared::protocol::WebhookAck;
use tracing::{debug, error, warn};
use user_sync::{
    apply_event, SyncError, VerifyError, WebhookHeaders, SVIX_ID_HEADER,
    SVIX_SIGNATURE_HEADER, SVIX_TIMESTAMP_HEADER,
};

use crate::app_state::AppState;

/// How a delivery is refused. Bodies stay plain text so the sender's
/// retry log shows the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WebhookRejection {
    Unauthorized,
    BadRequest,
    Internal,
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            Self::BadRequest => (StatusCode::BAD_REQUEST, "Bad Request").into_response(),
            Self::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

impl From<VerifyError> for WebhookRejection {
    fn from(error: VerifyError) -> Self {
        if error.is_unauthorized() {
            Self::Unauthorized
        } else {
            Self::BadRequest
        }
    }
}

impl From<SyncError> for WebhookRejection {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::MissingEmailAddress { .. } => Self::BadRequest,
            SyncError::Store(_) => Self::Internal,
        }
    }
}

pub(crate) fn webhook_headers(headers: &HeaderMap) -> WebhookHeaders {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };
    WebhookHeaders {
        id: read(SVIX_ID_HEADER),
        timestamp: read(SVIX_TIMESTAMP_HEADER),
        signature: read(SVIX_SIGNATURE_HEADER),
    }
}

pub(crate) async fn clerk_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookRejection> {
    let delivery = webhook_headers(&headers);
    let event = state.verifier.verify(&delivery, &body).map_err(|error| {
        warn!(msg_id = ?delivery.id, %error, "webhook: rejected delivery");
        WebhookRejection::from(error)
    })?;

    let storage = state.storage.get().await.map_err(|error| {
        error!(error = %format!("{error:#}"), "webhook: user store unavailable");
        WebhookRejection::Internal
    })?;

    let outcome = apply_event(storage, &event).await.map_err(|error| {
        match &error {
            SyncError::MissingEmailAddress { .. } => {
                warn!(msg_id = ?delivery.id, %error, "webhook: event not applied")
            }
            SyncError::Store(_) => {
                error!(msg_id = ?delivery.id, %error, "webhook: event not applied")
            }
        }
        WebhookRejection::from(error)
    })?;

    debug!(
        msg_id = ?delivery.id,
        event_type = event.kind.as_wire(),
        subject = %event.data.id,
        ?outcome,
        "webhook: delivery processed"
    );
    Ok(Json(WebhookAck::received()))
}
