use std::sync::Arc;

use user_sync::WebhookVerifier;

use crate::db::LazyStorage;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) storage: Arc<LazyStorage>,
    pub(crate) verifier: WebhookVerifier,
}
