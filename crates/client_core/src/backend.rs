use async_trait::async_trait;
use reqwest::{Method, Response};
use serde_json::Value;
use shared::{domain::Chat, protocol::ChatResponse};

use crate::{error::ClientError, request::AuthorizedRequestIssuer};

pub const CHAT_LIST_PATH: &str = "chat/get";
pub const CHAT_CREATE_PATH: &str = "chat/create";

/// The two chat backend calls the bootstrap needs.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list_chats(&self) -> Result<Vec<Chat>, ClientError>;
    async fn create_chat(&self) -> Result<Chat, ClientError>;
}

pub struct HttpChatBackend {
    issuer: AuthorizedRequestIssuer,
}

impl HttpChatBackend {
    pub fn new(issuer: AuthorizedRequestIssuer) -> Self {
        Self { issuer }
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn list_chats(&self) -> Result<Vec<Chat>, ClientError> {
        let request = self.issuer.authorized(Method::GET, CHAT_LIST_PATH).await?;
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::FetchFailed(e.to_string()))?;
        let data = read_envelope(response)
            .await
            .map_err(ClientError::FetchFailed)?;
        if !data.is_array() {
            return Err(ClientError::FetchFailed(
                "chat list payload is not a sequence".to_string(),
            ));
        }
        serde_json::from_value(data)
            .map_err(|e| ClientError::FetchFailed(format!("malformed chat list: {e}")))
    }

    async fn create_chat(&self) -> Result<Chat, ClientError> {
        let request = self
            .issuer
            .authorized(Method::POST, CHAT_CREATE_PATH)
            .await?;
        let response = request
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| ClientError::CreateFailed(e.to_string()))?;
        let data = read_envelope(response)
            .await
            .map_err(ClientError::CreateFailed)?;
        if !data.is_object() {
            return Err(ClientError::CreateFailed(
                "created chat payload is not an object".to_string(),
            ));
        }
        serde_json::from_value(data)
            .map_err(|e| ClientError::CreateFailed(format!("malformed chat: {e}")))
    }
}

/// Unwraps `{success, message?, data?}`, preferring the backend's own message
/// when it reports a failure.
async fn read_envelope(response: Response) -> Result<Value, String> {
    let status = response.status();
    let body = response.bytes().await.map_err(|e| e.to_string())?;
    let envelope = serde_json::from_slice::<ChatResponse<Value>>(&body);

    if !status.is_success() {
        let message = envelope
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or_else(|| format!("backend returned {status}"));
        return Err(message);
    }

    let envelope = envelope.map_err(|e| format!("malformed response envelope: {e}"))?;
    if !envelope.success {
        return Err(envelope
            .message
            .unwrap_or_else(|| "backend reported failure".to_string()));
    }
    envelope
        .data
        .ok_or_else(|| "response carries no data".to_string())
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
