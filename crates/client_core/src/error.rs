use shared::domain::ChatId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The session gate is closed or the token provider had nothing to give.
    #[error("no authenticated session available")]
    AuthUnavailable,
    #[error("failed to fetch chats: {0}")]
    FetchFailed(String),
    #[error("failed to create chat: {0}")]
    CreateFailed(String),
    #[error("chat {0} is not in the current chat list")]
    UnknownChat(ChatId),
}
