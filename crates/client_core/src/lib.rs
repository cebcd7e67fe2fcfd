//! Client side of chat bootstrap: a session readiness gate, bearer-token
//! request issuing, and the fetch/create/sort/select protocol run on sign-in.

pub mod backend;
pub mod bootstrap;
pub mod error;
pub mod request;
pub mod session;

pub use backend::{ChatBackend, HttpChatBackend, CHAT_CREATE_PATH, CHAT_LIST_PATH};
pub use bootstrap::{
    sort_by_recent_update, spawn_bootstrap_driver, ChatBootstrap, ClientChatState, ClientEvent,
};
pub use error::ClientError;
pub use request::AuthorizedRequestIssuer;
pub use session::{
    JwtTokenProvider, Session, SessionHandle, StaticTokenProvider, TokenProvider,
};
