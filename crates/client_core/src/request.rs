use reqwest::{Client, Method, RequestBuilder};
use tracing::warn;
use url::Url;

use crate::{error::ClientError, session::SessionHandle};

/// Builds requests against the chat backend with a fresh bearer token.
#[derive(Clone)]
pub struct AuthorizedRequestIssuer {
    http: Client,
    base_url: Url,
    session: SessionHandle,
}

impl AuthorizedRequestIssuer {
    pub fn new(base_url: Url, session: SessionHandle) -> Self {
        Self::with_client(Client::new(), base_url, session)
    }

    pub fn with_client(http: Client, base_url: Url, session: SessionHandle) -> Self {
        Self {
            http,
            base_url,
            session,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
            .map_err(|e| ClientError::FetchFailed(format!("invalid endpoint '{path}': {e}")))
    }

    /// Fails with `AuthUnavailable` before touching the network when the gate
    /// is closed or no token can be produced.
    pub async fn authorized(
        &self,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, ClientError> {
        if !self.session.is_ready() {
            return Err(ClientError::AuthUnavailable);
        }
        let token = match self.session.bearer_token().await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return Err(ClientError::AuthUnavailable),
            Err(error) => {
                warn!(%error, "bootstrap: token provider failed");
                return Err(ClientError::AuthUnavailable);
            }
        };
        let url = self.endpoint(path)?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }
}
