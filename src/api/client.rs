//! Authenticated HTTP client for the ticket API
//!
//! Wraps reqwest::Client with bearer token injection from the stored session.

use url::Url;

use super::error::ApiError;
use crate::auth::Session;
use crate::config::Config;

/// Authenticated client for the ticket REST endpoints.
pub struct TicketClient {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
}

impl TicketClient {
    /// Build a client from config. Fails without a usable session.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let session = config.session.clone().ok_or(ApiError::NotLoggedIn)?;
        Self::with_session(&config.api_url, session)
    }

    pub fn with_session(api_url: &str, session: Session) -> Result<Self, ApiError> {
        if session.token.is_expired() {
            return Err(ApiError::SessionExpired);
        }

        // A trailing slash makes `Url::join` append instead of replace.
        let mut base = api_url.trim_end_matches('/').to_string();
        base.push('/');

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(&base)?,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// URL of a ticket's message collection.
    pub fn messages_url(&self, ticket_id: &str) -> Result<Url, ApiError> {
        let mut url = self.base_url.join("tickets/")?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(ticket_id)
            .push("messages");
        Ok(url)
    }

    /// GET with bearer auth.
    pub async fn get(&self, url: Url) -> Result<reqwest::Response, ApiError> {
        tracing::debug!("GET {}", url);

        let resp = self
            .http
            .get(url.clone())
            .bearer_auth(&self.session.token.token)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        check_response(resp, url.as_str()).await
    }

    /// POST a JSON body with bearer auth.
    pub async fn post(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ApiError> {
        tracing::debug!("POST {}", url);

        let resp = self
            .http
            .post(url.clone())
            .bearer_auth(&self.session.token.token)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        check_response(resp, url.as_str()).await
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}
