//! Errors returned by the ticket REST API client

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not logged in; run 'ticket-chat login' first")]
    NotLoggedIn,

    #[error("session token expired; run 'ticket-chat login' again")]
    SessionExpired,

    #[error("401 Unauthorized for {url}; token may be invalid, run 'ticket-chat login'")]
    Unauthorized { url: String },

    #[error("HTTP {status} for {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("server reported failure for {url}")]
    Rejected { url: String },

    #[error("invalid endpoint URL")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Whether the user has to log in again to recover.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ApiError::NotLoggedIn | ApiError::SessionExpired | ApiError::Unauthorized { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_classification() {
        assert!(ApiError::SessionExpired.is_auth());
        assert!(ApiError::Unauthorized {
            url: "http://x".into()
        }
        .is_auth());
        assert!(!ApiError::Rejected {
            url: "http://x".into()
        }
        .is_auth());
    }

    #[test]
    fn test_http_error_message() {
        let err = ApiError::Http {
            status: 503,
            url: "http://x/tickets/T-1/messages".into(),
            body: "maintenance".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 503 for http://x/tickets/T-1/messages: maintenance"
        );
    }
}
