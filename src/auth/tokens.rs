//! Token storage and management

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::models::Author;

/// Clock skew tolerated when checking expiry.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Stored bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    /// Unix seconds, taken from the JWT `exp` claim when the token has one.
    pub expires_at: Option<i64>,
}

impl StoredToken {
    pub fn new(token: String) -> Self {
        let expires_at = jwt_expiry(&token);
        Self { token, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => chrono::Utc::now().timestamp() + EXPIRY_MARGIN_SECS >= exp,
            None => false,
        }
    }
}

/// Read the `exp` claim from a JWT without verifying it.
///
/// Opaque tokens (anything that is not three dot-separated segments with a
/// JSON payload) have no known expiry.
fn jwt_expiry(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp").and_then(|v| v.as_i64())
}

/// Authenticated user session: the token plus who it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub token: StoredToken,
}

impl Session {
    pub fn new(
        token: String,
        user_id: String,
        display_name: String,
        avatar: Option<String>,
    ) -> Self {
        Self {
            user_id,
            display_name,
            avatar,
            token: StoredToken::new(token),
        }
    }

    /// Identity snapshot stamped onto outgoing messages.
    pub fn author(&self) -> Author {
        Author {
            id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Token store trait for different storage backends
pub trait TokenStore {
    fn get_session(&self) -> Option<Session>;
    fn set_session(&mut self, session: Session);
    fn clear_session(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{}}}"#, exp));
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_jwt_expiry_is_read() {
        let token = StoredToken::new(jwt_with_exp(1_700_000_000));
        assert_eq!(token.expires_at, Some(1_700_000_000));
        assert!(token.is_expired());
    }

    #[test]
    fn test_future_jwt_is_valid() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = StoredToken::new(jwt_with_exp(exp));
        assert!(!token.is_expired());
    }

    #[test]
    fn test_opaque_token_never_expires() {
        let token = StoredToken::new("not-a-jwt".to_string());
        assert_eq!(token.expires_at, None);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_session_author_snapshot() {
        let session = Session::new(
            "tok".to_string(),
            "u42".to_string(),
            "Ms. Rivera".to_string(),
            None,
        );
        let author = session.author();
        assert_eq!(author.id, "u42");
        assert_eq!(author.display_name, "Ms. Rivera");
    }
}
