//! Session management for the ticket service
//!
//! The platform issues bearer tokens through its own login screen; this client
//! only stores a token and the identity it belongs to.

pub mod tokens;

use anyhow::Result;

pub use tokens::{Session, TokenStore};

use crate::config::Config;

/// Store a session token and identity in the config file.
pub fn login(
    config: &mut Config,
    token: String,
    user_id: String,
    display_name: String,
    avatar: Option<String>,
) -> Result<()> {
    let session = Session::new(token, user_id, display_name, avatar);
    if session.token.is_expired() {
        tracing::warn!("The supplied token is already expired");
    }
    config.set_session(session);
    config.save()?;
    println!(
        "Logged in as {}.",
        config
            .session
            .as_ref()
            .map_or("?", |s| s.display_name.as_str())
    );
    Ok(())
}

/// Clear the stored session.
pub fn logout(config: &mut Config) -> Result<()> {
    config.clear_session();
    config.save()?;
    println!("Logged out.");
    Ok(())
}

/// Print session and endpoint information.
pub fn status(config: &Config) -> Result<()> {
    println!("\nAPI:     {}", config.api_url);
    println!("Socket:  {}", config.socket_url);

    match config.get_session() {
        Some(session) => {
            println!("User:    {} ({})", session.display_name, session.user_id);
            match session.token.expires_at {
                Some(exp) => {
                    let when = chrono::DateTime::<chrono::Utc>::from_timestamp(exp, 0)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| exp.to_string());
                    let state = if session.token.is_expired() {
                        "expired"
                    } else {
                        "valid"
                    };
                    println!("Token:   {} (expires {})", state, when);
                }
                None => println!("Token:   present (no expiry claim)"),
            }
        }
        None => println!("Not logged in. Run 'ticket-chat login'."),
    }

    Ok(())
}
