//! REST client for the ticket conversation API

pub mod client;
mod error;
pub mod messages;
pub mod wire;

use anyhow::Result;

pub use client::TicketClient;
pub use error::ApiError;
pub use messages::{create_message, fetch_page, PageRequest};
pub use wire::MessageEnvelope;

use crate::config::Config;

/// Print one page of a ticket's history in chronological order.
pub async fn print_history(config: &Config, ticket_id: &str, page: u32, limit: u32) -> Result<()> {
    let client = TicketClient::new(config)?;
    let request = PageRequest {
        ticket_id: ticket_id.to_string(),
        page,
        limit,
    };
    let mut envelopes = fetch_page(&client, &request).await?;

    if envelopes.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    envelopes.sort_by_key(|e| e.message.created_at);
    for env in &envelopes {
        let msg = &env.message;
        println!(
            "[{}] {}: {}",
            msg.created_at.format("%Y-%m-%d %H:%M"),
            msg.author.display_name,
            msg.body.preview()
        );
    }

    if envelopes.len() as u32 == limit {
        println!("(more: --page {})", page + 1);
    }

    Ok(())
}

/// Send a text message and print the server-assigned id.
pub async fn send_message(config: &Config, ticket_id: &str, text: &str) -> Result<()> {
    let text = text.trim();
    anyhow::ensure!(!text.is_empty(), "Refusing to send an empty message");

    let client = TicketClient::new(config)?;
    let created = create_message(&client, ticket_id, text).await?;
    println!("Message sent ({}).", created.message.id);
    Ok(())
}
