//! Ticket message endpoints
//!
//! `GET /tickets/{id}/messages?page=&limit=` and `POST /tickets/{id}/messages`.

use chrono::Utc;
use serde::Deserialize;

use super::client::TicketClient;
use super::error::ApiError;
use super::wire::{decode_message, decode_message_list, MessageEnvelope};

/// One page of history to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub ticket_id: String,
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    success: bool,
    messages: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    success: bool,
    message: Option<serde_json::Value>,
}

/// Fetch one page of a ticket's message history.
pub async fn fetch_page(
    client: &TicketClient,
    request: &PageRequest,
) -> Result<Vec<MessageEnvelope>, ApiError> {
    let mut url = client.messages_url(&request.ticket_id)?;
    url.query_pairs_mut()
        .append_pair("page", &request.page.to_string())
        .append_pair("limit", &request.limit.to_string());

    let resp = client.get(url.clone()).await?;
    let body: serde_json::Value = resp.json().await.map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    decode_page(body, &request.ticket_id, url.as_str())
}

/// Create a text message in a ticket conversation.
pub async fn create_message(
    client: &TicketClient,
    ticket_id: &str,
    text: &str,
) -> Result<MessageEnvelope, ApiError> {
    let url = client.messages_url(ticket_id)?;
    let body = serde_json::json!({ "text": text });

    let resp = client.post(url.clone(), &body).await?;
    let body: serde_json::Value = resp.json().await.map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    decode_created(body, ticket_id, url.as_str())
}

fn decode_page(
    body: serde_json::Value,
    ticket_id: &str,
    url: &str,
) -> Result<Vec<MessageEnvelope>, ApiError> {
    let page: PageResponse = serde_json::from_value(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !page.success {
        return Err(ApiError::Rejected {
            url: url.to_string(),
        });
    }
    Ok(decode_message_list(page.messages, ticket_id, Utc::now()))
}

fn decode_created(
    body: serde_json::Value,
    ticket_id: &str,
    url: &str,
) -> Result<MessageEnvelope, ApiError> {
    let created: CreateResponse = serde_json::from_value(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !created.success {
        return Err(ApiError::Rejected {
            url: url.to_string(),
        });
    }
    created
        .message
        .and_then(|m| decode_message(m, ticket_id, Utc::now()))
        .ok_or_else(|| ApiError::Decode {
            url: url.to_string(),
            reason: "response has no usable message".to_string(),
        })
}
