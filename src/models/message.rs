//! Message-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of client-generated ids for messages that are not yet confirmed.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Image {
        url: String,
        caption: Option<String>,
    },
}

impl MessageBody {
    /// Text content, if this is a text message.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageBody::Text(text) => Some(text),
            MessageBody::Image { .. } => None,
        }
    }

    /// Single-line rendering used by the CLI.
    pub fn preview(&self) -> String {
        match self {
            MessageBody::Text(text) => text.clone(),
            MessageBody::Image { url, caption } => match caption {
                Some(caption) if !caption.is_empty() => format!("[image] {} {}", url, caption),
                _ => format!("[image] {}", url),
            },
        }
    }
}

/// Sender identity, snapshotted when the message was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub display_name: String,
    pub avatar: Option<String>,
}

/// A single entry in a ticket conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server id, or a `temp-` id while an optimistic send is in flight.
    pub id: String,
    pub ticket_id: String,
    pub author: Author,
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// Delivery progress of a message, derived from the presence tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeliveryState {
    NotSent,
    Sent,
    Delivered,
    Seen,
}

impl DeliveryState {
    /// ASCII marker for message lists.
    pub fn marker(&self) -> &'static str {
        match self {
            DeliveryState::NotSent => "...",
            DeliveryState::Sent => "v",
            DeliveryState::Delivered => "vv",
            DeliveryState::Seen => "seen",
        }
    }
}
