//! Wire formats for ticket messages
//!
//! The backend is loose about shapes (`_id` vs `id`, populated vs bare
//! sender references, optional fields everywhere). Everything is decoded
//! here into `models::Message` so nothing past this boundary sees raw JSON.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{Author, Message, MessageBody};

/// A user reference: either a bare id or a populated profile.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireUser {
    Id(String),
    Profile {
        #[serde(rename = "_id")]
        mongo_id: Option<String>,
        id: Option<String>,
        name: Option<String>,
        #[serde(rename = "displayName")]
        display_name: Option<String>,
        avatar: Option<String>,
    },
}

impl WireUser {
    pub fn id(&self) -> Option<&str> {
        match self {
            WireUser::Id(id) => Some(id),
            WireUser::Profile { mongo_id, id, .. } => mongo_id.as_deref().or(id.as_deref()),
        }
    }

    fn name(&self) -> Option<&str> {
        match self {
            WireUser::Id(_) => None,
            WireUser::Profile {
                name, display_name, ..
            } => name.as_deref().or(display_name.as_deref()),
        }
    }

    fn avatar(&self) -> Option<&str> {
        match self {
            WireUser::Id(_) => None,
            WireUser::Profile { avatar, .. } => avatar.as_deref(),
        }
    }
}

/// A message as the REST API and the realtime channel send it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    id: Option<String>,
    ticket_id: Option<String>,
    ticket: Option<String>,
    sender: Option<WireUser>,
    sender_name: Option<String>,
    sender_avatar: Option<String>,
    text: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    image_url: Option<String>,
    image: Option<String>,
    caption: Option<String>,
    created_at: Option<String>,
    seen_by: Option<Vec<WireUser>>,
}

/// A decoded message plus the receipts the server attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub message: Message,
    pub seen_by: Vec<String>,
}

impl WireMessage {
    /// Convert to a `Message`. Returns `None` when the entry has no id.
    ///
    /// `received_at` stands in for a missing or unparseable `createdAt`.
    pub fn into_envelope(self, ticket_id: &str, received_at: DateTime<Utc>) -> Option<MessageEnvelope> {
        let id = self.mongo_id.or(self.id).filter(|id| !id.is_empty())?;

        let author = Author {
            id: self
                .sender
                .as_ref()
                .and_then(|s| s.id())
                .unwrap_or_default()
                .to_string(),
            display_name: self
                .sender
                .as_ref()
                .and_then(|s| s.name())
                .map(String::from)
                .or(self.sender_name)
                .unwrap_or_else(|| "Unknown".to_string()),
            avatar: self
                .sender
                .as_ref()
                .and_then(|s| s.avatar())
                .map(String::from)
                .or(self.sender_avatar),
        };

        let is_image = self.kind.as_deref() == Some("image");
        let body = match (is_image, self.image_url.or(self.image)) {
            (true, Some(url)) => MessageBody::Image {
                url,
                caption: self.caption.or(self.text).filter(|c| !c.is_empty()),
            },
            _ => MessageBody::Text(self.text.unwrap_or_default()),
        };

        let created_at = self
            .created_at
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(received_at);

        let seen_by = self
            .seen_by
            .unwrap_or_default()
            .iter()
            .filter_map(|u| u.id().map(String::from))
            .collect();

        Some(MessageEnvelope {
            message: Message {
                id,
                ticket_id: self
                    .ticket_id
                    .or(self.ticket)
                    .unwrap_or_else(|| ticket_id.to_string()),
                author,
                body,
                created_at,
            },
            seen_by,
        })
    }
}

/// Decode a JSON value holding a single message.
pub fn decode_message(
    value: serde_json::Value,
    ticket_id: &str,
    received_at: DateTime<Utc>,
) -> Option<MessageEnvelope> {
    match serde_json::from_value::<WireMessage>(value) {
        Ok(wire) => wire.into_envelope(ticket_id, received_at),
        Err(e) => {
            tracing::debug!("Skipping malformed message: {}", e);
            None
        }
    }
}

/// Decode a list of messages, treating anything that is not an array as
/// empty and skipping malformed entries.
pub fn decode_message_list(
    value: Option<serde_json::Value>,
    ticket_id: &str,
    received_at: DateTime<Utc>,
) -> Vec<MessageEnvelope> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| decode_message(item, ticket_id, received_at))
            .collect(),
        Some(other) => {
            tracing::debug!("Expected message array, got {}", other);
            Vec::new()
        }
        None => Vec::new(),
    }
}
