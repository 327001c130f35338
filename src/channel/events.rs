//! Realtime event names and payloads for ticket conversations.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::wire;
use crate::chat::{Inbound, Outbound};

pub const JOIN_TICKET: &str = "joinTicket";
pub const NEW_MESSAGE: &str = "newMessage";
pub const MESSAGE_RECEIVED: &str = "messageReceived";
pub const MESSAGE_SEEN: &str = "messageSeen";
pub const USER_TYPING: &str = "userTyping";
pub const USER_ONLINE: &str = "userOnline";
pub const USER_OFFLINE: &str = "userOffline";
pub const TYPING: &str = "typing";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AckPayload {
    ticket_id: Option<String>,
    message_id: String,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserPayload {
    ticket_id: Option<String>,
    user_id: String,
    #[serde(default)]
    is_typing: bool,
}

/// Decode an inbound event. Unknown events, malformed payloads and events
/// addressed to another ticket yield `None`.
pub fn decode(
    name: &str,
    payload: Value,
    ticket_id: &str,
    received_at: DateTime<Utc>,
) -> Option<Inbound> {
    let for_other_ticket = |t: &Option<String>| t.as_deref().is_some_and(|t| t != ticket_id);

    let inbound = match name {
        NEW_MESSAGE => {
            // Either the message itself or `{ message: {...} }`.
            let value = match payload {
                Value::Object(mut map) if map.contains_key("message") && !map.contains_key("text") => {
                    map.remove("message").unwrap_or(Value::Null)
                }
                other => other,
            };
            let envelope = wire::decode_message(value, ticket_id, received_at)?;
            if envelope.message.ticket_id != ticket_id {
                return None;
            }
            Inbound::NewMessage(envelope)
        }
        MESSAGE_RECEIVED => {
            let ack: AckPayload = from_payload(name, payload)?;
            if for_other_ticket(&ack.ticket_id) {
                return None;
            }
            Inbound::Delivered {
                message_id: ack.message_id,
            }
        }
        MESSAGE_SEEN => {
            let ack: AckPayload = from_payload(name, payload)?;
            if for_other_ticket(&ack.ticket_id) {
                return None;
            }
            Inbound::Seen {
                message_id: ack.message_id,
                user_id: ack.user_id?,
            }
        }
        USER_TYPING | USER_ONLINE | USER_OFFLINE => {
            let user: UserPayload = from_payload(name, payload)?;
            if for_other_ticket(&user.ticket_id) {
                return None;
            }
            match name {
                USER_TYPING => Inbound::Typing {
                    user_id: user.user_id,
                    is_typing: user.is_typing,
                },
                USER_ONLINE => Inbound::Online {
                    user_id: user.user_id,
                },
                _ => Inbound::Offline {
                    user_id: user.user_id,
                },
            }
        }
        other => {
            tracing::debug!("Ignoring channel event {}", other);
            return None;
        }
    };
    Some(inbound)
}

fn from_payload<T: for<'de> Deserialize<'de>>(name: &str, payload: Value) -> Option<T> {
    serde_json::from_value(payload)
        .map_err(|e| tracing::debug!("Malformed {} payload: {}", name, e))
        .ok()
}

/// Event name and payload for an outbound event.
pub fn encode(event: &Outbound, ticket_id: &str, user_id: &str) -> (&'static str, Value) {
    match event {
        Outbound::Delivered { message_id } => (
            MESSAGE_RECEIVED,
            json!({ "ticketId": ticket_id, "messageId": message_id, "userId": user_id }),
        ),
        Outbound::Seen { message_id } => (
            MESSAGE_SEEN,
            json!({ "ticketId": ticket_id, "messageId": message_id, "userId": user_id }),
        ),
        Outbound::Typing { is_typing } => (
            TYPING,
            json!({ "ticketId": ticket_id, "userId": user_id, "isTyping": is_typing }),
        ),
    }
}

/// Payload of the room join sent right after connecting.
pub fn join_payload(ticket_id: &str, user_id: &str) -> Value {
    json!({ "ticketId": ticket_id, "userId": user_id })
}
