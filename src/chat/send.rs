//! Optimistic send pipeline.
//!
//! A send moves `composing -> pending -> confirmed | failed`. Only one send is
//! in flight at a time. The temporary id of every reconciled send is kept as
//! an alias of the real id for the rest of the conversation, so late events
//! that still name the temporary id resolve to the right message.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{Author, Message, MessageBody, TEMP_ID_PREFIX};

/// A REST create call the runtime must issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingSend {
    pub temp_id: String,
    pub ticket_id: String,
    pub text: String,
}

/// What a failed REST create means for the conversation.
#[derive(Debug, PartialEq, Eq)]
pub enum SendFailure {
    /// Not the pending send.
    Unknown,
    /// The message never reached the server.
    Lost,
    /// The realtime echo already delivered it as `real_id`.
    Echoed { real_id: String },
}

#[derive(Debug)]
struct PendingSend {
    temp_id: String,
    text: String,
    /// Real id, if the realtime echo arrived before the REST response.
    echoed_as: Option<String>,
}

#[derive(Debug, Default)]
pub struct SendPipeline {
    in_flight: Option<PendingSend>,
    aliases: HashMap<String, String>,
}

impl SendPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a send. Returns the optimistic message and the request to issue,
    /// or `None` for blank text or while another send is pending.
    pub fn begin(
        &mut self,
        text: &str,
        author: &Author,
        ticket_id: &str,
        now: DateTime<Utc>,
    ) -> Option<(Message, OutgoingSend)> {
        let text = text.trim();
        if text.is_empty() || self.in_flight.is_some() {
            return None;
        }

        let temp_id = format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4());
        self.in_flight = Some(PendingSend {
            temp_id: temp_id.clone(),
            text: text.to_string(),
            echoed_as: None,
        });

        let message = Message {
            id: temp_id.clone(),
            ticket_id: ticket_id.to_string(),
            author: author.clone(),
            body: MessageBody::Text(text.to_string()),
            created_at: now,
        };
        let request = OutgoingSend {
            temp_id,
            ticket_id: ticket_id.to_string(),
            text: text.to_string(),
        };
        Some((message, request))
    }

    /// Match a realtime message against the pending send.
    ///
    /// Returns the temporary id to drop from the store when `message` is the
    /// server's copy of what we are sending.
    pub fn observe_echo(&mut self, message: &Message, local_user: &str) -> Option<String> {
        let pending = self.in_flight.as_mut()?;
        if pending.echoed_as.is_some()
            || message.is_temporary()
            || message.author.id != local_user
            || message.body.text() != Some(pending.text.as_str())
        {
            return None;
        }
        pending.echoed_as = Some(message.id.clone());
        self.aliases
            .insert(pending.temp_id.clone(), message.id.clone());
        Some(pending.temp_id.clone())
    }

    /// The REST create succeeded. Returns false if `temp_id` is not pending.
    pub fn confirm(&mut self, temp_id: &str, real_id: &str) -> bool {
        match self.in_flight.take() {
            Some(pending) if pending.temp_id == temp_id => {
                if let Some(echo) = pending.echoed_as.as_deref() {
                    if echo != real_id {
                        tracing::warn!(
                            "Echo {} and create response {} disagree for {}",
                            echo,
                            real_id,
                            temp_id
                        );
                    }
                }
                self.aliases.insert(temp_id.to_string(), real_id.to_string());
                true
            }
            other => {
                self.in_flight = other;
                false
            }
        }
    }

    /// The REST create failed.
    pub fn fail(&mut self, temp_id: &str) -> SendFailure {
        match self.in_flight.take() {
            Some(pending) if pending.temp_id == temp_id => match pending.echoed_as {
                Some(real_id) => SendFailure::Echoed { real_id },
                None => SendFailure::Lost,
            },
            other => {
                self.in_flight = other;
                SendFailure::Unknown
            }
        }
    }

    /// Map a temporary id to its real id; other ids pass through.
    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        self.aliases.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn reset(&mut self) {
        self.in_flight = None;
        self.aliases.clear();
    }
}
