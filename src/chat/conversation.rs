//! Conversation state machine.
//!
//! Owns the message store, history cursor, send pipeline, presence tracker
//! and typing indicator for one open ticket. It consumes [`Event`]s and
//! returns [`Action`]s for the runtime to execute; it performs no I/O.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::events::{Action, Event, Inbound, Notice, Outbound};
use super::history::{HistoryLoader, PageOutcome};
use super::presence::PresenceTracker;
use super::send::{SendFailure, SendPipeline};
use super::store::MessageStore;
use super::typing::TypingIndicator;
use crate::api::MessageEnvelope;
use crate::models::{Author, DeliveryState, Message};

pub struct Conversation {
    ticket_id: String,
    me: Author,
    store: MessageStore,
    history: HistoryLoader,
    sends: SendPipeline,
    presence: PresenceTracker,
    typing: TypingIndicator,
    /// Display names learned from message authors.
    names: HashMap<String, String>,
    live: bool,
    /// The server refused our credentials; REST calls stop until reopened.
    session_rejected: bool,
    closed: bool,
}

impl Conversation {
    pub fn new(
        ticket_id: impl Into<String>,
        me: Author,
        page_size: u32,
        typing_timeout: Duration,
    ) -> Self {
        let ticket_id = ticket_id.into();
        Self {
            history: HistoryLoader::new(ticket_id.clone(), page_size),
            ticket_id,
            me,
            store: MessageStore::new(),
            sends: SendPipeline::new(),
            presence: PresenceTracker::new(),
            typing: TypingIndicator::new(typing_timeout),
            names: HashMap::new(),
            live: false,
            session_rejected: false,
            closed: false,
        }
    }

    /// Actions to run when the view opens: load the first history page.
    pub fn open(&mut self) -> Vec<Action> {
        vec![Action::FetchPage(self.history.load_first_page())]
    }

    pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Action> {
        if self.closed {
            tracing::debug!("Ignoring {:?} after close", event);
            return Vec::new();
        }

        match event {
            Event::HistoryLoaded { request, result } => {
                match self.history.complete(&request, result) {
                    PageOutcome::Loaded(page) => {
                        tracing::debug!(
                            "Loaded page {} of {} ({} messages)",
                            request.page,
                            self.ticket_id,
                            page.len()
                        );
                        for envelope in page {
                            self.ingest(envelope);
                        }
                        Vec::new()
                    }
                    PageOutcome::Failed(e) => {
                        tracing::warn!("History page {} failed: {}", request.page, e);
                        self.session_rejected |= e.is_auth();
                        vec![Action::Notify(Notice::from_api_error(
                            "Could not load messages",
                            &e,
                        ))]
                    }
                    PageOutcome::Stale => {
                        tracing::debug!("Dropping stale history page {}", request.page);
                        Vec::new()
                    }
                }
            }
            Event::SendFinished { temp_id, result } => self.on_send_finished(&temp_id, result),
            Event::Channel(inbound) => self.on_inbound(inbound),
            Event::ChannelClosed { reason } => {
                tracing::warn!("Channel for {} closed: {}", self.ticket_id, reason);
                self.live = false;
                vec![Action::Notify(Notice::info(
                    "Live updates stopped; reopen the ticket to resume",
                ))]
            }
            Event::Submit { text } => self.on_submit(&text),
            Event::Keystroke => match self.typing.keystroke(now) {
                Some(is_typing) => vec![Action::Emit(Outbound::Typing { is_typing })],
                None => Vec::new(),
            },
            Event::Tick => match self.typing.poll(now) {
                Some(is_typing) => vec![Action::Emit(Outbound::Typing { is_typing })],
                None => Vec::new(),
            },
            Event::ScrolledToTop if self.session_rejected => Vec::new(),
            Event::ScrolledToTop => self
                .history
                .load_next_page()
                .map(Action::FetchPage)
                .into_iter()
                .collect(),
            Event::Visible { ids } => {
                let mut actions = Vec::new();
                for id in ids {
                    if let Some(message) = self.store.get(&id) {
                        if self.presence.on_visible(message, &self.me.id) {
                            actions.push(Action::Emit(Outbound::Seen { message_id: id }));
                        }
                    }
                }
                actions
            }
        }
    }

    fn on_submit(&mut self, text: &str) -> Vec<Action> {
        if self.session_rejected && !text.trim().is_empty() {
            return vec![Action::Notify(Notice::error(
                "Session rejected; run 'ticket-chat login' and reopen the ticket",
            ))];
        }
        let Some((message, request)) = self.sends.begin(text, &self.me, &self.ticket_id, Utc::now())
        else {
            return Vec::new();
        };

        self.store.upsert(message);
        let mut actions = vec![Action::ClearCompose];
        if let Some(is_typing) = self.typing.stop() {
            actions.push(Action::Emit(Outbound::Typing { is_typing }));
        }
        actions.push(Action::CreateMessage(request));
        actions
    }

    fn on_send_finished(
        &mut self,
        temp_id: &str,
        result: Result<MessageEnvelope, crate::api::ApiError>,
    ) -> Vec<Action> {
        match result {
            Ok(envelope) => {
                if self.sends.confirm(temp_id, &envelope.message.id) {
                    self.store.remove(temp_id);
                    self.ingest(envelope);
                } else {
                    tracing::debug!("Create response for unknown send {}", temp_id);
                }
                Vec::new()
            }
            Err(e) => match self.sends.fail(temp_id) {
                SendFailure::Unknown => Vec::new(),
                SendFailure::Lost => {
                    tracing::warn!("Send failed: {}", e);
                    self.session_rejected |= e.is_auth();
                    self.store.remove(temp_id);
                    vec![Action::Notify(Notice::from_api_error(
                        "Message not sent",
                        &e,
                    ))]
                }
                SendFailure::Echoed { real_id } => {
                    tracing::warn!("Create for {} failed after delivery: {}", real_id, e);
                    vec![Action::Notify(Notice::info(
                        "Message delivered (the server reply was lost)",
                    ))]
                }
            },
        }
    }

    fn on_inbound(&mut self, inbound: Inbound) -> Vec<Action> {
        match inbound {
            Inbound::NewMessage(envelope) => {
                let message = &envelope.message;
                if message.ticket_id != self.ticket_id {
                    return Vec::new();
                }

                let from_other = message.author.id != self.me.id;
                if let Some(temp_id) = self.sends.observe_echo(message, &self.me.id) {
                    self.store.remove(&temp_id);
                }
                if from_other {
                    self.presence.set_typing(&message.author.id, false);
                }

                let message_id = message.id.clone();
                self.ingest(envelope);

                if from_other {
                    vec![Action::Emit(Outbound::Delivered { message_id })]
                } else {
                    Vec::new()
                }
            }
            Inbound::Delivered { message_id } => {
                let id = self.sends.resolve(&message_id).to_string();
                self.presence.mark_delivered(&id);
                Vec::new()
            }
            Inbound::Seen {
                message_id,
                user_id,
            } => {
                let id = self.sends.resolve(&message_id).to_string();
                self.presence.mark_seen(&id, &user_id);
                Vec::new()
            }
            Inbound::Typing { user_id, is_typing } => {
                if user_id != self.me.id {
                    self.presence.set_typing(&user_id, is_typing);
                }
                Vec::new()
            }
            Inbound::Online { user_id } => {
                self.presence.set_online(&user_id, true);
                Vec::new()
            }
            Inbound::Offline { user_id } => {
                self.presence.set_online(&user_id, false);
                self.presence.set_typing(&user_id, false);
                Vec::new()
            }
        }
    }

    fn ingest(&mut self, envelope: MessageEnvelope) {
        let MessageEnvelope { message, seen_by } = envelope;
        for user in &seen_by {
            self.presence.mark_seen(&message.id, user);
        }
        if !message.author.id.is_empty() {
            self.names
                .insert(message.author.id.clone(), message.author.display_name.clone());
        }
        self.store.upsert(message);
    }

    /// The realtime channel is attached.
    pub fn mark_live(&mut self) {
        self.live = true;
    }

    /// Tear down: returns a final `typing=false` if one is owed, then clears
    /// all state. Later events are ignored.
    pub fn close(&mut self) -> Vec<Action> {
        let actions = self
            .typing
            .stop()
            .map(|is_typing| Action::Emit(Outbound::Typing { is_typing }))
            .into_iter()
            .collect();
        self.store.clear();
        self.presence.clear();
        self.sends.reset();
        self.history.cancel();
        self.names.clear();
        self.live = false;
        self.closed = true;
        actions
    }

    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    pub fn me(&self) -> &Author {
        &self.me
    }

    /// Messages in display order.
    pub fn messages(&self) -> Vec<&Message> {
        self.store.all()
    }

    pub fn message_count(&self) -> usize {
        self.store.len()
    }

    pub fn delivery_state(&self, message: &Message) -> DeliveryState {
        self.presence.delivery_state(message)
    }

    /// Display names of other users currently typing.
    pub fn typing_names(&self) -> Vec<String> {
        self.presence
            .typing_users()
            .into_iter()
            .map(|user| self.display_name(user))
            .collect()
    }

    pub fn display_name(&self, user_id: &str) -> String {
        self.names
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| user_id.to_string())
    }

    pub fn online_count(&self) -> usize {
        self.presence.online_count()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.presence.is_online(user_id)
    }

    pub fn has_more_history(&self) -> bool {
        self.history.has_more()
    }

    pub fn is_loading_history(&self) -> bool {
        self.history.is_loading()
    }

    pub fn is_sending(&self) -> bool {
        self.sends.is_pending()
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// When the runtime should deliver the next `Event::Tick`.
    pub fn typing_deadline(&self) -> Option<Instant> {
        self.typing.deadline()
    }

    pub fn seen_by(&self, message_id: &str) -> Vec<String> {
        self.presence.seen_by(message_id).map(String::from).collect()
    }
}
