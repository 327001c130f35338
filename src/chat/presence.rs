//! Presence and delivery tracking.
//!
//! Pure bookkeeping driven by channel events and visibility reports.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{DeliveryState, Message};

#[derive(Debug, Default)]
pub struct PresenceTracker {
    delivered: HashSet<String>,
    seen_by: HashMap<String, BTreeSet<String>>,
    typing: HashMap<String, bool>,
    online: HashMap<String, bool>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the message was not yet marked delivered.
    pub fn mark_delivered(&mut self, message_id: &str) -> bool {
        self.delivered.insert(message_id.to_string())
    }

    /// Returns true if `user_id` was not yet in the seen-by set.
    pub fn mark_seen(&mut self, message_id: &str, user_id: &str) -> bool {
        self.seen_by
            .entry(message_id.to_string())
            .or_default()
            .insert(user_id.to_string())
    }

    pub fn set_typing(&mut self, user_id: &str, is_typing: bool) {
        self.typing.insert(user_id.to_string(), is_typing);
    }

    pub fn set_online(&mut self, user_id: &str, online: bool) {
        self.online.insert(user_id.to_string(), online);
    }

    pub fn is_delivered(&self, message_id: &str) -> bool {
        self.delivered.contains(message_id)
    }

    pub fn seen_by(&self, message_id: &str) -> impl Iterator<Item = &str> {
        self.seen_by
            .get(message_id)
            .into_iter()
            .flat_map(|users| users.iter().map(String::as_str))
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.get(user_id).copied().unwrap_or(false)
    }

    /// Users currently typing, sorted for stable display.
    pub fn typing_users(&self) -> Vec<&str> {
        let mut users: Vec<&str> = self
            .typing
            .iter()
            .filter(|(_, typing)| **typing)
            .map(|(user, _)| user.as_str())
            .collect();
        users.sort_unstable();
        users
    }

    pub fn online_count(&self) -> usize {
        self.online.values().filter(|online| **online).count()
    }

    /// A message became visible to the local user.
    ///
    /// Returns true when a seen ack should go out: the message is someone
    /// else's and the local user is not already in its seen-by set. The
    /// local user is recorded right away without waiting for the server.
    pub fn on_visible(&mut self, message: &Message, local_user: &str) -> bool {
        if message.is_temporary() || message.author.id == local_user {
            return false;
        }
        self.mark_seen(&message.id, local_user)
    }

    pub fn delivery_state(&self, message: &Message) -> DeliveryState {
        if message.is_temporary() {
            return DeliveryState::NotSent;
        }
        if self.seen_by(&message.id).any(|u| u != message.author.id) {
            return DeliveryState::Seen;
        }
        if self.is_delivered(&message.id) {
            return DeliveryState::Delivered;
        }
        DeliveryState::Sent
    }

    pub fn clear(&mut self) {
        self.delivered.clear();
        self.seen_by.clear();
        self.typing.clear();
        self.online.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, MessageBody};
    use chrono::Utc;

    fn message(id: &str, author: &str) -> Message {
        Message {
            id: id.into(),
            ticket_id: "T-1".into(),
            author: Author {
                id: author.into(),
                display_name: author.into(),
                avatar: None,
            },
            body: MessageBody::Text("x".into()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_seen_is_idempotent() {
        let mut tracker = PresenceTracker::new();
        assert!(tracker.mark_seen("m1", "u2"));
        assert!(!tracker.mark_seen("m1", "u2"));
        assert_eq!(tracker.seen_by("m1").collect::<Vec<_>>(), vec!["u2"]);
    }

    #[test]
    fn test_visible_acks_once_for_others_messages() {
        let mut tracker = PresenceTracker::new();
        let theirs = message("m1", "u2");
        let mine = message("m2", "u1");

        assert!(tracker.on_visible(&theirs, "u1"));
        assert!(!tracker.on_visible(&theirs, "u1"));
        assert!(!tracker.on_visible(&mine, "u1"));
        assert_eq!(tracker.seen_by("m1").collect::<Vec<_>>(), vec!["u1"]);
    }

    #[test]
    fn test_delivery_state_progression() {
        let mut tracker = PresenceTracker::new();
        let mut msg = message("temp-1", "u1");
        assert_eq!(tracker.delivery_state(&msg), DeliveryState::NotSent);

        msg.id = "m1".into();
        assert_eq!(tracker.delivery_state(&msg), DeliveryState::Sent);

        tracker.mark_delivered("m1");
        assert_eq!(tracker.delivery_state(&msg), DeliveryState::Delivered);

        // The author's own seen record does not count.
        tracker.mark_seen("m1", "u1");
        assert_eq!(tracker.delivery_state(&msg), DeliveryState::Delivered);

        tracker.mark_seen("m1", "u2");
        assert_eq!(tracker.delivery_state(&msg), DeliveryState::Seen);
    }

    #[test]
    fn test_typing_and_online_flags() {
        let mut tracker = PresenceTracker::new();
        tracker.set_typing("u3", true);
        tracker.set_typing("u2", true);
        tracker.set_typing("u3", false);
        assert_eq!(tracker.typing_users(), vec!["u2"]);

        tracker.set_online("u2", true);
        tracker.set_online("u3", true);
        tracker.set_online("u3", false);
        assert!(tracker.is_online("u2"));
        assert!(!tracker.is_online("u3"));
        assert_eq!(tracker.online_count(), 1);

        tracker.clear();
        assert!(tracker.typing_users().is_empty());
        assert_eq!(tracker.online_count(), 0);
    }
}
