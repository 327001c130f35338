//! In-memory message store for the open conversation.
//!
//! Keyed by message id. The display order (ascending `created_at`, ties in
//! first-insertion order) is computed lazily and cached until the next
//! mutation.

use std::cell::OnceCell;
use std::collections::HashMap;

use crate::models::Message;

struct Entry {
    message: Message,
    /// Insertion sequence, kept across overwrites.
    seq: u64,
}

#[derive(Default)]
pub struct MessageStore {
    entries: HashMap<String, Entry>,
    next_seq: u64,
    sorted: OnceCell<Vec<String>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by id. Returns true when the id was new.
    pub fn upsert(&mut self, message: Message) -> bool {
        self.sorted.take();
        match self.entries.get_mut(&message.id) {
            Some(entry) => {
                entry.message = message;
                false
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(message.id.clone(), Entry { message, seq });
                true
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let removed = self.entries.remove(id).map(|e| e.message);
        if removed.is_some() {
            self.sorted.take();
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.entries.get(id).map(|e| &e.message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.sorted.take();
    }

    /// All messages in display order.
    pub fn all(&self) -> Vec<&Message> {
        let order = self.sorted.get_or_init(|| {
            let mut keyed: Vec<(&Entry, &String)> =
                self.entries.iter().map(|(id, e)| (e, id)).collect();
            keyed.sort_by_key(|(e, _)| (e.message.created_at, e.seq));
            keyed.into_iter().map(|(_, id)| id.clone()).collect()
        });
        order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| &e.message))
            .collect()
    }
}
