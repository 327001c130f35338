//! Ticket conversation core
//!
//! I/O-free state for one open conversation: the message store, history
//! cursor, optimistic send pipeline, presence tracker and typing indicator,
//! tied together by the [`Conversation`] state machine.

pub mod conversation;
pub mod events;
pub mod history;
pub mod presence;
pub mod send;
pub mod store;
pub mod typing;

pub use conversation::Conversation;
pub use events::{Action, Event, Inbound, Notice, NoticeLevel, Outbound};
