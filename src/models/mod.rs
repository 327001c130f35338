//! Data models for ticket conversations

mod message;

pub use message::*;
