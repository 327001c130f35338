//! Inputs and outputs of the conversation state machine.

use crate::api::{ApiError, MessageEnvelope, PageRequest};
use crate::chat::send::OutgoingSend;

/// Realtime event received on the conversation channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    NewMessage(MessageEnvelope),
    Delivered { message_id: String },
    Seen { message_id: String, user_id: String },
    Typing { user_id: String, is_typing: bool },
    Online { user_id: String },
    Offline { user_id: String },
}

/// Realtime event to send on the conversation channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Delivered { message_id: String },
    Seen { message_id: String },
    Typing { is_typing: bool },
}

/// Everything the conversation reacts to.
#[derive(Debug)]
pub enum Event {
    HistoryLoaded {
        request: PageRequest,
        result: Result<Vec<MessageEnvelope>, ApiError>,
    },
    SendFinished {
        temp_id: String,
        result: Result<MessageEnvelope, ApiError>,
    },
    Channel(Inbound),
    ChannelClosed {
        reason: String,
    },
    Submit {
        text: String,
    },
    Keystroke,
    ScrolledToTop,
    /// Message ids currently on screen.
    Visible {
        ids: Vec<String>,
    },
    /// Timer wakeup for the typing deadline.
    Tick,
}

/// Side effects requested by the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FetchPage(PageRequest),
    CreateMessage(OutgoingSend),
    Emit(Outbound),
    ClearCompose,
    Notify(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Non-fatal, user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }

    /// Notice for a failed REST call, including its cause chain.
    pub fn from_api_error(what: &str, err: &ApiError) -> Self {
        let mut text = format!("{}: {}", what, err);
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::error(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_for_auth_failure_suggests_login() {
        let notice = Notice::from_api_error("Message not sent", &ApiError::SessionExpired);
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.text.starts_with("Message not sent: "));
        assert!(notice.text.contains("ticket-chat login"));
    }

    #[test]
    fn test_notice_for_server_failure() {
        let err = ApiError::Http {
            status: 503,
            url: "http://x/tickets/T-1/messages".into(),
            body: String::new(),
        };
        let notice = Notice::from_api_error("Could not load messages", &err);
        assert!(notice.text.contains("503"));
        assert!(!notice.text.contains("login"));
    }
}
