//! Messages pane: the conversation in display order, newest at the bottom.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::chat::Conversation;
use crate::models::{DeliveryState, Message, MessageBody};

/// Scroll and visibility state for the messages pane.
#[derive(Default)]
pub struct MessagesState {
    /// Lines scrolled up from the bottom (0 = follow the newest message).
    pub scroll_from_bottom: usize,
    /// Largest useful `scroll_from_bottom`, from the last render.
    max_scroll: usize,
    /// Ids of messages drawn in the last frame.
    visible: Vec<String>,
    /// The oldest loaded message was on screen in the last frame.
    oldest_on_screen: Option<String>,
    /// Oldest id for which older history was last requested.
    requested_before: Option<String>,
    /// The user pushed against the top edge since the last report.
    pushed_top: bool,
}

/// What the last frame showed, for seen acks and history paging.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ViewReport {
    pub visible: Vec<String>,
    pub scrolled_to_top: bool,
}

impl MessagesState {
    pub fn scroll_up(&mut self, lines: usize) {
        if self.scroll_from_bottom >= self.max_scroll {
            self.pushed_top = true;
        }
        self.scroll_from_bottom = (self.scroll_from_bottom + lines).min(self.max_scroll);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(lines);
    }

    /// Take what the last frame showed. Reaching the top is reported once
    /// per oldest message, or again when the user scrolls against the top.
    pub fn take_report(&mut self) -> ViewReport {
        let scrolled_to_top = match &self.oldest_on_screen {
            Some(oldest) => {
                let fresh = self.requested_before.as_ref() != Some(oldest);
                if fresh || self.pushed_top {
                    self.requested_before = Some(oldest.clone());
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        self.pushed_top = false;
        ViewReport {
            visible: std::mem::take(&mut self.visible),
            scrolled_to_top,
        }
    }
}

/// Render the messages pane and record which messages were drawn.
pub fn render(area: Rect, buf: &mut Buffer, state: &mut MessagesState, conversation: &Conversation) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    block.render(area, buf);

    state.visible.clear();
    state.oldest_on_screen = None;

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let messages = conversation.messages();
    if messages.is_empty() {
        let text = if conversation.is_loading_history() {
            " Loading messages..."
        } else {
            " No messages yet."
        };
        Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().fg(Color::DarkGray),
        )))
        .render(inner, buf);
        return;
    }

    let (lines, owners) = build_message_lines(&messages, conversation, inner.width as usize);
    let total = lines.len();
    let height = inner.height as usize;

    state.max_scroll = total.saturating_sub(height);
    state.scroll_from_bottom = state.scroll_from_bottom.min(state.max_scroll);
    let end = total - state.scroll_from_bottom;
    let start = end.saturating_sub(height);

    for (row, idx) in (start..end).enumerate() {
        let line_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        Paragraph::new(lines[idx].clone()).render(line_area, buf);

        if let Some(owner) = owners[idx] {
            let id = &messages[owner].id;
            if state.visible.last() != Some(id) {
                state.visible.push(id.clone());
            }
            if owner == 0 {
                state.oldest_on_screen = Some(id.clone());
            }
        }
    }

    if start > 0 {
        let cell = &mut buf[(inner.x + inner.width - 1, inner.y)];
        cell.set_char('^');
        cell.set_style(Style::default().fg(Color::DarkGray));
    }
    if state.scroll_from_bottom > 0 {
        let cell = &mut buf[(inner.x + inner.width - 1, inner.y + inner.height - 1)];
        cell.set_char('v');
        cell.set_style(Style::default().fg(Color::DarkGray));
    }
}

/// Flatten messages into lines. `owners[i]` is the index of the message
/// line `i` belongs to (`None` for separators).
fn build_message_lines(
    messages: &[&Message],
    conversation: &Conversation,
    width: usize,
) -> (Vec<Line<'static>>, Vec<Option<usize>>) {
    let mut lines = Vec::new();
    let mut owners = Vec::new();
    let me = &conversation.me().id;

    for (idx, msg) in messages.iter().enumerate() {
        let own = &msg.author.id == me;
        let name_style = if own {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        };

        let mut header = vec![Span::styled(
            format!(" {}", msg.author.display_name),
            name_style,
        )];
        if !own && conversation.is_online(&msg.author.id) {
            header.push(Span::styled(" *", Style::default().fg(Color::Green)));
        }
        header.push(Span::styled(
            format!("  {}", msg.created_at.format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ));
        if own {
            let state = conversation.delivery_state(msg);
            let (marker, color) = match state {
                DeliveryState::Seen => {
                    let readers: Vec<String> = conversation
                        .seen_by(&msg.id)
                        .iter()
                        .filter(|user| *user != me)
                        .map(|user| conversation.display_name(user))
                        .collect();
                    (format!("seen by {}", readers.join(", ")), Color::Green)
                }
                DeliveryState::NotSent => (state.marker().to_string(), Color::DarkGray),
                _ => (state.marker().to_string(), Color::Gray),
            };
            header.push(Span::styled(
                format!("  {}", marker),
                Style::default().fg(color),
            ));
        }
        lines.push(Line::from(header));
        owners.push(Some(idx));

        let body_width = width.saturating_sub(3);
        let body_style = if msg.is_temporary() {
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM)
        } else {
            Style::default()
        };
        for text in body_lines(&msg.body, body_width) {
            lines.push(Line::from(vec![
                Span::raw("   "),
                Span::styled(text, body_style),
            ]));
            owners.push(Some(idx));
        }

        lines.push(Line::from(""));
        owners.push(None);
    }

    (lines, owners)
}

fn body_lines(body: &MessageBody, width: usize) -> Vec<String> {
    match body {
        MessageBody::Text(text) => wrap_text(text, width),
        MessageBody::Image { url, caption } => {
            let mut out = wrap_text(&format!("[image] {}", url), width);
            if let Some(caption) = caption.as_deref().filter(|c| !c.is_empty()) {
                out.extend(wrap_text(caption, width));
            }
            out
        }
    }
}

/// Word-wrap by display width: split on newlines first, then on spaces,
/// breaking words that are wider than a whole line.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.width() <= max_width {
            result.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            let sep = usize::from(!current.is_empty());
            if current.width() + sep + word.width() <= max_width {
                if sep == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                continue;
            }
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            for c in word.chars() {
                if current.width() + c.width().unwrap_or(0) > max_width {
                    result.push(std::mem::take(&mut current));
                }
                current.push(c);
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }
    if result.is_empty() {
        result.push(String::new());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MessageEnvelope;
    use crate::chat::{Event, Inbound};
    use crate::models::Author;
    use chrono::{TimeZone, Utc};
    use std::time::{Duration, Instant};

    fn author(id: &str, name: &str) -> Author {
        Author {
            id: id.into(),
            display_name: name.into(),
            avatar: None,
        }
    }

    fn incoming(id: &str, from: Author, minute: u32) -> Event {
        Event::Channel(Inbound::NewMessage(MessageEnvelope {
            message: Message {
                id: id.into(),
                ticket_id: "T-1".into(),
                author: from,
                body: MessageBody::Text("the printer is jammed".into()),
                created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap(),
            },
            seen_by: Vec::new(),
        }))
    }

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn test_headers_show_presence_and_readers() {
        let mut conv = Conversation::new("T-1", author("u1", "Alex"), 20, Duration::from_secs(3));
        let now = Instant::now();
        conv.handle(incoming("m1", author("u2", "Sam"), 30), now);
        conv.handle(incoming("m2", author("u1", "Alex"), 31), now);
        conv.handle(
            Event::Channel(Inbound::Online {
                user_id: "u2".into(),
            }),
            now,
        );
        conv.handle(
            Event::Channel(Inbound::Seen {
                message_id: "m2".into(),
                user_id: "u2".into(),
            }),
            now,
        );

        let messages = conv.messages();
        let (lines, owners) = build_message_lines(&messages, &conv, 60);
        let headers: Vec<String> = lines
            .iter()
            .zip(&owners)
            .enumerate()
            .filter(|(i, (_, owner))| owner.is_some() && (*i == 0 || owners[i - 1].is_none()))
            .map(|(_, (line, _))| text_of(line))
            .collect();

        assert_eq!(headers, vec![" Sam *  09:30", " Alex  09:31  seen by Sam"]);
    }

    #[test]
    fn test_wrap_text_by_words() {
        assert_eq!(
            wrap_text("the projector in room 4 is broken", 12),
            vec!["the", "projector in", "room 4 is", "broken"]
        );
    }

    #[test]
    fn test_wrap_text_breaks_long_words() {
        assert_eq!(
            wrap_text("https://cdn.example/x.png", 10),
            vec!["https://cd", "n.example/", "x.png"]
        );
    }

    #[test]
    fn test_wrap_text_keeps_newlines_and_empty() {
        assert_eq!(wrap_text("a\nb", 10), vec!["a", "b"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn test_top_reported_once_per_oldest_message() {
        let mut state = MessagesState {
            oldest_on_screen: Some("m1".into()),
            visible: vec!["m1".into(), "m2".into()],
            ..Default::default()
        };
        let report = state.take_report();
        assert!(report.scrolled_to_top);
        assert_eq!(report.visible, vec!["m1", "m2"]);

        state.oldest_on_screen = Some("m1".into());
        assert!(!state.take_report().scrolled_to_top);

        // Scrolling against the top asks again (retry after a failed page).
        state.oldest_on_screen = Some("m1".into());
        state.scroll_up(1);
        assert!(state.take_report().scrolled_to_top);

        // Older history arrived: new oldest message.
        state.oldest_on_screen = Some("m0".into());
        assert!(state.take_report().scrolled_to_top);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut state = MessagesState {
            max_scroll: 5,
            ..Default::default()
        };
        state.scroll_up(3);
        state.scroll_up(10);
        assert_eq!(state.scroll_from_bottom, 5);
        state.scroll_down(100);
        assert_eq!(state.scroll_from_bottom, 0);
    }
}
