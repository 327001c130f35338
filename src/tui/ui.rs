//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::App;
use super::compose;
use super::messages;
use crate::chat::{Conversation, NoticeLevel};

/// Returns status indicator symbol and color based on channel state
fn status_indicator(is_live: bool) -> (&'static str, Color) {
    if is_live {
        ("*", Color::Green)
    } else {
        ("o", Color::Red)
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &mut App, conversation: &Conversation) {
    let area = frame.area();

    // header, messages, typing line, compose box, status bar
    let [header_area, messages_area, typing_area, compose_area, status_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(compose::COMPOSE_HEIGHT),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(header_area, frame.buffer_mut(), conversation);
    messages::render(
        messages_area,
        frame.buffer_mut(),
        &mut app.messages,
        conversation,
    );
    render_typing(typing_area, frame.buffer_mut(), conversation);
    compose::render(
        compose_area,
        frame,
        &app.compose,
        conversation.ticket_id(),
        conversation.is_sending(),
    );
    render_status(status_area, frame.buffer_mut(), app, conversation);
}

fn render_header(area: Rect, buf: &mut Buffer, conversation: &Conversation) {
    let title = format!(" Ticket {}", conversation.ticket_id());
    let (symbol, color) = status_indicator(conversation.is_live());
    let online = format!(" {} {} online ", symbol, conversation.online_count());
    let user = format!(" {} ", conversation.me().display_name);

    let used = title.width() + online.width() + user.width();
    let padding = (area.width as usize).saturating_sub(used);

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(online, Style::default().fg(color)),
        Span::styled(user, Style::default().fg(Color::Cyan)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_typing(area: Rect, buf: &mut Buffer, conversation: &Conversation) {
    let Some(text) = typing_text(&conversation.typing_names()) else {
        return;
    };
    Paragraph::new(Line::from(Span::styled(
        format!(" {}", text),
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )))
    .render(area, buf);
}

fn typing_text(names: &[String]) -> Option<String> {
    match names {
        [] => None,
        [one] => Some(format!("{} is typing...", one)),
        many => Some(format!("{} are typing...", many.join(", "))),
    }
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App, conversation: &Conversation) {
    if let Some(notice) = &app.status {
        let fg = match notice.level {
            NoticeLevel::Error => Color::Red,
            NoticeLevel::Info => Color::Green,
        };
        Paragraph::new(Line::from(Span::styled(
            format!(" {} ", notice.text),
            Style::default().fg(fg),
        )))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
        return;
    }

    let sep_style = Style::default().fg(Color::Gray);
    let mut spans = vec![Span::styled(
        format!(" {} messages", conversation.message_count()),
        Style::default().fg(Color::Yellow),
    )];
    if conversation.is_loading_history() {
        spans.push(Span::styled(" | ", sep_style));
        spans.push(Span::styled("loading...", Style::default().fg(Color::Cyan)));
    } else if conversation.has_more_history() {
        spans.push(Span::styled(" | ", sep_style));
        spans.push(Span::styled("older above", Style::default().fg(Color::Gray)));
    }
    spans.push(Span::styled(" | ", sep_style));
    spans.push(Span::styled(
        "Enter: send  PgUp/PgDn: scroll  Esc: quit",
        Style::default().fg(Color::Gray),
    ));

    Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
