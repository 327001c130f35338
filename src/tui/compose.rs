//! Compose box: single-line text input for the open ticket.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// State for the compose box.
#[derive(Default)]
pub struct ComposeState {
    /// Current input text.
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
}

impl ComposeState {
    /// Insert a character at the current cursor position.
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor (backspace).
    pub fn backspace(&mut self) -> bool {
        if self.cursor_pos == 0 {
            return false;
        }
        let byte_pos = self.char_to_byte(self.cursor_pos);
        let prev_byte_pos = self.char_to_byte(self.cursor_pos - 1);
        self.input.drain(prev_byte_pos..byte_pos);
        self.cursor_pos -= 1;
        true
    }

    /// Delete the character at the cursor (delete key).
    pub fn delete(&mut self) -> bool {
        if self.cursor_pos >= self.input.chars().count() {
            return false;
        }
        let byte_pos = self.char_to_byte(self.cursor_pos);
        let next_byte_pos = self.char_to_byte(self.cursor_pos + 1);
        self.input.drain(byte_pos..next_byte_pos);
        true
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    /// Clear all input text.
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Convert a char-based cursor position to a byte offset.
    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

/// Height of the compose box: border, input line, border.
pub const COMPOSE_HEIGHT: u16 = 3;

/// Render the compose box and place the terminal cursor in it.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, ticket_id: &str, sending: bool) {
    let title = if sending { " sending... " } else { "" };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(title, Style::default().fg(Color::DarkGray)));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let width = input_area.width as usize;

    if state.input.is_empty() {
        let placeholder = format!(" Message ticket {}...", ticket_id);
        let truncated: String = placeholder.chars().take(width).collect();
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                truncated,
                Style::default().fg(Color::DarkGray),
            ))),
            input_area,
        );
        frame.set_cursor_position((input_area.x + 1, input_area.y));
        return;
    }

    let display = compose_display_text(&state.input, state.cursor_pos, width);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            format!(" {}", display.visible),
            Style::default().fg(Color::White),
        ))),
        input_area,
    );
    frame.set_cursor_position((
        input_area.x + 1 + display.cursor_offset as u16,
        input_area.y,
    ));
}

/// What part of the input to show and where the cursor lands in it.
#[derive(Debug, PartialEq, Eq)]
struct DisplayText {
    visible: String,
    /// Cursor offset within `visible`, in terminal columns.
    cursor_offset: usize,
}

/// Scroll the input horizontally so the cursor stays inside `width - 1`
/// columns (one column is the leading margin).
fn compose_display_text(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    let avail = width.saturating_sub(1);
    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }

    let chars: Vec<char> = input.chars().collect();
    let cursor_pos = cursor_pos.min(chars.len());

    if input.width() < avail {
        let cursor_offset = chars[..cursor_pos].iter().filter_map(|c| c.width()).sum();
        return DisplayText {
            visible: input.to_string(),
            cursor_offset,
        };
    }

    // Walk left from the cursor until the window is full.
    let mut start = cursor_pos;
    let mut used = 0;
    while start > 0 {
        let w = chars[start - 1].width().unwrap_or(0);
        if used + w >= avail {
            break;
        }
        used += w;
        start -= 1;
    }

    let mut visible = String::new();
    let mut filled = 0;
    for c in &chars[start..] {
        let w = c.width().unwrap_or(0);
        if filled + w > avail {
            break;
        }
        visible.push(*c);
        filled += w;
    }

    DisplayText {
        visible,
        cursor_offset: used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editing_is_char_based() {
        let mut state = ComposeState::default();
        for c in "héllo".chars() {
            state.insert_char(c);
        }
        state.move_left();
        state.move_left();
        state.move_left();
        assert!(state.backspace());
        assert_eq!(state.input, "hllo");
        state.move_home();
        assert!(!state.backspace());
        assert!(state.delete());
        assert_eq!(state.input, "llo");
        state.move_end();
        assert!(!state.delete());
        state.clear();
        assert!(state.input.is_empty());
        assert_eq!(state.cursor_pos, 0);
    }

    #[test]
    fn test_short_input_is_not_scrolled() {
        let display = compose_display_text("hello", 2, 20);
        assert_eq!(display.visible, "hello");
        assert_eq!(display.cursor_offset, 2);
    }

    #[test]
    fn test_long_input_keeps_cursor_visible() {
        let input = "abcdefghijklmnopqrstuvwxyz";
        let display = compose_display_text(input, input.len(), 11);
        assert!(display.visible.ends_with('z'));
        assert!(display.cursor_offset < 10);
        assert!(display.visible.width() <= 10);
    }

    #[test]
    fn test_wide_chars_count_two_columns() {
        let display = compose_display_text("日本", 2, 20);
        assert_eq!(display.cursor_offset, 4);
    }
}
