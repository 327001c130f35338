//! TUI application state and main event loop

use anyhow::Result;
use crossterm::event::{Event as TermEvent, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;

use super::compose::ComposeState;
use super::messages::MessagesState;
use super::ui;
use crate::chat::{Event, Notice};
use crate::config::Config;
use crate::runtime::ConversationRuntime;

/// Lines moved per PageUp/PageDown.
const PAGE_LINES: usize = 10;

/// Application state
#[derive(Default)]
pub struct App {
    /// Whether the app should exit
    pub should_exit: bool,
    pub compose: ComposeState,
    pub messages: MessagesState,
    /// Latest notice, shown in the status bar
    pub status: Option<Notice>,
}

/// What woke the main loop.
enum Wake {
    Terminal(Option<std::io::Result<TermEvent>>),
    Conversation(Event),
}

impl App {
    /// Apply a key press. Returns the conversation events it produces.
    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Event> {
        if key.kind != KeyEventKind::Press {
            return Vec::new();
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => self.should_exit = true,
            KeyCode::Char('c') if ctrl => self.should_exit = true,
            KeyCode::Char('u') if ctrl => self.compose.clear(),
            KeyCode::Enter => {
                self.status = None;
                return vec![Event::Submit {
                    text: self.compose.input.clone(),
                }];
            }
            KeyCode::Char(c) if !ctrl => {
                self.compose.insert_char(c);
                return vec![Event::Keystroke];
            }
            KeyCode::Backspace => {
                if self.compose.backspace() {
                    return vec![Event::Keystroke];
                }
            }
            KeyCode::Delete => {
                if self.compose.delete() {
                    return vec![Event::Keystroke];
                }
            }
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            KeyCode::Up => self.messages.scroll_up(1),
            KeyCode::Down => self.messages.scroll_down(1),
            KeyCode::PageUp => self.messages.scroll_up(PAGE_LINES),
            KeyCode::PageDown => self.messages.scroll_down(PAGE_LINES),
            _ => {}
        }
        Vec::new()
    }

    /// Pick up side effects the runtime recorded for the view.
    fn absorb(&mut self, runtime: &mut ConversationRuntime) {
        if runtime.take_compose_cleared() {
            self.compose.clear();
        }
        if let Some(latest) = runtime.take_notices().pop() {
            self.status = Some(latest);
        }
    }
}

/// Open the conversation and run the TUI until the user quits.
pub async fn run(config: &Config, ticket_id: &str) -> Result<()> {
    let mut runtime = ConversationRuntime::open(config, ticket_id).await?;

    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, &mut runtime).await;
    ratatui::restore();

    runtime.close().await;
    result
}

async fn run_app(terminal: &mut DefaultTerminal, runtime: &mut ConversationRuntime) -> Result<()> {
    let mut app = App::default();
    let mut input = EventStream::new();

    while !app.should_exit {
        terminal.draw(|frame| ui::render(frame, &mut app, runtime.conversation()))?;

        let report = app.messages.take_report();
        if !report.visible.is_empty() {
            runtime.dispatch(Event::Visible {
                ids: report.visible,
            });
        }
        if report.scrolled_to_top {
            runtime.dispatch(Event::ScrolledToTop);
        }
        app.absorb(runtime);

        let wake = tokio::select! {
            term = input.next() => Wake::Terminal(term),
            event = runtime.next_event() => Wake::Conversation(event),
        };

        match wake {
            Wake::Terminal(Some(Ok(TermEvent::Key(key)))) => {
                for event in app.handle_key(key) {
                    runtime.dispatch(event);
                }
            }
            Wake::Terminal(Some(Ok(_))) => {
                // Resize and friends: redraw on the next iteration.
            }
            Wake::Terminal(Some(Err(e))) => return Err(e.into()),
            Wake::Terminal(None) => break,
            Wake::Conversation(event) => runtime.dispatch(event),
        }
        app.absorb(runtime);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_produces_keystrokes() {
        let mut app = App::default();
        assert!(matches!(
            app.handle_key(press(KeyCode::Char('h')))[..],
            [Event::Keystroke]
        ));
        app.handle_key(press(KeyCode::Char('i')));
        assert_eq!(app.compose.input, "hi");

        // Backspace on an empty box is not a keystroke.
        app.compose.clear();
        assert!(app.handle_key(press(KeyCode::Backspace)).is_empty());
    }

    #[test]
    fn test_enter_submits_without_clearing() {
        let mut app = App::default();
        app.compose.input = "hello".into();
        app.compose.move_end();
        let events = app.handle_key(press(KeyCode::Enter));
        assert!(matches!(&events[..], [Event::Submit { text }] if text == "hello"));
        // Cleared only when the conversation accepts the send.
        assert_eq!(app.compose.input, "hello");
    }

    #[test]
    fn test_quit_keys() {
        let mut app = App::default();
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_exit);

        let mut app = App::default();
        app.handle_key(press(KeyCode::Esc));
        assert!(app.should_exit);
        assert!(app.compose.input.is_empty());
    }
}
