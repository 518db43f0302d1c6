//! Widgets of the demo window.
//!
//! Views keep their own UI state and report user interaction to the app as
//! events through [`KeyResult`].

mod run_status;
mod text_input;

pub use run_status::{FinishedRun, RunStatusView};
pub use text_input::{TextInputEvent, TextInputView};

use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::Rect;

use crate::theme::Theme;

/// Result of handling a key event.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyResult<E> {
    /// Not handled, the parent should process it.
    Ignored,
    /// Handled without producing an event.
    Consumed,
    Event(E),
}

impl<E> From<E> for KeyResult<E> {
    fn from(event: E) -> Self {
        Self::Event(event)
    }
}

pub trait View {
    type Event;

    fn handle_key(&mut self, _key: KeyEvent) -> KeyResult<Self::Event> {
        KeyResult::Ignored
    }

    /// Called on each tick for animations.
    fn on_tick(&mut self) {}

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme);
}
