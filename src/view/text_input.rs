use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};

use crate::theme::Theme;
use crate::view::{KeyResult, View};

#[derive(Debug, PartialEq, Eq)]
pub enum TextInputEvent {
    /// The value was edited.
    Changed(String),
}

/// A single-line editable field. The cursor counts characters, not bytes.
pub struct TextInputView {
    label: String,
    value: String,
    cursor: usize,
    focused: bool,
    invalid: bool,
}

impl TextInputView {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: String::new(),
            cursor: 0,
            focused: false,
            invalid: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self.cursor = self.char_count();
        self
    }

    pub const fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// Marks the field as holding text its owner could not accept.
    pub const fn set_invalid(&mut self, invalid: bool) {
        self.invalid = invalid;
    }

    /// Insert pasted text at the cursor. Line breaks are dropped.
    pub fn paste(&mut self, text: &str) -> TextInputEvent {
        for c in text.chars().filter(|c| !c.is_control()) {
            self.insert_char(c);
        }
        self.changed()
    }

    fn char_count(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.value
            .char_indices()
            .nth(cursor)
            .map_or(self.value.len(), |(index, _)| index)
    }

    fn insert_char(&mut self, c: char) {
        let index = self.byte_index(self.cursor);
        self.value.insert(index, c);
        self.cursor += 1;
    }

    fn delete_char_before_cursor(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let index = self.byte_index(self.cursor);
        self.value.remove(index);
        true
    }

    fn delete_char_at_cursor(&mut self) -> bool {
        if self.cursor >= self.char_count() {
            return false;
        }
        let index = self.byte_index(self.cursor);
        self.value.remove(index);
        true
    }

    fn delete_word_before_cursor(&mut self) -> bool {
        let chars: Vec<char> = self.value.chars().collect();
        let mut pos = self.cursor;
        while pos > 0 && chars[pos - 1] == ' ' {
            pos -= 1;
        }
        while pos > 0 && chars[pos - 1] != ' ' {
            pos -= 1;
        }
        if pos == self.cursor {
            return false;
        }
        let (start, end) = (self.byte_index(pos), self.byte_index(self.cursor));
        self.value.drain(start..end);
        self.cursor = pos;
        true
    }

    fn changed(&self) -> TextInputEvent {
        TextInputEvent::Changed(self.value.clone())
    }

    fn edited(&self, changed: bool) -> KeyResult<TextInputEvent> {
        if changed {
            self.changed().into()
        } else {
            KeyResult::Consumed
        }
    }
}

impl View for TextInputView {
    type Event = TextInputEvent;

    fn handle_key(&mut self, key: KeyEvent) -> KeyResult<Self::Event> {
        match (key.code, key.modifiers) {
            (KeyCode::Backspace, KeyModifiers::ALT) | (KeyCode::Char('w'), KeyModifiers::CONTROL) => {
                let changed = self.delete_word_before_cursor();
                self.edited(changed)
            }
            (KeyCode::Backspace, _) => {
                let changed = self.delete_char_before_cursor();
                self.edited(changed)
            }
            (KeyCode::Delete, _) => {
                let changed = self.delete_char_at_cursor();
                self.edited(changed)
            }
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                let changed = !self.value.is_empty();
                self.value.clear();
                self.cursor = 0;
                self.edited(changed)
            }
            (KeyCode::Left, _) => {
                self.cursor = self.cursor.saturating_sub(1);
                KeyResult::Consumed
            }
            (KeyCode::Right, _) => {
                self.cursor = (self.cursor + 1).min(self.char_count());
                KeyResult::Consumed
            }
            (KeyCode::Home, _) | (KeyCode::Char('a'), KeyModifiers::CONTROL) => {
                self.cursor = 0;
                KeyResult::Consumed
            }
            (KeyCode::End, _) | (KeyCode::Char('e'), KeyModifiers::CONTROL) => {
                self.cursor = self.char_count();
                KeyResult::Consumed
            }
            (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                self.insert_char(c);
                self.changed().into()
            }
            _ => KeyResult::Ignored,
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let input_style = Style::default().fg(theme.text);
        let line = if self.focused {
            let chars: Vec<char> = self.value.chars().collect();
            let before: String = chars[..self.cursor].iter().collect();
            let cursor_char = chars.get(self.cursor).copied().unwrap_or(' ');
            let after: String = chars.iter().skip(self.cursor + 1).collect();
            let cursor_style = Style::default()
                .fg(theme.base)
                .bg(theme.text)
                .add_modifier(Modifier::BOLD);
            Line::from(vec![
                Span::styled(before, input_style),
                Span::styled(cursor_char.to_string(), cursor_style),
                Span::styled(after, input_style),
            ])
        } else {
            Line::styled(self.value.clone(), input_style)
        };

        let border_color = match (self.invalid, self.focused) {
            (true, _) => theme.error,
            (false, true) => theme.border,
            (false, false) => theme.surface,
        };
        let title = if self.invalid {
            format!(" {} (invalid) ", self.label)
        } else {
            format!(" {} ", self.label)
        };
        let block = Block::default()
            .title(title)
            .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color));

        frame.render_widget(Paragraph::new(line).block(block), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_typing_reports_changes() {
        let mut input = TextInputView::new("Input").with_value("ab");
        assert_eq!(
            input.handle_key(key(KeyCode::Char('c'))),
            KeyResult::Event(TextInputEvent::Changed("abc".to_string()))
        );
        input.handle_key(key(KeyCode::Left));
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(input.value, "ac");
        assert_eq!(input.handle_key(key(KeyCode::End)), KeyResult::Consumed);
        assert_eq!(input.handle_key(key(KeyCode::Delete)), KeyResult::Consumed);
    }

    #[test]
    fn test_multibyte_characters() {
        let mut input = TextInputView::new("Input").with_value("héllo");
        input.handle_key(key(KeyCode::Home));
        input.handle_key(key(KeyCode::Right));
        input.handle_key(key(KeyCode::Delete));
        assert_eq!(input.value, "hllo");
        input.handle_key(key(KeyCode::Char('ë')));
        assert_eq!(input.value, "hëllo");
    }

    #[test]
    fn test_word_and_line_deletion() {
        let mut input = TextInputView::new("Input").with_value("hello big world");
        input.handle_key(ctrl('w'));
        assert_eq!(input.value, "hello big ");
        input.handle_key(ctrl('u'));
        assert_eq!(input.value, "");
        assert_eq!(input.handle_key(ctrl('u')), KeyResult::Consumed);
    }

    #[test]
    fn test_bound_keys_are_ignored() {
        let mut input = TextInputView::new("Input");
        assert_eq!(input.handle_key(key(KeyCode::Enter)), KeyResult::Ignored);
        assert_eq!(input.handle_key(key(KeyCode::Tab)), KeyResult::Ignored);
        assert_eq!(input.handle_key(ctrl('q')), KeyResult::Ignored);
    }

    #[test]
    fn test_paste_drops_line_breaks() {
        let mut input = TextInputView::new("Input");
        assert_eq!(
            input.paste("one\ntwo"),
            TextInputEvent::Changed("onetwo".to_string())
        );
    }
}
