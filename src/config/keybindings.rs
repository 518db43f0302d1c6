use crossterm::event::{KeyCode, KeyEvent};
use serde::{Deserialize, Serialize};

use crate::config::key::{Key, KeyBinding};

/// Actions the demo window binds to keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Run,
    Cancel,
    ClearOutput,
    FocusNext,
    Quit,
}

impl Action {
    pub const ALL: [Self; 5] = [
        Self::Run,
        Self::Cancel,
        Self::ClearOutput,
        Self::FocusNext,
        Self::Quit,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Cancel => "cancel",
            Self::ClearOutput => "clear",
            Self::FocusNext => "next field",
            Self::Quit => "quit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybindingsConfig {
    pub run: KeyBinding,
    pub cancel: KeyBinding,
    pub clear_output: KeyBinding,
    pub focus_next: KeyBinding,
    pub quit: KeyBinding,
}

impl Default for KeybindingsConfig {
    fn default() -> Self {
        Self {
            run: KeyBinding::Multiple(vec![Key::new(KeyCode::Enter), Key::new(KeyCode::F(5))]),
            cancel: KeyBinding::Multiple(vec![
                Key::new(KeyCode::Esc),
                Key::with_ctrl(KeyCode::Char('x')),
            ]),
            clear_output: Key::with_ctrl(KeyCode::Char('l')).into(),
            focus_next: KeyBinding::Multiple(vec![
                Key::new(KeyCode::Tab),
                Key::new(KeyCode::BackTab),
            ]),
            quit: Key::with_ctrl(KeyCode::Char('q')).into(),
        }
    }
}

impl KeybindingsConfig {
    pub const fn binding(&self, action: Action) -> &KeyBinding {
        match action {
            Action::Run => &self.run,
            Action::Cancel => &self.cancel,
            Action::ClearOutput => &self.clear_output,
            Action::FocusNext => &self.focus_next,
            Action::Quit => &self.quit,
        }
    }

    /// The first action bound to `event`, if any.
    pub fn action_for(&self, event: &KeyEvent) -> Option<Action> {
        Action::ALL
            .into_iter()
            .find(|action| self.binding(*action).matches(event))
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;

    use super::*;

    #[test]
    fn test_default_bindings_resolve() {
        let keybindings = KeybindingsConfig::default();
        let press = |code, modifiers| KeyEvent::new(code, modifiers);

        assert_eq!(
            keybindings.action_for(&press(KeyCode::F(5), KeyModifiers::NONE)),
            Some(Action::Run)
        );
        assert_eq!(
            keybindings.action_for(&press(KeyCode::Char('x'), KeyModifiers::CONTROL)),
            Some(Action::Cancel)
        );
        assert_eq!(
            keybindings.action_for(&press(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Some(Action::FocusNext)
        );
        assert_eq!(
            keybindings.action_for(&press(KeyCode::Char('q'), KeyModifiers::NONE)),
            None,
            "plain characters belong to the text fields"
        );
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let keybindings: KeybindingsConfig = toml::from_str("quit = \"ctrl+w\"").unwrap();
        assert_eq!(keybindings.quit.display(), "ctrl+w");
        assert_eq!(keybindings.run.display(), "Enter/F5");
    }
}
