use std::sync::Arc;
use std::time::{Duration, Instant};

use asyncmd::core::command::{CANCEL_ENABLED, RUNNING};
use asyncmd::core::{Command, Requery, RunInfo, Subscription};
use color_eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::Frame;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::config::AppConfig;
use crate::config::keybindings::Action;
use crate::model::{BACKGROUND, CANCELED_OUTPUT, DemoModel, OUTPUT};
use crate::theme::Theme;
use crate::tui::{Event, Tui};
use crate::view::{FinishedRun, KeyResult, RunStatusView, TextInputEvent, TextInputView, View};

/// Messages produced off the terminal event stream: change notifications
/// and finished background work.
#[derive(Debug)]
pub enum AppMessage {
    ModelChanged(String),
    CommandChanged(String),
    /// Captured while the run's start is published.
    RunStarted(RunInfo),
    RunStopped,
    RunFinished {
        name: String,
        result: FinishedRun,
        elapsed: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Input,
    Delay,
}

pub struct App {
    config: AppConfig,
    theme: Theme,
    model: DemoModel,
    input: TextInputView,
    delay: TextInputView,
    status: RunStatusView,
    focus: Focus,
    can_run: bool,
    can_clear: bool,
    message_tx: UnboundedSender<AppMessage>,
    message_rx: UnboundedReceiver<AppMessage>,
    requery_rx: watch::Receiver<u64>,
    _subscriptions: Vec<Subscription>,
    should_quit: bool,
}

impl App {
    /// Must be called inside a tokio runtime; the model starts its background loop.
    pub fn new(config: AppConfig, theme: Theme, requery: &Requery) -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let model = DemoModel::new(config.model_settings(), requery.clone());

        let forward = |wrap: fn(String) -> AppMessage| {
            let tx = message_tx.clone();
            move |attribute: &str| {
                let _ = tx.send(wrap(attribute.to_string()));
            }
        };
        let run_state = {
            let command = Arc::downgrade(model.reverse_command());
            let tx = message_tx.clone();
            move |_: &str| {
                let message = match command.upgrade().and_then(|command| command.current_run()) {
                    Some(run) => AppMessage::RunStarted(run),
                    None => AppMessage::RunStopped,
                };
                let _ = tx.send(message);
            }
        };
        let reverse = model.reverse_command().properties();
        let subscriptions = vec![
            model
                .properties()
                .subscribe_scoped(OUTPUT, forward(AppMessage::ModelChanged)),
            model
                .properties()
                .subscribe_scoped(BACKGROUND, forward(AppMessage::ModelChanged)),
            reverse.subscribe_scoped(RUNNING, run_state),
            reverse.subscribe_scoped(CANCEL_ENABLED, forward(AppMessage::CommandChanged)),
        ];

        let mut input = TextInputView::new("Input").with_value(model.input());
        input.set_focused(true);
        let delay = TextInputView::new("Delay (seconds)").with_value(model.delay_text());

        let mut app = Self {
            config,
            theme,
            model,
            input,
            delay,
            status: RunStatusView::new(),
            focus: Focus::Input,
            can_run: false,
            can_clear: false,
            message_tx,
            message_rx,
            requery_rx: requery.subscribe(),
            _subscriptions: subscriptions,
            should_quit: false,
        };
        app.requery();
        app
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new(self.config.ui.frame_rate, self.config.ui.tick_rate)?;
        tui.enter()?;

        while !self.should_quit {
            tokio::select! {
                event = tui.next_event() => match event {
                    Some(event) => self.handle_event(&mut tui, event)?,
                    None => break,
                },
                Some(message) = self.message_rx.recv() => self.handle_message(message),
                Ok(()) = self.requery_rx.changed() => self.requery(),
            }
        }

        self.model.dispose();
        tui.exit()?;
        Ok(())
    }

    fn handle_event(&mut self, tui: &mut Tui, event: Event) -> Result<()> {
        match event {
            Event::Init => debug!("Terminal ready"),
            Event::Quit => self.quit(),
            Event::Error(error) => warn!(%error, "Terminal event error"),
            Event::Tick => self.status.on_tick(),
            Event::Render => self.render(tui)?,
            Event::Resize(width, height) => {
                tui.resize(Rect::new(0, 0, width, height))?;
                self.render(tui)?;
            }
            Event::Paste(text) => {
                let edit = self.focused_input().paste(&text);
                self.apply_edit(edit);
            }
            Event::Key(key) => self.handle_key(key),
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if let Some(action) = self.config.keybindings.action_for(&key) {
            self.perform(action);
            return;
        }
        if let KeyResult::Event(edit) = self.focused_input().handle_key(key) {
            self.apply_edit(edit);
        }
    }

    fn perform(&mut self, action: Action) {
        debug!(?action, "Performing action");
        match action {
            Action::Run => self.run_reverse(),
            Action::Cancel => {
                let cancel: Arc<dyn Command> = Arc::new(self.model.cancel_command().clone());
                self.invoke(cancel);
            }
            Action::ClearOutput => {
                let clear: Arc<dyn Command> = self.model.clear_command().clone();
                self.invoke(clear);
            }
            Action::FocusNext => self.set_focus(match self.focus {
                Focus::Input => Focus::Delay,
                Focus::Delay => Focus::Input,
            }),
            Action::Quit => self.quit(),
        }
    }

    fn run_reverse(&self) {
        let command = Arc::clone(self.model.reverse_command());
        let input = self.model.input();
        if !command.can_execute(&input) {
            debug!(command = command.name(), "Command is not executable");
            return;
        }

        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = match command.execute(input).await {
                Ok(outcome) => FinishedRun::Outcome(outcome),
                Err(error) => FinishedRun::Failed(error.to_string()),
            };
            let _ = tx.send(AppMessage::RunFinished {
                name: command.name().to_string(),
                result,
                elapsed: started.elapsed(),
            });
        });
    }

    /// Run a parameterless command through its type-erased interface.
    fn invoke(&self, command: Arc<dyn Command>) {
        if !command.can_execute(None) {
            debug!(command = command.name(), "Command is not executable");
            return;
        }
        tokio::spawn(async move {
            if let Err(error) = command.execute(None).await {
                warn!(command = command.name(), %error, "Command failed");
            }
        });
    }

    fn handle_message(&mut self, message: AppMessage) {
        trace!(?message, "Handling message");
        match message {
            AppMessage::RunStarted(run) => {
                self.status.start(self.model.reverse_command().name(), run);
            }
            AppMessage::RunStopped => self.status.stop(),
            AppMessage::CommandChanged(_) => {
                self.status
                    .set_cancel_enabled(self.model.cancel_command().is_enabled());
            }
            AppMessage::ModelChanged(attribute) if attribute == BACKGROUND => {
                self.status.set_background(self.model.background_status());
            }
            AppMessage::ModelChanged(attribute) => debug!(%attribute, "Model changed"),
            AppMessage::RunFinished {
                name,
                result,
                elapsed,
            } => {
                info!(command = %name, ?result, ?elapsed, "Command finished");
                self.status.finish(&name, result, elapsed);
            }
        }
    }

    /// Re-evaluate command eligibility after a requery broadcast.
    fn requery(&mut self) {
        self.can_run = self.model.reverse_command().can_execute(&self.model.input());
        self.can_clear = self.model.clear_command().can_execute(&());
        trace!(can_run = self.can_run, can_clear = self.can_clear, "Requeried commands");
    }

    fn focused_input(&mut self) -> &mut TextInputView {
        match self.focus {
            Focus::Input => &mut self.input,
            Focus::Delay => &mut self.delay,
        }
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.input.set_focused(focus == Focus::Input);
        self.delay.set_focused(focus == Focus::Delay);
    }

    fn apply_edit(&mut self, edit: TextInputEvent) {
        let TextInputEvent::Changed(value) = edit;
        match self.focus {
            Focus::Input => self.model.set_input(value),
            Focus::Delay => {
                self.model.set_delay_text(&value);
                self.delay.set_invalid(self.model.delay().is_none());
            }
        }
    }

    fn quit(&mut self) {
        info!("Quitting");
        self.model.dispose();
        self.should_quit = true;
    }

    fn render(&mut self, tui: &mut Tui) -> Result<()> {
        tui.draw(|frame| self.draw(frame))?;
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let theme = self.theme;
        let window = Block::default()
            .title(" asyncmd ")
            .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.border))
            .style(Style::default().bg(theme.base));
        let inner = window.inner(frame.area());
        frame.render_widget(window, frame.area());

        let [input_area, delay_area, output_area, status_area, hints_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .areas(inner);

        self.input.render(frame, input_area, &theme);
        self.delay.render(frame, delay_area, &theme);

        let output = self.model.output();
        let output_color = if output == CANCELED_OUTPUT {
            theme.warning
        } else {
            theme.success
        };
        let output_block = Block::default()
            .title(" Output ")
            .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface));
        frame.render_widget(
            Paragraph::new(output)
                .style(Style::default().fg(output_color))
                .block(output_block),
            output_area,
        );

        self.status.render(frame, status_area, &theme);
        frame.render_widget(Paragraph::new(self.hints()), hints_area);
    }

    fn hints(&self) -> Line<'static> {
        let theme = &self.theme;
        let mut spans = Vec::new();
        for action in Action::ALL {
            let available = match action {
                Action::Run => self.can_run,
                Action::Cancel => self.model.cancel_command().is_enabled(),
                Action::ClearOutput => self.can_clear,
                Action::FocusNext | Action::Quit => true,
            };
            let (key_style, label_style) = if available {
                (
                    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
                    Style::default().fg(theme.subtext),
                )
            } else {
                let dim = Style::default().fg(theme.overlay).add_modifier(Modifier::DIM);
                (dim, dim)
            };
            if !spans.is_empty() {
                spans.push(Span::raw("  "));
            }
            spans.push(Span::styled(
                self.config.keybindings.binding(action).display(),
                key_style,
            ));
            spans.push(Span::styled(format!(" {}", action.label()), label_style));
        }
        Line::from(spans)
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyModifiers};

    use super::*;
    use crate::model::BackgroundStatus;

    fn app() -> App {
        App::new(AppConfig::default(), Theme::default(), &Requery::new())
    }

    fn press(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        app.handle_key(KeyEvent::new(code, modifiers));
    }

    fn drain(app: &mut App) {
        while let Ok(message) = app.message_rx.try_recv() {
            app.handle_message(message);
        }
        app.requery();
    }

    #[tokio::test(start_paused = true)]
    async fn test_editing_input_requeries_run() {
        let mut app = app();
        assert!(app.can_run);

        press(&mut app, KeyCode::Char('u'), KeyModifiers::CONTROL);
        drain(&mut app);

        assert_eq!(app.model.input(), "");
        assert!(!app.can_run);
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_moves_typing_to_delay() {
        let mut app = app();
        press(&mut app, KeyCode::Tab, KeyModifiers::NONE);
        press(&mut app, KeyCode::Char('x'), KeyModifiers::NONE);
        drain(&mut app);

        assert_eq!(app.model.input(), "Test string");
        assert_eq!(app.model.delay(), None);
        assert!(!app.can_run);

        press(&mut app, KeyCode::Backspace, KeyModifiers::NONE);
        drain(&mut app);
        assert_eq!(app.model.delay(), Some(Duration::from_secs(5)));
        assert!(app.can_run);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_then_cancel_from_keys() {
        let mut app = app();
        press(&mut app, KeyCode::F(5), KeyModifiers::NONE);
        tokio::time::sleep(Duration::from_secs(1)).await;
        drain(&mut app);

        assert!(app.status.is_running());
        assert!(!app.can_run);

        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        tokio::time::sleep(Duration::from_millis(10)).await;
        drain(&mut app);

        assert_eq!(app.model.output(), CANCELED_OUTPUT);
        assert!(!app.status.is_running());
        assert_eq!(app.model.reverse_command().current_run(), None);
        assert!(app.can_run);
        assert!(app.can_clear);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_finish_keeps_next_run_active() {
        let mut app = app();
        press(&mut app, KeyCode::F(5), KeyModifiers::NONE);
        tokio::time::sleep(Duration::from_secs(1)).await;
        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        tokio::time::sleep(Duration::from_millis(10)).await;
        press(&mut app, KeyCode::F(5), KeyModifiers::NONE);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(app.model.reverse_command().is_running());

        // the first run's result is handled after the second run started
        let mut pending = Vec::new();
        let mut finished = Vec::new();
        while let Ok(message) = app.message_rx.try_recv() {
            match message {
                AppMessage::RunFinished { .. } => finished.push(message),
                message => pending.push(message),
            }
        }
        assert_eq!(finished.len(), 1);
        for message in pending.into_iter().chain(finished) {
            app.handle_message(message);
        }

        assert!(app.status.is_running());
        assert_eq!(app.status.history_names(), vec!["Reverse input run-0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_disposes_model() {
        let mut app = app();
        press(&mut app, KeyCode::Char('q'), KeyModifiers::CONTROL);

        assert!(app.should_quit);
        assert!(matches!(
            app.model.background_status(),
            BackgroundStatus::Stopped { .. }
        ));
    }
}
