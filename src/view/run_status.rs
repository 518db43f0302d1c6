use std::collections::VecDeque;
use std::time::{Duration, Instant};

use asyncmd::core::{RunId, RunInfo, RunOutcome};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};
use throbber_widgets_tui::{BRAILLE_SIX, Throbber, ThrobberState, WhichUse};

use crate::model::BackgroundStatus;
use crate::theme::Theme;
use crate::view::View;

const MAX_HISTORY: usize = 5;

/// How a run ended, as shown in the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishedRun {
    Outcome(RunOutcome),
    Failed(String),
}

#[derive(Debug)]
struct ActiveRun {
    id: RunId,
    name: String,
    started_at: Instant,
}

#[derive(Debug)]
struct HistoryEntry {
    name: String,
    result: FinishedRun,
    duration: Duration,
    completed_at: Instant,
}

/// Run state of the reverse command, cancel availability and the background loop.
pub struct RunStatusView {
    active: Option<ActiveRun>,
    /// Runs that went idle and still wait for their result, oldest first.
    ended: VecDeque<ActiveRun>,
    history: VecDeque<HistoryEntry>,
    cancel_enabled: bool,
    background: BackgroundStatus,
    throbber_state: ThrobberState,
}

impl RunStatusView {
    pub fn new() -> Self {
        Self {
            active: None,
            ended: VecDeque::new(),
            history: VecDeque::new(),
            cancel_enabled: false,
            background: BackgroundStatus::Polling { ticks: 0 },
            throbber_state: ThrobberState::default(),
        }
    }

    pub fn start(&mut self, name: impl Into<String>, run: RunInfo) {
        self.stop();
        self.active = Some(ActiveRun {
            id: run.id,
            name: name.into(),
            started_at: run.started_at,
        });
    }

    /// The active run went idle; its result arrives later through [`finish`](Self::finish).
    pub fn stop(&mut self) {
        if let Some(run) = self.active.take() {
            self.ended.push_back(run);
        }
    }

    /// Record the result of the oldest stopped run. A rejected call never
    /// started a run, so it is labelled by `name` alone.
    pub fn finish(&mut self, name: &str, result: FinishedRun, duration: Duration) {
        let run = match result {
            FinishedRun::Outcome(RunOutcome::Rejected) => None,
            _ => self.ended.pop_front(),
        };
        let name = run.map_or_else(|| name.to_string(), |run| format!("{} {}", run.name, run.id));
        self.history.push_front(HistoryEntry {
            name,
            result,
            duration,
            completed_at: Instant::now(),
        });
        self.history.truncate(MAX_HISTORY);
    }

    pub const fn set_cancel_enabled(&mut self, enabled: bool) {
        self.cancel_enabled = enabled;
    }

    pub const fn set_background(&mut self, status: BackgroundStatus) {
        self.background = status;
    }

    pub const fn is_running(&self) -> bool {
        self.active.is_some()
    }

    #[cfg(test)]
    pub(crate) fn history_names(&self) -> Vec<&str> {
        self.history.iter().map(|entry| entry.name.as_str()).collect()
    }

    fn status_line(&self, theme: &Theme) -> Line<'static> {
        let cancel = if self.cancel_enabled {
            Span::styled("cancel available", Style::default().fg(theme.warning))
        } else {
            Span::styled("cancel unavailable", Style::default().fg(theme.overlay))
        };
        let background = match self.background {
            BackgroundStatus::Polling { ticks } => Span::styled(
                format!("background polling ({ticks} ticks)"),
                Style::default().fg(theme.running),
            ),
            BackgroundStatus::Stopped { ticks } => Span::styled(
                format!("background stopped after {ticks} ticks"),
                Style::default().fg(theme.overlay),
            ),
        };
        Line::from(vec![cancel, Span::raw(" · "), background])
    }

    fn history_line(entry: &HistoryEntry, theme: &Theme) -> Line<'static> {
        let (icon, label, color) = match &entry.result {
            FinishedRun::Outcome(RunOutcome::Completed) => ("✓", "completed".to_string(), theme.success),
            FinishedRun::Outcome(RunOutcome::Cancelled) => ("⊘", "cancelled".to_string(), theme.warning),
            FinishedRun::Outcome(RunOutcome::Rejected) => ("·", "not executable".to_string(), theme.overlay),
            FinishedRun::Failed(message) => ("✗", format!("failed: {message}"), theme.error),
        };
        Line::from(vec![
            Span::styled(format!("  {icon} "), Style::default().fg(color)),
            Span::styled(entry.name.clone(), Style::default().fg(theme.text)),
            Span::styled(format!(" {label}"), Style::default().fg(color)),
            Span::styled(
                format!(
                    "  {} · {}",
                    format_duration(entry.duration),
                    format_age(entry.completed_at.elapsed())
                ),
                Style::default()
                    .fg(theme.overlay)
                    .add_modifier(Modifier::DIM),
            ),
        ])
    }
}

impl Default for RunStatusView {
    fn default() -> Self {
        Self::new()
    }
}

impl View for RunStatusView {
    type Event = ();

    fn on_tick(&mut self) {
        if self.is_running() {
            self.throbber_state.calc_next();
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let block = Block::default()
            .title(" Status ")
            .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [run_area, status_area, history_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .areas(inner);

        match &self.active {
            Some(run) => {
                let label = format!(
                    "{} {} {}",
                    run.name,
                    run.id,
                    format_duration(run.started_at.elapsed())
                );
                let throbber = Throbber::default()
                    .label(label)
                    .throbber_set(BRAILLE_SIX)
                    .use_type(WhichUse::Spin)
                    .throbber_style(Style::default().fg(theme.running))
                    .style(Style::default().fg(theme.text));
                frame.render_stateful_widget(throbber, run_area, &mut self.throbber_state);
            }
            None => frame.render_widget(
                Paragraph::new("idle").style(Style::default().fg(theme.subtext)),
                run_area,
            ),
        }

        frame.render_widget(Paragraph::new(self.status_line(theme)), status_area);

        let lines: Vec<Line> = self
            .history
            .iter()
            .map(|entry| Self::history_line(entry, theme))
            .collect();
        frame.render_widget(Paragraph::new(lines), history_area);
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 10.0 {
        format!("{secs:.1}s")
    } else if secs < 60.0 {
        format!("{secs:.0}s")
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

fn format_age(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 5 {
        "just now".to_string()
    } else if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
