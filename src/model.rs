//! View model of the demo window.
//!
//! Holds the editable fields, the reverse command bound to them and the
//! background poll loop. Every field change is published on
//! [`DemoModel::properties`] and followed by a requery, because the reverse
//! command's eligibility reads the fields.

pub mod background;
pub mod delay;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use asyncmd::core::{
    AsyncCommand, CancelCommand, CancelSignal, Cancelled, DelegateCommand, PropertyChanged,
    Requery,
};
use tracing::info;

pub use background::{BackgroundPolicy, BackgroundPoller, BackgroundStatus};

pub const INPUT: &str = "input";
pub const DELAY: &str = "delay";
pub const OUTPUT: &str = "output";
pub const BACKGROUND: &str = "background";

/// Output shown when a reverse run was cancelled.
pub const CANCELED_OUTPUT: &str = "--canceled--";

/// Initial values for a [`DemoModel`].
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub input: String,
    pub delay: Duration,
    pub policy: BackgroundPolicy,
    pub poll_interval: Duration,
}

#[derive(Debug, Default)]
struct Fields {
    input: String,
    /// `None` while the delay field holds invalid text.
    delay: Option<Duration>,
    output: String,
}

type SharedFields = Arc<Mutex<Fields>>;

pub struct DemoModel {
    fields: SharedFields,
    properties: PropertyChanged,
    requery: Requery,
    reverse: Arc<AsyncCommand<String>>,
    cancel_reverse: CancelCommand,
    clear_output: Arc<DelegateCommand<()>>,
    background: BackgroundPoller,
    disposed: bool,
}

impl DemoModel {
    /// Build the model and start its background loop on the current runtime.
    pub fn new(settings: ModelSettings, requery: Requery) -> Self {
        let fields: SharedFields = Arc::new(Mutex::new(Fields {
            input: settings.input,
            delay: Some(settings.delay),
            output: String::new(),
        }));
        let properties = PropertyChanged::new();
        let background = BackgroundPoller::start(settings.poll_interval, properties.clone());

        let reverse = Arc::new(
            reverse_command(
                Arc::clone(&fields),
                properties.clone(),
                (settings.policy == BackgroundPolicy::AutoLink).then(|| background.signal()),
            )
            .with_requery(requery.clone()),
        );
        let cancel_reverse = reverse.cancel_command();
        let clear_output = Arc::new(clear_command(
            Arc::clone(&fields),
            properties.clone(),
            requery.clone(),
        ));

        info!(policy = ?settings.policy, "Demo model created");
        Self {
            fields,
            properties,
            requery,
            reverse,
            cancel_reverse,
            clear_output,
            background,
            disposed: false,
        }
    }

    pub const fn properties(&self) -> &PropertyChanged {
        &self.properties
    }

    pub const fn reverse_command(&self) -> &Arc<AsyncCommand<String>> {
        &self.reverse
    }

    pub const fn cancel_command(&self) -> &CancelCommand {
        &self.cancel_reverse
    }

    pub const fn clear_command(&self) -> &Arc<DelegateCommand<()>> {
        &self.clear_output
    }

    pub fn input(&self) -> String {
        lock(&self.fields).input.clone()
    }

    pub fn set_input(&self, input: impl Into<String>) {
        lock(&self.fields).input = input.into();
        self.changed(INPUT);
    }

    pub fn delay(&self) -> Option<Duration> {
        lock(&self.fields).delay
    }

    pub fn delay_text(&self) -> String {
        delay::format_delay(self.delay())
    }

    /// Update the delay from user text. Invalid text unsets the delay.
    pub fn set_delay_text(&self, text: &str) {
        lock(&self.fields).delay = delay::parse_delay(text);
        self.changed(DELAY);
    }

    pub fn output(&self) -> String {
        lock(&self.fields).output.clone()
    }

    pub fn background_status(&self) -> BackgroundStatus {
        self.background.status()
    }

    /// Stop the background loop and cancel any active reverse run.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.background.stop();
        self.reverse.cancel();
        self.disposed = true;
        info!("Demo model disposed");
    }

    fn changed(&self, attribute: &str) {
        self.properties.notify(attribute);
        self.requery.request();
    }
}

impl Drop for DemoModel {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn lock(fields: &Mutex<Fields>) -> MutexGuard<'_, Fields> {
    fields.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_output(fields: &Mutex<Fields>, properties: &PropertyChanged, output: String) {
    lock(fields).output = output;
    properties.notify(OUTPUT);
}

/// Waits for the configured delay, then publishes the reversed input.
fn reverse_command(
    fields: SharedFields,
    properties: PropertyChanged,
    linked_background: Option<CancelSignal>,
) -> AsyncCommand<String> {
    let eligibility = Arc::clone(&fields);
    AsyncCommand::new("Reverse input", move |input: String, signal: CancelSignal| {
        let fields = Arc::clone(&fields);
        let properties = properties.clone();
        let linked_background = linked_background.clone();
        async move {
            let delay = lock(&fields).delay.unwrap_or_default();
            let output = match signal.run_until_cancelled(tokio::time::sleep(delay)).await {
                Ok(()) => input.chars().rev().collect(),
                Err(Cancelled) => CANCELED_OUTPUT.to_string(),
            };
            set_output(&fields, &properties, output);

            if let Some(background) = linked_background {
                info!("Reverse finished, stopping linked background loop");
                background.trigger();
            }
            Ok(())
        }
    })
    .with_can_execute(move |_input| {
        let fields = lock(&eligibility);
        fields.delay.is_some_and(|delay| !delay.is_zero()) && !fields.input.is_empty()
    })
}

fn clear_command(
    fields: SharedFields,
    properties: PropertyChanged,
    requery: Requery,
) -> DelegateCommand<()> {
    let eligibility = Arc::clone(&fields);
    DelegateCommand::new("Clear output", move |()| {
        set_output(&fields, &properties, String::new());
        requery.request();
    })
    .with_can_execute(move |_| !lock(&eligibility).output.is_empty())
}

#[cfg(test)]
mod tests {
    use asyncmd::core::RunOutcome;

    use super::*;

    fn settings(policy: BackgroundPolicy) -> ModelSettings {
        ModelSettings {
            input: "abc".to_string(),
            delay: Duration::from_secs(5),
            policy,
            poll_interval: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverse_after_delay() {
        let model = DemoModel::new(settings(BackgroundPolicy::Manual), Requery::new());
        let command = Arc::clone(model.reverse_command());

        let outcome = command.execute(model.input()).await.unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(model.output(), "cba");
        assert!(matches!(
            model.background_status(),
            BackgroundStatus::Polling { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_delay_elapses() {
        let model = DemoModel::new(settings(BackgroundPolicy::Manual), Requery::new());
        let command = Arc::clone(model.reverse_command());

        let run = tokio::spawn({
            let command = Arc::clone(&command);
            let input = model.input();
            async move { command.execute(input).await }
        });
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(model.cancel_command().is_enabled());
        assert!(model.cancel_command().cancel());

        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(model.output(), CANCELED_OUTPUT);
        assert!(!model.cancel_command().is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_link_stops_background() {
        let model = DemoModel::new(settings(BackgroundPolicy::AutoLink), Requery::new());

        model
            .reverse_command()
            .execute(model.input())
            .await
            .unwrap();

        assert!(matches!(
            model.background_status(),
            BackgroundStatus::Stopped { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eligibility_follows_fields() {
        let model = DemoModel::new(settings(BackgroundPolicy::Manual), Requery::new());
        let command = model.reverse_command();
        assert!(command.can_execute(&model.input()));

        model.set_input("");
        assert!(!command.can_execute(&model.input()));

        model.set_input("xyz");
        model.set_delay_text("0");
        assert!(!command.can_execute(&model.input()));

        model.set_delay_text("later");
        assert_eq!(model.delay(), None);
        assert_eq!(model.delay_text(), "");
        assert!(!command.can_execute(&model.input()));

        model.set_delay_text("3");
        assert!(command.can_execute(&model.input()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_field_changes_request_requery() {
        let requery = Requery::new();
        let model = DemoModel::new(settings(BackgroundPolicy::Manual), requery.clone());

        model.set_input("hello");
        model.set_delay_text("2");

        assert_eq!(requery.generation(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_output() {
        let model = DemoModel::new(settings(BackgroundPolicy::Manual), Requery::new());
        assert!(!model.clear_command().can_execute(&()));

        model.reverse_command().execute(model.input()).await.unwrap();
        assert!(model.clear_command().execute(()));
        assert_eq!(model.output(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_background_and_active_run() {
        let mut model = DemoModel::new(settings(BackgroundPolicy::Manual), Requery::new());
        let command = Arc::clone(model.reverse_command());
        let run = tokio::spawn({
            let command = Arc::clone(&command);
            let input = model.input();
            async move { command.execute(input).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;

        model.dispose();
        model.dispose();
        run.await.unwrap().unwrap();

        assert!(matches!(
            model.background_status(),
            BackgroundStatus::Stopped { .. }
        ));
        assert_eq!(model.output(), CANCELED_OUTPUT);
    }
}
