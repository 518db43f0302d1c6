use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::{CANCEL_ENABLED, Command, Parameter};
use crate::core::cancel::CancellationController;
use crate::core::observable::PropertyChanged;

/// Cancel trigger paired with an [`AsyncCommand`](super::AsyncCommand).
///
/// Executable exactly while the owning command has an active, not yet
/// cancelled run. It ignores its parameter. Changes of that state are notified
/// as [`CANCEL_ENABLED`] on the owning command's properties.
#[derive(Debug, Clone)]
pub struct CancelCommand {
    name: String,
    transitions: Arc<Mutex<()>>,
    cancellation: Arc<CancellationController>,
    properties: PropertyChanged,
}

impl CancelCommand {
    pub(super) const fn new(
        name: String,
        transitions: Arc<Mutex<()>>,
        cancellation: Arc<CancellationController>,
        properties: PropertyChanged,
    ) -> Self {
        Self {
            name,
            transitions,
            cancellation,
            properties,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cancellation.is_enabled()
    }

    /// Same as [`AsyncCommand::cancel`](super::AsyncCommand::cancel).
    pub fn cancel(&self) -> bool {
        cancel_active_run(
            &self.name,
            &self.transitions,
            &self.cancellation,
            &self.properties,
        )
    }
}

#[async_trait]
impl Command for CancelCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_execute(&self, _parameter: Option<&(dyn Any + Send)>) -> bool {
        self.is_enabled()
    }

    async fn execute(&self, _parameter: Parameter) -> color_eyre::Result<()> {
        self.cancel();
        Ok(())
    }
}

/// Cancel under the owning command's transition lock, so the disabled
/// notification cannot land after the next run's enabled one.
pub(super) fn cancel_active_run(
    name: &str,
    transitions: &Mutex<()>,
    cancellation: &CancellationController,
    properties: &PropertyChanged,
) -> bool {
    let _transition = lock_transitions(transitions);
    if !cancellation.request_cancel() {
        return false;
    }
    debug!(command = name, "Cancellation requested");
    properties.notify(CANCEL_ENABLED);
    true
}

pub(super) fn lock_transitions(transitions: &Mutex<()>) -> MutexGuard<'_, ()> {
    transitions.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::core::cancel::Cancelled;
    use crate::core::command::{AsyncCommand, RunOutcome};
    use crate::core::requery::Requery;

    #[tokio::test]
    async fn test_cancel_command_follows_run_state() {
        let command = Arc::new(
            AsyncCommand::from_fn("wait", |signal| async move {
                signal.cancelled().await;
                Err(Cancelled.into())
            })
            .with_requery(Requery::new()),
        );
        let cancel = command.cancel_command();
        assert_eq!(cancel.name(), "Cancel wait");
        assert!(!cancel.can_execute(None));

        let task = tokio::spawn({
            let command = Arc::clone(&command);
            async move { command.execute(()).await }
        });
        while !command.is_running() {
            tokio::task::yield_now().await;
        }

        assert!(cancel.can_execute(Some(&"ignored")));
        cancel.execute(None).await.unwrap();
        assert!(!cancel.can_execute(None));
        // a second trigger from the bound cancel command is harmless
        cancel.execute(None).await.unwrap();

        assert_eq!(task.await.unwrap().unwrap(), RunOutcome::Cancelled);
        assert!(!cancel.is_enabled());
    }

    #[tokio::test]
    async fn test_cancel_command_notifies_owner_properties() {
        let command = Arc::new(
            AsyncCommand::from_fn("wait", |signal| async move {
                signal.cancelled().await;
                Ok(())
            })
            .with_requery(Requery::new()),
        );
        let seen = Arc::new(Mutex::new(0_usize));
        let sink = Arc::clone(&seen);
        command.properties().subscribe(CANCEL_ENABLED, move |_| {
            *sink.lock().unwrap() += 1;
        });

        let task = tokio::spawn({
            let command = Arc::clone(&command);
            async move { command.execute(()).await }
        });
        while !command.is_running() {
            tokio::task::yield_now().await;
        }
        assert!(command.cancel_command().cancel());
        assert_eq!(task.await.unwrap().unwrap(), RunOutcome::Completed);

        // enabled on start, disabled by the cancel, nothing more on completion
        assert_eq!(*seen.lock().unwrap(), 2);
    }
}
