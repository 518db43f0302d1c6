use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::cancel_command::{CancelCommand, cancel_active_run, lock_transitions};
use super::{
    CANCEL_ENABLED, CURRENT_RUN, Command, Parameter, RUNNING, downcast_parameter, take_parameter,
};
use crate::core::cancel::{CancelSignal, CancellationController, is_cancellation};
use crate::core::observable::PropertyChanged;
use crate::core::requery::Requery;

type Work<P> = dyn Fn(P, CancelSignal) -> BoxFuture<'static, color_eyre::Result<()>> + Send + Sync;
type Eligibility<P> = dyn Fn(&P) -> bool + Send + Sync;

/// Sequence number of a run, unique per command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Record of the in-flight run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunInfo {
    pub id: RunId,
    pub started_at: Instant,
}

/// How a call to [`AsyncCommand::execute`] ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The work function returned successfully.
    Completed,
    /// The work function unwound with a cancellation-kind error.
    Cancelled,
    /// The command was not executable; nothing ran.
    Rejected,
}

#[derive(Debug, Default)]
struct RunState {
    current: Option<RunInfo>,
    next_id: u64,
}

/// Asynchronous command with at-most-one concurrent run.
///
/// Wraps `work(parameter, signal)` behind `can_execute` / `execute` /
/// `cancel`, and publishes every state transition on [`properties`](Self::properties):
///
/// - idle → running: [`CURRENT_RUN`], [`RUNNING`], [`CANCEL_ENABLED`], then a [`Requery`]
/// - cancel requested: [`CANCEL_ENABLED`]
/// - running → idle: [`CURRENT_RUN`], [`RUNNING`], [`CANCEL_ENABLED`] unless already
///   cancelled, then a [`Requery`]
///
/// The running notifications are published before `work` is invoked and the idle
/// notifications after it has settled, so observers never see a state that
/// contradicts the work function.
pub struct AsyncCommand<P> {
    name: String,
    work: Box<Work<P>>,
    eligibility: Option<Box<Eligibility<P>>>,
    state: Mutex<RunState>,
    /// Serializes state changes together with their notifications. Shared
    /// with the paired [`CancelCommand`].
    transitions: Arc<Mutex<()>>,
    cancellation: Arc<CancellationController>,
    properties: PropertyChanged,
    requery: Requery,
}

impl<P: Send + 'static> AsyncCommand<P> {
    pub fn new<F, Fut>(name: impl Into<String>, work: F) -> Self
    where
        F: Fn(P, CancelSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = color_eyre::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            work: Box::new(move |parameter, signal| work(parameter, signal).boxed()),
            eligibility: None,
            state: Mutex::default(),
            transitions: Arc::default(),
            cancellation: Arc::default(),
            properties: PropertyChanged::new(),
            requery: Requery::global().clone(),
        }
    }
}

impl AsyncCommand<()> {
    /// Command whose work takes no parameter.
    pub fn from_fn<F, Fut>(name: impl Into<String>, work: F) -> Self
    where
        F: Fn(CancelSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = color_eyre::Result<()>> + Send + 'static,
    {
        Self::new(name, move |(), signal| work(signal))
    }
}

impl<P> AsyncCommand<P> {
    /// Only allow runs for which `predicate` holds. The predicate may read
    /// mutable state; it is evaluated on every check.
    #[must_use]
    pub fn with_can_execute(mut self, predicate: impl Fn(&P) -> bool + Send + Sync + 'static) -> Self {
        self.eligibility = Some(Box::new(predicate));
        self
    }

    /// Publish requery requests on `requery` instead of [`Requery::global`].
    #[must_use]
    pub fn with_requery(mut self, requery: Requery) -> Self {
        self.requery = requery;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn properties(&self) -> &PropertyChanged {
        &self.properties
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().current.is_some()
    }

    pub fn current_run(&self) -> Option<RunInfo> {
        self.lock_state().current
    }

    /// Whether a run is active and has not been cancelled yet.
    pub fn can_cancel(&self) -> bool {
        self.cancellation.is_enabled()
    }

    /// False while a run is active, otherwise the eligibility predicate
    /// (true when none was configured).
    pub fn can_execute(&self, parameter: &P) -> bool {
        !self.is_running()
            && self
                .eligibility
                .as_ref()
                .is_none_or(|eligible| eligible(parameter))
    }

    /// Request cancellation of the active run.
    ///
    /// Returns true if this call triggered the signal. Without an active run,
    /// or after the run was already cancelled, this is a silent no-op.
    pub fn cancel(&self) -> bool {
        cancel_active_run(
            &self.name,
            &self.transitions,
            &self.cancellation,
            &self.properties,
        )
    }

    /// The paired cancel trigger, bindable like any other command.
    pub fn cancel_command(&self) -> CancelCommand {
        CancelCommand::new(
            format!("Cancel {}", self.name),
            Arc::clone(&self.transitions),
            Arc::clone(&self.cancellation),
            self.properties.clone(),
        )
    }

    /// Run the work function once, if the command is executable.
    ///
    /// Returns [`RunOutcome::Rejected`] without running anything when
    /// `can_execute` is false. Cancellation-kind failures are reported as
    /// [`RunOutcome::Cancelled`]; any other failure is returned as is, after
    /// the command has gone back to idle.
    ///
    /// Dropping the returned future mid-run still returns the command to idle.
    pub async fn execute(&self, parameter: P) -> color_eyre::Result<RunOutcome> {
        if !self.can_execute(&parameter) {
            debug!(command = %self.name, "Command is not executable, ignoring");
            return Ok(RunOutcome::Rejected);
        }
        let Some((run, signal)) = self.begin() else {
            debug!(command = %self.name, "Command is already running, ignoring");
            return Ok(RunOutcome::Rejected);
        };

        let guard = RunGuard { command: self, run };
        let result = (self.work)(parameter, signal).await;
        drop(guard);

        match result {
            Ok(()) => Ok(RunOutcome::Completed),
            Err(error) if is_cancellation(&error) => {
                debug!(command = %self.name, run = %run.id, "Command cancelled");
                Ok(RunOutcome::Cancelled)
            }
            Err(error) => {
                warn!(command = %self.name, run = %run.id, error = %error, "Command failed");
                Err(error)
            }
        }
    }

    fn begin(&self) -> Option<(RunInfo, CancelSignal)> {
        let _transition = self.lock_transitions();
        let run = {
            let mut state = self.lock_state();
            if state.current.is_some() {
                return None;
            }
            let run = RunInfo {
                id: RunId(state.next_id),
                started_at: Instant::now(),
            };
            state.next_id += 1;
            state.current = Some(run);
            run
        };
        // The signal must exist before cancellation is enabled, otherwise an
        // early cancel would trigger nothing.
        let signal = self.cancellation.token();
        self.cancellation.begin_run();

        debug!(command = %self.name, run = %run.id, "Command started");
        self.publish(true);
        Some((run, signal))
    }

    fn finish(&self, run: RunInfo) {
        let _transition = self.lock_transitions();
        {
            let mut state = self.lock_state();
            debug_assert_eq!(state.current.map(|current| current.id), Some(run.id));
            state.current = None;
        }
        let cancel_changed = self.cancellation.end_run();

        debug!(
            command = %self.name,
            run = %run.id,
            elapsed_ms = run.started_at.elapsed().as_millis(),
            "Command finished"
        );
        self.publish(cancel_changed);
    }

    fn publish(&self, cancel_changed: bool) {
        self.properties.notify(CURRENT_RUN);
        self.properties.notify(RUNNING);
        if cancel_changed {
            self.properties.notify(CANCEL_ENABLED);
        }
        self.requery.request();
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_transitions(&self) -> MutexGuard<'_, ()> {
        lock_transitions(&self.transitions)
    }
}

/// Returns the command to idle when the run settles or its future is dropped.
struct RunGuard<'a, P> {
    command: &'a AsyncCommand<P>,
    run: RunInfo,
}

impl<P> Drop for RunGuard<'_, P> {
    fn drop(&mut self) {
        self.command.finish(self.run);
    }
}

impl<P> fmt::Debug for AsyncCommand<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCommand")
            .field("name", &self.name)
            .field("current_run", &self.current_run())
            .field("can_cancel", &self.can_cancel())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P> Command for AsyncCommand<P>
where
    P: Default + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn can_execute(&self, parameter: Option<&(dyn Any + Send)>) -> bool {
        match downcast_parameter::<P>(parameter) {
            Some(Some(parameter)) => Self::can_execute(self, parameter),
            Some(None) => Self::can_execute(self, &P::default()),
            None => false,
        }
    }

    async fn execute(&self, parameter: Parameter) -> color_eyre::Result<()> {
        match take_parameter::<P>(parameter) {
            Ok(parameter) => Self::execute(self, parameter).await.map(|_| ()),
            Err(_) => {
                debug!(command = %self.name, "Parameter has the wrong type, ignoring");
                Ok(())
            }
        }
    }
}
