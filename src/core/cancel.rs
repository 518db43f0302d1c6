//! Cooperative cancellation for command runs.
//!
//! Every run of an [`AsyncCommand`](crate::core::AsyncCommand) receives a
//! [`CancelSignal`]. Work polls or awaits the signal and unwinds on its own;
//! nothing is aborted forcibly. The [`CancellationController`] owns the signal
//! of the active run and decides whether a cancel request is currently allowed.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Failure kind produced by work that unwound because its signal was triggered.
///
/// Commands treat any error whose chain contains `Cancelled` as a normal
/// termination, see [`is_cancellation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation was cancelled")]
pub struct Cancelled;

/// Returns true if `error` (or anything it wraps) is a [`Cancelled`].
pub fn is_cancellation(error: &color_eyre::Report) -> bool {
    error.chain().any(|cause| cause.is::<Cancelled>())
}

type Callback = Box<dyn FnOnce() + Send>;

/// One-shot, observable "cancellation requested" flag.
///
/// Cloning is cheap and every clone observes the same flag.
#[derive(Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    callbacks: Arc<Mutex<Vec<Callback>>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger the signal. Later calls are no-ops.
    ///
    /// Registered callbacks run on the calling thread, after the flag is set.
    pub fn trigger(&self) {
        self.token.cancel();
        let callbacks = std::mem::take(&mut *self.lock_callbacks());
        for callback in callbacks {
            callback();
        }
    }

    /// Register a callback that runs exactly once when the signal triggers.
    ///
    /// If the signal has already been triggered the callback runs immediately.
    pub fn on_triggered(&self, callback: impl FnOnce() + Send + 'static) {
        let mut callbacks = self.lock_callbacks();
        if self.token.is_cancelled() {
            drop(callbacks);
            callback();
        } else {
            callbacks.push(Box::new(callback));
        }
    }

    /// Wait until the signal is triggered.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// `Err(Cancelled)` once the signal has been triggered.
    ///
    /// Meant for `?` at the checkpoints of a work function.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_triggered() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Drive `future` until it finishes or the signal triggers, whichever comes first.
    pub async fn run_until_cancelled<F>(&self, future: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Cancelled),
            output = future => Ok(output),
        }
    }

    /// The underlying token, for APIs that accept a `tokio_util` token directly.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn lock_callbacks(&self) -> MutexGuard<'_, Vec<Callback>> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("triggered", &self.is_triggered())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    signal: Option<CancelSignal>,
    enabled: bool,
}

/// Owns the cancellation signal of the active run.
///
/// A run ends either by completing or by being cancelled, and both paths can
/// race. `end_run` and `request_cancel` therefore converge on the same state
/// (disabled, no signal) and the signal is triggered at most once.
#[derive(Debug, Default)]
pub struct CancellationController {
    state: Mutex<ControllerState>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The signal of the current run, created on first access.
    pub fn token(&self) -> CancelSignal {
        self.lock()
            .signal
            .get_or_insert_with(CancelSignal::new)
            .clone()
    }

    /// Whether a cancel request would currently do anything.
    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Mark cancellation as enabled for a new run.
    ///
    /// Enabling twice without an intervening `end_run` is a programming error.
    pub fn begin_run(&self) {
        let mut state = self.lock();
        debug_assert!(!state.enabled, "cannot enable cancellation twice");
        state.enabled = true;
    }

    /// Disable cancellation and discard the signal.
    ///
    /// Returns true if cancellation was enabled before the call. Calling this
    /// after `request_cancel` already disabled the run is fine.
    pub fn end_run(&self) -> bool {
        let mut state = self.lock();
        state.signal = None;
        std::mem::replace(&mut state.enabled, false)
    }

    /// Trigger the current signal if cancellation is enabled.
    ///
    /// Returns true if this call disabled cancellation. The signal is
    /// triggered after the internal lock is released, so `on_triggered`
    /// callbacks may query the controller.
    pub fn request_cancel(&self) -> bool {
        let signal = {
            let mut state = self.lock();
            if !state.enabled {
                return false;
            }
            state.enabled = false;
            state.signal.take()
        };
        if let Some(signal) = signal {
            debug!("Triggering cancellation signal");
            signal.trigger();
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use color_eyre::eyre::{WrapErr, eyre};

    use super::*;

    #[test]
    fn test_trigger_runs_callbacks_once() {
        let signal = CancelSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        signal.on_triggered(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        signal.trigger();
        signal.trigger();

        assert!(signal.is_triggered());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_triggered_after_trigger_runs_immediately() {
        let signal = CancelSignal::new();
        signal.trigger();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        signal.on_triggered(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_the_flag() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        assert!(clone.check().is_ok());

        signal.trigger();

        assert_eq!(clone.check(), Err(Cancelled));
        assert!(clone.token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_cancelled() {
        let signal = CancelSignal::new();
        let finished = signal
            .run_until_cancelled(tokio::time::sleep(Duration::from_secs(1)))
            .await;
        assert_eq!(finished, Ok(()));

        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger();
        });
        let interrupted = signal
            .run_until_cancelled(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert_eq!(interrupted, Err(Cancelled));
    }

    #[test]
    fn test_is_cancellation_looks_through_context() {
        let wrapped = Err::<(), _>(Cancelled)
            .wrap_err("reversing input")
            .unwrap_err();
        assert!(is_cancellation(&wrapped));
        assert!(!is_cancellation(&eyre!("disk full")));
    }

    #[test]
    fn test_controller_token_is_reused_within_a_run() {
        let controller = CancellationController::new();
        let first = controller.token();
        let second = controller.token();
        controller.begin_run();

        assert!(controller.request_cancel());
        assert!(first.is_triggered());
        assert!(second.is_triggered());
    }

    #[test]
    fn test_controller_request_cancel_is_idempotent() {
        let controller = CancellationController::new();
        let signal = controller.token();
        let triggers = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&triggers);
        signal.on_triggered(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!controller.request_cancel(), "not enabled before the run");
        controller.begin_run();
        assert!(controller.is_enabled());
        assert!(controller.request_cancel());
        assert!(!controller.request_cancel());
        assert!(!controller.is_enabled());
        assert_eq!(triggers.load(Ordering::SeqCst), 1);

        // completion after cancellation converges on the same state
        assert!(!controller.end_run());
    }

    #[test]
    fn test_controller_end_run_discards_signal() {
        let controller = CancellationController::new();
        let old = controller.token();
        controller.begin_run();
        assert!(controller.end_run());
        assert!(!controller.end_run());

        let fresh = controller.token();
        controller.begin_run();
        controller.request_cancel();

        assert!(!old.is_triggered());
        assert!(fresh.is_triggered());
    }

    #[test]
    #[should_panic(expected = "cannot enable cancellation twice")]
    #[cfg(debug_assertions)]
    fn test_controller_begin_twice_panics() {
        let controller = CancellationController::new();
        controller.begin_run();
        controller.begin_run();
    }
}
