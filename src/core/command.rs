//! Command pattern for UI-triggered work.
//!
//! A command pairs an operation with an eligibility check so a front end can
//! enable or disable whatever triggers it. Hosts bind commands through the
//! type-erased [`Command`] trait; code that knows the parameter type uses the
//! concrete [`AsyncCommand`] or [`DelegateCommand`] API directly.

mod async_command;
mod cancel_command;
mod delegate;

use std::any::Any;

use async_trait::async_trait;
pub use async_command::{AsyncCommand, RunId, RunInfo, RunOutcome};
pub use cancel_command::CancelCommand;
pub use delegate::DelegateCommand;

/// Attribute notified when the run record of an [`AsyncCommand`] changes.
pub const CURRENT_RUN: &str = "current_run";
/// Attribute notified when an [`AsyncCommand`] flips between idle and running.
pub const RUNNING: &str = "running";
/// Attribute notified when cancellation becomes available or unavailable.
pub const CANCEL_ENABLED: &str = "cancel_enabled";
/// Attribute notified when a [`DelegateCommand`] asks for re-evaluation.
pub const CAN_EXECUTE: &str = "can_execute";

/// Dynamically typed command parameter, as handed over by a host.
///
/// `None` stands for "no parameter"; commands substitute `P::default()`.
pub type Parameter = Option<Box<dyn Any + Send>>;

/// Host-facing command interface.
///
/// Parameters of the wrong type never fail: `can_execute` returns false and
/// `execute` does nothing.
#[async_trait]
pub trait Command: Send + Sync {
    /// Human-readable name for status display and logs.
    fn name(&self) -> &str;

    /// Whether the command may run with `parameter` right now.
    fn can_execute(&self, parameter: Option<&(dyn Any + Send)>) -> bool;

    /// Run the command to completion.
    ///
    /// Cancellation is not an error; only operation failures are returned.
    async fn execute(&self, parameter: Parameter) -> color_eyre::Result<()>;
}

/// Resolve a dynamic parameter reference to `P`.
///
/// `None` means the parameter has the wrong type, `Some(None)` that it is absent.
fn downcast_parameter<P: 'static>(parameter: Option<&(dyn Any + Send)>) -> Option<Option<&P>> {
    match parameter {
        None => Some(None),
        Some(value) => value.downcast_ref::<P>().map(Some),
    }
}

/// Owned counterpart of [`downcast_parameter`]. `Err` means the wrong type.
fn take_parameter<P: Default + 'static>(parameter: Parameter) -> Result<P, Box<dyn Any + Send>> {
    match parameter {
        None => Ok(P::default()),
        Some(value) => value.downcast::<P>().map(|value| *value),
    }
}
