//! Asynchronous command primitive.
//!
//! This module contains the types a front end binds to:
//! - [`AsyncCommand`] - async work behind a command interface, one run at a time
//! - [`CancelSignal`] / [`CancellationController`] - cooperative, at-most-once cancellation
//! - [`PropertyChanged`] - explicit named-attribute change notifications
//! - [`Requery`] - broadcast asking hosts to re-check every command's eligibility
//! - [`Command`] - type-erased interface hosts invoke commands through

pub mod cancel;
pub mod command;
pub mod observable;
pub mod requery;

// Re-export commonly used types
pub use cancel::{CancelSignal, CancellationController, Cancelled, is_cancellation};
pub use command::{
    AsyncCommand, CancelCommand, Command, DelegateCommand, Parameter, RunId, RunInfo, RunOutcome,
};
pub use observable::{PropertyChanged, Subscription, SubscriptionHandle};
pub use requery::Requery;
