//! Cancellable asynchronous commands with observable run state.
//!
//! See [`core`] for the primitive. The `asyncmd` binary is a terminal front end
//! that binds it.

pub mod core;

pub use crate::core::{
    AsyncCommand, CancelCommand, CancelSignal, Cancelled, Command, DelegateCommand,
    PropertyChanged, Requery, RunOutcome,
};
