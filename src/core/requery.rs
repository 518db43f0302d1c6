//! Global "re-evaluate eligibility" broadcast.
//!
//! Commands call [`Requery::request`] whenever their running state flips. The
//! host decides how to fan that out (redraw buttons, re-check every bound
//! command, ...) by watching a receiver from [`Requery::subscribe`].
//! Requests coalesce: a slow host only sees that at least one request happened
//! since it last looked.

use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct Requery {
    tx: Arc<watch::Sender<u64>>,
}

impl Requery {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// The process-wide instance commands use unless given their own.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Requery> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Ask every observer to re-check `can_execute` on the commands it shows.
    pub fn request(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
        trace!(generation = self.generation(), "Requery requested");
    }

    /// Number of requests issued so far.
    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    /// A receiver whose `changed()` resolves after the next request.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for Requery {
    fn default() -> Self {
        Self::new()
    }
}
