//! Long-running background poll loop owned by the demo model.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use asyncmd::core::{CancelSignal, PropertyChanged};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::BACKGROUND;

/// When the background loop is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundPolicy {
    /// Only when the model is disposed.
    #[default]
    Manual,
    /// Also as soon as the reverse command finishes, by any path.
    AutoLink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundStatus {
    Polling { ticks: u64 },
    Stopped { ticks: u64 },
}

/// Logs a line every `interval` until its signal is triggered.
pub struct BackgroundPoller {
    signal: CancelSignal,
    ticks: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl BackgroundPoller {
    /// Spawn the loop on the current tokio runtime.
    pub fn start(interval: Duration, properties: PropertyChanged) -> Self {
        let signal = CancelSignal::new();
        let ticks = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(poll(
            signal.clone(),
            interval,
            Arc::clone(&ticks),
            properties,
        ));
        Self {
            signal,
            ticks,
            task,
        }
    }

    pub fn signal(&self) -> CancelSignal {
        self.signal.clone()
    }

    pub fn status(&self) -> BackgroundStatus {
        let ticks = self.ticks.load(Ordering::Relaxed);
        if self.signal.is_triggered() {
            BackgroundStatus::Stopped { ticks }
        } else {
            BackgroundStatus::Polling { ticks }
        }
    }

    pub fn stop(&self) {
        self.signal.trigger();
    }
}

impl Drop for BackgroundPoller {
    fn drop(&mut self) {
        self.signal.trigger();
        self.task.abort();
    }
}

async fn poll(
    signal: CancelSignal,
    interval: Duration,
    ticks: Arc<AtomicU64>,
    properties: PropertyChanged,
) {
    signal.on_triggered(|| debug!("Background cancellation signal set"));

    while !signal.is_triggered() {
        if signal
            .run_until_cancelled(tokio::time::sleep(interval))
            .await
            .is_err()
        {
            break;
        }
        let tick = ticks.fetch_add(1, Ordering::Relaxed);
        debug!(tick, "Long running command");
        properties.notify(BACKGROUND);
    }

    info!("Background loop bailing out");
    properties.notify(BACKGROUND);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_poller_ticks_until_stopped() {
        let poller = BackgroundPoller::start(Duration::from_secs(1), PropertyChanged::new());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(poller.status(), BackgroundStatus::Polling { ticks: 3 });

        poller.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(poller.status(), BackgroundStatus::Stopped { ticks: 3 });
        assert!(poller.task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_poller_stops_polling() {
        let properties = PropertyChanged::new();
        let notified = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&notified);
        properties.subscribe(BACKGROUND, move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        let poller = BackgroundPoller::start(Duration::from_secs(1), properties);
        let signal = poller.signal();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        drop(poller);
        assert!(signal.is_triggered());

        let before = notified.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(notified.load(Ordering::SeqCst), before);
    }

    #[test]
    fn test_policy_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: BackgroundPolicy,
        }
        let parsed: Wrapper = toml::from_str("policy = \"auto-link\"").unwrap();
        assert_eq!(parsed.policy, BackgroundPolicy::AutoLink);
        assert_eq!(
            BackgroundPolicy::from_str("manual", true),
            Ok(BackgroundPolicy::Manual)
        );
    }
}
