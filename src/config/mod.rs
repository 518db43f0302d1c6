pub mod key;
pub mod keybindings;
pub mod loader;

use std::time::Duration;

use keybindings::KeybindingsConfig;
pub use loader::load;
use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::model::{BackgroundPolicy, ModelSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub input: String,
    pub delay_secs: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            input: "Test string".to_string(),
            delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub policy: BackgroundPolicy,
    pub interval_ms: u64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            policy: BackgroundPolicy::default(),
            interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub theme: String,
    /// Ticks per second.
    pub tick_rate: f64,
    /// Frames per second.
    pub frame_rate: f64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: "Catppuccin Mocha".to_string(),
            tick_rate: 4.0,
            frame_rate: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub demo: DemoConfig,
    pub background: BackgroundConfig,
    pub ui: UiConfig,
    pub keybindings: KeybindingsConfig,
}

impl AppConfig {
    /// Command line flags win over the file.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(input) = &args.input {
            self.demo.input.clone_from(input);
        }
        if let Some(delay) = args.delay {
            self.demo.delay_secs = delay;
        }
        if let Some(policy) = args.background_policy {
            self.background.policy = policy;
        }
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            input: self.demo.input.clone(),
            delay: Duration::from_secs(self.demo.delay_secs),
            policy: self.background.policy,
            // a zero interval would spin the poll loop
            poll_interval: Duration::from_millis(self.background.interval_ms.max(1)),
        }
    }
}
