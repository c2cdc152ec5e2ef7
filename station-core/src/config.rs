//! Engine configuration.

use crate::ai::{BackendId, BackendRegistry, Narrator, ThresholdDemotion, DEFAULT_TIMEOUT};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// What to do when a command arrives for a session that is still busy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BusyPolicy {
    /// Wait for the running command to finish.
    #[default]
    Queue,
    /// Fail immediately with `SessionBusy`.
    Reject,
}

/// Configuration for a [`crate::GameEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory for save files.
    pub save_dir: PathBuf,

    /// Time allowed for one AI generation.
    pub ai_timeout: Duration,

    /// Consecutive failures before demoting to another backend. 0 disables.
    pub demotion_threshold: u32,

    /// Preference order used when demoting.
    pub demotion_order: Vec<BackendId>,

    /// Exchanges of history the narrator sees.
    pub history_window: usize,

    /// Turns kept per session before the oldest are dropped. `None` keeps all.
    pub max_stored_turns: Option<usize>,

    /// Backend new sessions start with.
    pub default_backend: BackendId,

    pub busy_policy: BusyPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            save_dir: PathBuf::from("saves"),
            ai_timeout: DEFAULT_TIMEOUT,
            demotion_threshold: 3,
            demotion_order: ["claude", "openai", "openrouter", "gemini", "llama"]
                .into_iter()
                .map(BackendId::new)
                .collect(),
            history_window: 10,
            max_stored_turns: None,
            default_backend: BackendId::new("claude"),
            busy_policy: BusyPolicy::Queue,
        }
    }

    /// Defaults overlaid with `STATION_*` and `DEFAULT_AI_BACKEND` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`EngineConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Some(dir) = lookup("STATION_SAVE_DIR") {
            config.save_dir = PathBuf::from(dir);
        }
        let timeout_secs: Option<u64> = parse(&lookup, "STATION_AI_TIMEOUT_SECS")?;
        if let Some(secs) = timeout_secs {
            config.ai_timeout = Duration::from_secs(secs);
        }
        if let Some(threshold) = parse(&lookup, "STATION_DEMOTION_THRESHOLD")? {
            config.demotion_threshold = threshold;
        }
        if let Some(window) = parse(&lookup, "STATION_HISTORY_WINDOW")? {
            config.history_window = window;
        }
        let max_turns: Option<usize> = parse(&lookup, "STATION_MAX_STORED_TURNS")?;
        if let Some(turns) = max_turns {
            config.max_stored_turns = (turns > 0).then_some(turns);
        }
        if let Some(backend) = lookup("DEFAULT_AI_BACKEND") {
            if !backend.trim().is_empty() {
                config.default_backend = BackendId::new(backend);
            }
        }

        Ok(config)
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    pub fn with_ai_timeout(mut self, timeout: Duration) -> Self {
        self.ai_timeout = timeout;
        self
    }

    pub fn with_demotion_threshold(mut self, threshold: u32) -> Self {
        self.demotion_threshold = threshold;
        self
    }

    pub fn with_demotion_order(
        mut self,
        order: impl IntoIterator<Item = impl Into<BackendId>>,
    ) -> Self {
        self.demotion_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Cap stored history at `turns`; 0 removes the cap.
    pub fn with_max_stored_turns(mut self, turns: usize) -> Self {
        self.max_stored_turns = (turns > 0).then_some(turns);
        self
    }

    pub fn with_default_backend(mut self, backend: impl Into<BackendId>) -> Self {
        self.default_backend = backend.into();
        self
    }

    pub fn with_busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.busy_policy = policy;
        self
    }

    /// Build a narrator over `registry` with this timeout and demotion policy.
    pub fn narrator(&self, registry: BackendRegistry) -> Narrator {
        let narrator = Narrator::new(registry).with_timeout(self.ai_timeout);
        if self.demotion_threshold == 0 {
            narrator
        } else {
            narrator.with_policy(ThresholdDemotion::new(
                self.demotion_threshold,
                self.demotion_order.clone(),
            ))
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
