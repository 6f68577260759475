use std::time::Duration;

use derive_more::{Display, Error, From};
use serde::Deserialize;

/// Errors raised while loading [`ReversiConfig`].
#[derive(Debug, Display, Error, From)]
pub enum ConfigError {
    #[display("invalid config TOML: {_0}")]
    Parse(toml::de::Error),
    #[display("invalid config value: {_0}")]
    #[from(ignore)]
    Invalid(#[error(not(source))] String),
}

/// Hard tier search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Nominal ply depth before the endgame.
    pub depth: u8,
    /// Empty-square count at or below which search becomes exhaustive.
    pub endgame_threshold: u8,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            depth: 4,
            endgame_threshold: 12,
        }
    }
}

/// Normal tier parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NormalConfig {
    /// Upper bound (inclusive) of the random score perturbation.
    pub jitter: u8,
}

impl Default for NormalConfig {
    fn default() -> Self {
        Self { jitter: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReversiConfig {
    /// Delay between reaching `End` and finalizing the session.
    pub session_end_wait_secs: u64,
    /// Computer moves faster than this are held back until it elapses.
    pub min_thinking_millis: u64,
    pub search: SearchConfig,
    pub normal: NormalConfig,
}

impl Default for ReversiConfig {
    fn default() -> Self {
        Self {
            session_end_wait_secs: 15,
            min_thinking_millis: 1000,
            search: SearchConfig::default(),
            normal: NormalConfig::default(),
        }
    }
}

impl ReversiConfig {
    /// Parses a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.depth == 0 {
            return Err(ConfigError::Invalid("search.depth must be at least 1".to_string()));
        }
        if self.search.endgame_threshold > 64 {
            return Err(ConfigError::Invalid(format!(
                "search.endgame_threshold must be <= 64, got {}",
                self.search.endgame_threshold
            )));
        }
        Ok(())
    }

    pub fn session_end_wait(&self) -> Duration {
        Duration::from_secs(self.session_end_wait_secs)
    }

    pub fn min_thinking_time(&self) -> Duration {
        Duration::from_millis(self.min_thinking_millis)
    }
}
