//! Bot settings loading from config.toml
//!
//! Every setting has a default, so a missing file or a partial file is fine. The path
//! comes from `QUANTA_CONFIG` and defaults to `./config.toml`.

use crate::core::ids::ReactionToken;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// The whole config.toml file
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// General bot behaviour
    pub bot: BotSettings,
    /// Prefix cache sizing
    pub prefix_cache: PrefixCacheSettings,
    /// Reaction prompts
    pub reactions: ReactionSettings,
    /// Fuzzy lookup thresholds
    pub fuzzy: FuzzySettings,
    /// Shutdown command budget
    pub shutdown: ShutdownSettings,
}

/// `[bot]`
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BotSettings {
    /// Prefix used when the store has none or is unreachable
    pub default_prefix: String,
    /// Whether mentioning the bot works as a prefix
    pub mention_as_prefix: bool,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            default_prefix: "?".to_string(),
            mention_as_prefix: true,
        }
    }
}

/// `[prefix_cache]`
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PrefixCacheSettings {
    /// Maximum number of cached scopes
    pub capacity: usize,
}

impl Default for PrefixCacheSettings {
    fn default() -> Self {
        Self { capacity: 128 }
    }
}

/// `[reactions]`
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReactionSettings {
    /// How long prompts wait for a reaction
    pub timeout_secs: u64,
    /// Token that confirms a prompt
    pub yes: String,
    /// Token that declines a prompt
    pub no: String,
}

impl Default for ReactionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            yes: "\u{2705}".to_string(),
            no: "\u{274c}".to_string(),
        }
    }
}

impl ReactionSettings {
    /// Prompt timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The yes/no pair as tokens.
    pub fn answer_tokens(&self) -> Result<(ReactionToken, ReactionToken)> {
        let parse = |text: &str, which: &str| {
            ReactionToken::parse(text).ok_or_else(|| Error::Config {
                message: format!("reactions.{which} must not be empty"),
            })
        };
        Ok((parse(&self.yes, "yes")?, parse(&self.no, "no")?))
    }
}

/// `[fuzzy]`
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FuzzySettings {
    /// How many candidates a disambiguation prompt lists
    pub result_limit: usize,
    /// Minimum similarity (0-100) for a user candidate to be offered
    pub score_threshold: u8,
    /// Minimum similarity (0-100) for a command suggestion
    pub command_threshold: u8,
}

impl Default for FuzzySettings {
    fn default() -> Self {
        Self {
            result_limit: 3,
            score_threshold: 50,
            command_threshold: 80,
        }
    }
}

/// `[shutdown]`
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ShutdownSettings {
    /// Seconds the shutdown command waits for other commands before forcing
    pub wait_secs: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self { wait_secs: 30 }
    }
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML is invalid, or a reaction token
/// is empty.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_settings(&contents)
}

/// Parses settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    settings.reactions.answer_tokens()?;
    Ok(settings)
}

/// Loads settings from `QUANTA_CONFIG` (default `./config.toml`); a missing file yields the
/// defaults.
pub fn load_default_settings() -> Result<Settings> {
    let path = std::env::var("QUANTA_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        tracing::debug!("Loading settings from {path}");
        load_settings(&path)
    } else {
        tracing::info!("No config file at {path}, using default settings");
        Ok(Settings::default())
    }
}
