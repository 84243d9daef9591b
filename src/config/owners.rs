//! Owner configuration module for loading bot owner ids from environment variables.
//!
//! Owners may run the hidden developer commands (shutdown, say, wait). The list is read
//! from `BOT_OWNER_IDS` in the `.env` file; when it is unset the framework falls back to
//! the application owner reported by Discord.

use poise::serenity_prelude::UserId;
use std::collections::HashSet;

/// Parses a comma separated list of user ids. Blank and malformed entries are skipped
/// with a warning.
#[must_use]
pub fn parse_owner_ids(raw: &str) -> HashSet<UserId> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<u64>() {
            Ok(id) if id != 0 => Some(UserId::new(id)),
            _ => {
                tracing::warn!("Ignoring malformed owner id {entry:?} in BOT_OWNER_IDS");
                None
            }
        })
        .collect()
}

/// Gets the configured owner ids from `BOT_OWNER_IDS`.
///
/// # Returns
///
/// A set of owner ids; empty when the variable is not set.
#[must_use]
pub fn get_owner_ids() -> HashSet<UserId> {
    std::env::var("BOT_OWNER_IDS")
        .map(|raw| parse_owner_ids(&raw))
        .unwrap_or_default()
}
