//! Autocomplete handlers for Discord slash command parameters.
//!
//! This module provides autocomplete for command names, so `/help` can suggest what the
//! user is probably typing.

use crate::{
    bot::BotData,
    core::fuzzy::{RankOptions, rank},
    core::registry::CommandRegistry,
    errors::Error,
};

/// Discord's autocomplete limit.
const MAX_CHOICES: usize = 25;

/// Visible command names matching `partial`: substring matches first (alphabetical), then
/// fuzzy matches the user may have misspelled.
fn command_choices(registry: &CommandRegistry, partial: &str, threshold: u8) -> Vec<String> {
    let partial_lower = partial.trim().to_lowercase();
    let mut names: Vec<String> = registry
        .visible()
        .map(|entry| entry.name.clone())
        .filter(|name| name.to_lowercase().contains(&partial_lower))
        .collect();
    names.sort();

    if !partial_lower.is_empty() {
        let candidates = registry.candidates();
        let options = RankOptions {
            result_limit: MAX_CHOICES,
            score_threshold: threshold,
        };
        for ranked in rank(&partial_lower, &candidates, options) {
            let name = &candidates[ranked.index].value;
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }

    names.truncate(MAX_CHOICES);
    names
}

/// Provides autocomplete suggestions for command names.
///
/// # Arguments
/// * `ctx` - The poise context holding the command registry
/// * `partial` - The partial string the user has typed so far
///
/// # Returns
/// Up to 25 visible command names
pub async fn autocomplete_command_name(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let data = ctx.data();
    command_choices(&data.registry, partial, data.settings.fuzzy.score_threshold)
}
