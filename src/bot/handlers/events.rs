//! Gateway event routing.

use crate::{bot::BotData, core::ids::ReactionEvent, errors::Result};
use poise::serenity_prelude as serenity;
use tracing::{info, trace};

/// Handles gateway events the framework does not consume itself.
///
/// Reaction additions are forwarded to the reaction hub, where a pending wait on the
/// message picks them up.
pub async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, crate::errors::Error>,
    data: &BotData,
) -> Result<()> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!(
                "{} is connected to {} guild(s)",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if let Some(event) = ReactionEvent::from_reaction(add_reaction)
                && !data.reactions.dispatch(event)
            {
                trace!("Reaction on unwatched message {}", add_reaction.message_id);
            }
        }
        _ => {}
    }
    Ok(())
}
