//! The messaging collaborator the interactive helpers talk through.
//!
//! The production implementation wraps the serenity HTTP client (see
//! `bot::messenger::SerenityMessenger`); tests use a recording mock.

use crate::{
    core::ids::{MessageRef, ReactionToken, Reply},
    errors::Result,
};
use poise::serenity_prelude::{ChannelId, UserId};
use std::future::Future;

/// Outbound message and reaction operations.
///
/// Every operation may fail with [`crate::errors::Error::NotFound`] or
/// [`crate::errors::Error::Forbidden`]; callers doing best-effort cleanup check
/// [`crate::errors::Error::is_cleanup_tolerable`].
pub trait Messenger: Send + Sync {
    /// The bot's own user id, used to ignore self-authored reactions.
    fn current_user_id(&self) -> UserId;

    /// Posts a new message.
    fn send(
        &self,
        channel_id: ChannelId,
        reply: &Reply,
    ) -> impl Future<Output = Result<MessageRef>> + Send;

    /// Replaces the content and embed of a message.
    fn edit(&self, message: &MessageRef, reply: &Reply) -> impl Future<Output = Result<()>> + Send;

    /// Reacts to a message as the bot.
    fn add_reaction(
        &self,
        message: &MessageRef,
        token: &ReactionToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Removes one user's reaction.
    fn remove_reaction(
        &self,
        message: &MessageRef,
        token: &ReactionToken,
        user_id: UserId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Removes every reaction from a message at once.
    fn clear_reactions(&self, message: &MessageRef) -> impl Future<Output = Result<()>> + Send;
}
