//! Serenity-backed [`Messenger`]: renders [`Reply`] values into message builders and
//! issues the reaction calls over the HTTP client.

use crate::{
    core::{
        ids::{Embed, MessageRef, ReactionToken, Reply},
        messenger::Messenger,
    },
    errors::Result,
};
use poise::serenity_prelude::{
    ChannelId, CreateEmbed, CreateMessage, EditMessage, Http, ReactionType, UserId,
};
use std::sync::Arc;

/// Talks to Discord through a shared HTTP client.
#[derive(Clone)]
pub struct SerenityMessenger {
    http: Arc<Http>,
    me: UserId,
}

impl std::fmt::Debug for SerenityMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerenityMessenger")
            .field("me", &self.me)
            .finish_non_exhaustive()
    }
}

impl SerenityMessenger {
    /// Wraps `http`, acting as the bot user `me`.
    #[must_use]
    pub const fn new(http: Arc<Http>, me: UserId) -> Self {
        Self { http, me }
    }
}

fn render_embed(embed: &Embed) -> CreateEmbed {
    let mut rendered = CreateEmbed::new();
    if let Some(title) = &embed.title {
        rendered = rendered.title(title);
    }
    if let Some(description) = &embed.description {
        rendered = rendered.description(description);
    }
    rendered.fields(
        embed
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone(), false)),
    )
}

impl Messenger for SerenityMessenger {
    fn current_user_id(&self) -> UserId {
        self.me
    }

    async fn send(&self, channel_id: ChannelId, reply: &Reply) -> Result<MessageRef> {
        let mut builder = CreateMessage::new();
        if let Some(content) = &reply.content {
            builder = builder.content(content);
        }
        if let Some(embed) = &reply.embed {
            builder = builder.embed(render_embed(embed));
        }
        let message = channel_id.send_message(&*self.http, builder).await?;
        Ok(MessageRef::from(&message))
    }

    async fn edit(&self, message: &MessageRef, reply: &Reply) -> Result<()> {
        let builder = EditMessage::new()
            .content(reply.content.clone().unwrap_or_default())
            .embeds(reply.embed.iter().map(render_embed).collect());
        message
            .channel_id
            .edit_message(&*self.http, message.message_id, builder)
            .await?;
        Ok(())
    }

    async fn add_reaction(&self, message: &MessageRef, token: &ReactionToken) -> Result<()> {
        self.http
            .create_reaction(
                message.channel_id,
                message.message_id,
                &ReactionType::from(token),
            )
            .await?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message: &MessageRef,
        token: &ReactionToken,
        user_id: UserId,
    ) -> Result<()> {
        let reaction = ReactionType::from(token);
        if user_id == self.me {
            self.http
                .delete_reaction_me(message.channel_id, message.message_id, &reaction)
                .await?;
        } else {
            self.http
                .delete_reaction(message.channel_id, message.message_id, user_id, &reaction)
                .await?;
        }
        Ok(())
    }

    async fn clear_reactions(&self, message: &MessageRef) -> Result<()> {
        self.http
            .delete_message_reactions(message.channel_id, message.message_id)
            .await?;
        Ok(())
    }
}
