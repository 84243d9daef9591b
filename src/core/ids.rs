//! Typed identifiers, reaction tokens and the outbound message model.
//!
//! Nothing in the core is structurally inferred from "anything with an id": users,
//! channels, guilds and messages are carried as the platform's typed ids, prefix
//! scopes are an explicit enum and reactions are a closed token type.

use poise::serenity_prelude as serenity;
use serenity::{ChannelId, EmojiId, GuildId, MessageId, ReactionType, UserId};
use std::fmt;

/// A prefix-resolution key: either a guild or a private conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A guild (server); all of its channels share one prefix.
    Guild(GuildId),
    /// A private channel (DM or group DM).
    Private(ChannelId),
}

impl Scope {
    /// Picks the scope for an invocation: the guild when there is one, otherwise the channel.
    #[must_use]
    pub fn of(guild_id: Option<GuildId>, channel_id: ChannelId) -> Self {
        guild_id.map_or(Self::Private(channel_id), Self::Guild)
    }

    /// The string key stored in the `prefixes` table.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Guild(id) => id.get().to_string(),
            Self::Private(id) => id.get().to_string(),
        }
    }
}

/// Identifies a message that has already been sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    /// Channel the message lives in
    pub channel_id: ChannelId,
    /// The message itself
    pub message_id: MessageId,
}

impl MessageRef {
    /// Builds a reference from raw parts.
    #[must_use]
    pub const fn new(channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            channel_id,
            message_id,
        }
    }
}

impl From<&serenity::Message> for MessageRef {
    fn from(message: &serenity::Message) -> Self {
        Self::new(message.channel_id, message.id)
    }
}

/// A reaction identifier: a unicode emoji or a custom emoji.
///
/// Custom emoji compare by id only; the name is display data and may be missing from
/// gateway events.
#[derive(Clone, Debug, Eq)]
pub enum ReactionToken {
    /// A unicode emoji such as `✅`
    Unicode(String),
    /// A guild emoji
    Custom {
        /// Emoji id
        id: u64,
        /// Emoji name, when known
        name: Option<String>,
        /// Whether the emoji is animated
        animated: bool,
    },
}

impl PartialEq for ReactionToken {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unicode(a), Self::Unicode(b)) => a == b,
            (Self::Custom { id: a, .. }, Self::Custom { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl ReactionToken {
    /// Shorthand for a unicode token.
    #[must_use]
    pub fn unicode(emoji: &str) -> Self {
        Self::Unicode(emoji.to_string())
    }

    /// Parses a token from configuration text.
    ///
    /// Accepts a unicode emoji (`✅`), `name:id`, or the rendered forms `<:name:id>` and
    /// `<a:name:id>`. Returns `None` for empty input.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let (animated, inner) = if let Some(rest) = text.strip_prefix("<a:") {
            (true, rest.strip_suffix('>'))
        } else if let Some(rest) = text.strip_prefix("<:") {
            (false, rest.strip_suffix('>'))
        } else {
            (false, Some(text))
        };

        if let Some((name, id)) = inner.and_then(|inner| inner.rsplit_once(':'))
            && let Ok(id) = id.parse::<u64>()
        {
            return Some(Self::Custom {
                id,
                name: (!name.is_empty()).then(|| name.to_string()),
                animated,
            });
        }

        Some(Self::Unicode(text.to_string()))
    }

    /// Keycap digit tokens `1️⃣` .. `9️⃣` followed by `🔟`, used to number list entries.
    #[must_use]
    pub fn keycaps() -> Vec<Self> {
        let mut tokens: Vec<Self> = (1..=9)
            .map(|digit| Self::Unicode(format!("{digit}\u{20e3}")))
            .collect();
        tokens.push(Self::unicode("\u{1f51f}"));
        tokens
    }
}

impl fmt::Display for ReactionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicode(emoji) => f.write_str(emoji),
            Self::Custom { id, name, animated } => {
                let prefix = if *animated { "a" } else { "" };
                write!(f, "<{prefix}:{}:{id}>", name.as_deref().unwrap_or("_"))
            }
        }
    }
}

impl From<&ReactionType> for ReactionToken {
    fn from(reaction: &ReactionType) -> Self {
        match reaction {
            ReactionType::Custom { animated, id, name } => Self::Custom {
                id: id.get(),
                name: name.clone(),
                animated: *animated,
            },
            ReactionType::Unicode(emoji) => Self::Unicode(emoji.clone()),
            // Unknown future variants only ever carry unicode payloads
            other => Self::Unicode(other.to_string()),
        }
    }
}

impl From<&ReactionToken> for ReactionType {
    fn from(token: &ReactionToken) -> Self {
        match token {
            ReactionToken::Unicode(emoji) => Self::Unicode(emoji.clone()),
            ReactionToken::Custom { id, name, animated } => Self::Custom {
                animated: *animated,
                id: EmojiId::new(*id),
                name: name.clone(),
            },
        }
    }
}

/// A single reaction-added event routed to a waiter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionEvent {
    /// The message that received the reaction
    pub message_id: MessageId,
    /// Who reacted
    pub user_id: UserId,
    /// What they reacted with
    pub token: ReactionToken,
}

impl ReactionEvent {
    /// Converts a gateway reaction. Reactions without a user (should not happen for
    /// reaction-add) are dropped.
    #[must_use]
    pub fn from_reaction(reaction: &serenity::Reaction) -> Option<Self> {
        Some(Self {
            message_id: reaction.message_id,
            user_id: reaction.user_id?,
            token: ReactionToken::from(&reaction.emoji),
        })
    }
}

/// Minimal embed model rendered by the messaging adapter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Embed {
    /// Embed title
    pub title: Option<String>,
    /// Embed body
    pub description: Option<String>,
    /// `(name, value)` fields, rendered non-inline
    pub fields: Vec<(String, String)>,
}

impl Embed {
    /// Appends a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// Content of an outbound message or edit.
///
/// An edit replaces both parts: a `None` content or embed clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reply {
    /// Plain text content
    pub content: Option<String>,
    /// Optional embed
    pub embed: Option<Embed>,
}

impl Reply {
    /// A text-only reply.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embed: None,
        }
    }

    /// Attaches an embed.
    #[must_use]
    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}
