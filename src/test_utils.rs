//! Shared test utilities for `QuantaBot`.
//!
//! This module provides the in-memory database setup used by the prefix tests and a
//! recording [`MockMessenger`] for the interactive helpers.

use crate::{
    core::{
        ids::{MessageRef, ReactionEvent, ReactionToken, Reply},
        messenger::Messenger,
        reactions::ReactionHub,
    },
    errors::{Error, Result},
};
use poise::serenity_prelude::{ChannelId, MessageId, UserId};
use sea_orm::DatabaseConnection;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all persistence tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Id of the first message a fresh [`MockMessenger`] sends. Later sends count up from it.
pub const FIRST_MESSAGE_ID: u64 = 1000;

/// The bot user id reported by [`MockMessenger`].
pub const BOT_USER_ID: u64 = 1;

/// One recorded messenger call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    /// `send`
    Send {
        /// Target channel
        channel_id: ChannelId,
        /// What was sent
        reply: Reply,
    },
    /// `edit`
    Edit {
        /// Edited message
        message: MessageRef,
        /// New content
        reply: Reply,
    },
    /// `add_reaction`
    AddReaction {
        /// Reacted message
        message: MessageRef,
        /// Token added
        token: ReactionToken,
    },
    /// `remove_reaction`
    RemoveReaction {
        /// Reacted message
        message: MessageRef,
        /// Token removed
        token: ReactionToken,
        /// Whose reaction
        user_id: UserId,
    },
    /// `clear_reactions`
    ClearReactions {
        /// Cleared message
        message: MessageRef,
    },
}

/// A messenger that records every call and fails on request.
///
/// Failed calls are recorded too.
#[derive(Debug)]
pub struct MockMessenger {
    /// Reported as the bot's own id
    pub me: UserId,
    /// `send` fails with `Forbidden`
    pub fail_send: bool,
    /// `edit` fails with `NotFound`
    pub fail_edit: bool,
    /// `clear_reactions` fails with `Forbidden`
    pub fail_clear: bool,
    /// `add_reaction` fails with `NotFound` for these tokens
    pub unknown_tokens: Vec<ReactionToken>,
    /// `add_reaction` fails with `Forbidden` for these tokens
    pub forbidden_tokens: Vec<ReactionToken>,
    /// Recorded calls
    pub calls: Mutex<Vec<Call>>,
    /// Id handed to the next sent message
    pub next_message_id: AtomicU64,
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self {
            me: UserId::new(BOT_USER_ID),
            fail_send: false,
            fail_edit: false,
            fail_clear: false,
            unknown_tokens: Vec::new(),
            forbidden_tokens: Vec::new(),
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicU64::new(FIRST_MESSAGE_ID),
        }
    }
}

impl MockMessenger {
    /// A messenger on which every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded calls.
    #[allow(clippy::unwrap_used)]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls matching `predicate`.
    #[allow(clippy::unwrap_used)]
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    /// Contents of every sent or edited reply, in call order.
    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { reply, .. } | Call::Edit { reply, .. } => reply.content,
                _ => None,
            })
            .collect()
    }

    #[allow(clippy::unwrap_used)]
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Messenger for MockMessenger {
    fn current_user_id(&self) -> UserId {
        self.me
    }

    async fn send(&self, channel_id: ChannelId, reply: &Reply) -> Result<MessageRef> {
        self.record(Call::Send {
            channel_id,
            reply: reply.clone(),
        });
        if self.fail_send {
            return Err(Error::Forbidden {
                message: "Missing Permissions".to_string(),
            });
        }
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageRef::new(channel_id, MessageId::new(id)))
    }

    async fn edit(&self, message: &MessageRef, reply: &Reply) -> Result<()> {
        self.record(Call::Edit {
            message: *message,
            reply: reply.clone(),
        });
        if self.fail_edit {
            return Err(Error::NotFound {
                message: "Unknown Message".to_string(),
            });
        }
        Ok(())
    }

    async fn add_reaction(&self, message: &MessageRef, token: &ReactionToken) -> Result<()> {
        self.record(Call::AddReaction {
            message: *message,
            token: token.clone(),
        });
        if self.unknown_tokens.contains(token) {
            return Err(Error::NotFound {
                message: "Unknown Emoji".to_string(),
            });
        }
        if self.forbidden_tokens.contains(token) {
            return Err(Error::Forbidden {
                message: "Missing Permissions".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message: &MessageRef,
        token: &ReactionToken,
        user_id: UserId,
    ) -> Result<()> {
        self.record(Call::RemoveReaction {
            message: *message,
            token: token.clone(),
            user_id,
        });
        Ok(())
    }

    async fn clear_reactions(&self, message: &MessageRef) -> Result<()> {
        self.record(Call::ClearReactions { message: *message });
        if self.fail_clear {
            return Err(Error::Forbidden {
                message: "Missing Permissions".to_string(),
            });
        }
        Ok(())
    }
}

/// Builds a reaction-add event.
pub fn event(message_id: u64, user_id: u64, token: &ReactionToken) -> ReactionEvent {
    ReactionEvent {
        message_id: MessageId::new(message_id),
        user_id: UserId::new(user_id),
        token: token.clone(),
    }
}

/// Yields until a wait has subscribed to `message_id`.
///
/// Meant to run alongside the waiter inside `tokio::join!`.
pub async fn wait_until_watching(hub: &ReactionHub, message_id: MessageId) {
    while !hub.is_watching(message_id) {
        tokio::task::yield_now().await;
    }
}
