//! Reaction waits - suspend a command until the invoking user reacts to a message.
//!
//! The gateway event handler feeds every reaction-add event into a [`ReactionHub`]. A wait
//! registers a per-message route on the hub, receives that message's events in delivery
//! order over an unbounded channel, and stops listening as soon as it resolves or its
//! deadline passes. Only one wait may watch a given message at a time.

use crate::{
    core::{
        ids::{MessageRef, ReactionEvent, ReactionToken, Reply},
        messenger::Messenger,
    },
    errors::{Error, Result},
};
use poise::serenity_prelude::{ChannelId, MessageId, UserId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Default time a prompt waits for an answer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

type Routes = HashMap<MessageId, mpsc::UnboundedSender<ReactionEvent>>;

/// Routes reaction-add events to the wait watching their message.
#[derive(Debug, Default)]
pub struct ReactionHub {
    routes: Mutex<Routes>,
}

impl ReactionHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn routes(&self) -> MutexGuard<'_, Routes> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts watching `message_id`. The route is removed when the returned subscription
    /// is dropped.
    ///
    /// # Errors
    /// Returns [`Error::WaitAlreadyPending`] if another wait is watching the message.
    pub fn subscribe(&self, message_id: MessageId) -> Result<Subscription<'_>> {
        let mut routes = self.routes();
        if routes
            .get(&message_id)
            .is_some_and(|route| !route.is_closed())
        {
            return Err(Error::WaitAlreadyPending {
                message_id: message_id.get(),
            });
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        routes.insert(message_id, sender);
        trace!("Watching reactions on message {message_id}");
        Ok(Subscription {
            hub: self,
            message_id,
            receiver,
        })
    }

    /// Forwards an event to the wait watching its message. Returns whether anyone was
    /// listening.
    pub fn dispatch(&self, event: ReactionEvent) -> bool {
        let mut routes = self.routes();
        let Some(route) = routes.get(&event.message_id) else {
            return false;
        };

        let message_id = event.message_id;
        if route.send(event).is_err() {
            routes.remove(&message_id);
            return false;
        }
        true
    }

    /// Whether a wait is currently watching `message_id`.
    #[must_use]
    pub fn is_watching(&self, message_id: MessageId) -> bool {
        self.routes()
            .get(&message_id)
            .is_some_and(|route| !route.is_closed())
    }

    /// Number of messages being watched.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.routes().len()
    }
}

/// An active route on a [`ReactionHub`].
#[derive(Debug)]
pub struct Subscription<'a> {
    hub: &'a ReactionHub,
    message_id: MessageId,
    receiver: mpsc::UnboundedReceiver<ReactionEvent>,
}

impl Subscription<'_> {
    /// Next event for the watched message, in delivery order.
    pub async fn recv(&mut self) -> Option<ReactionEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.hub.routes().remove(&self.message_id);
        trace!("Stopped watching reactions on message {}", self.message_id);
    }
}

/// Parameters of a single reaction wait.
#[derive(Clone, Debug)]
pub struct WaitOptions {
    accepted: Option<Vec<ReactionToken>>,
    timeout: Duration,
    on_timeout: Reply,
    strip_disqualified: bool,
    strip_on_timeout: Option<bool>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            accepted: None,
            timeout: DEFAULT_TIMEOUT,
            on_timeout: Reply::text("Timed out!"),
            strip_disqualified: true,
            strip_on_timeout: None,
        }
    }
}

impl WaitOptions {
    /// Restricts the wait to `tokens` and attaches them to the message as candidates.
    #[must_use]
    pub fn accepting(mut self, tokens: impl IntoIterator<Item = ReactionToken>) -> Self {
        self.accepted = Some(tokens.into_iter().collect());
        self
    }

    /// How long to wait before giving up.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// What the message is edited to when the wait times out.
    #[must_use]
    pub fn on_timeout(mut self, reply: impl Into<Reply>) -> Self {
        self.on_timeout = reply.into();
        self
    }

    /// Whether reactions that don't resolve the wait are removed (restricted waits only).
    #[must_use]
    pub const fn strip_disqualified(mut self, strip: bool) -> Self {
        self.strip_disqualified = strip;
        self
    }

    /// Whether the candidate reactions are cleared on timeout. Defaults to the
    /// [`strip_disqualified`](Self::strip_disqualified) setting.
    #[must_use]
    pub const fn strip_on_timeout(mut self, strip: bool) -> Self {
        self.strip_on_timeout = Some(strip);
        self
    }

    const fn strips_on_timeout(&self) -> bool {
        match self.strip_on_timeout {
            Some(strip) => strip,
            None => self.strip_disqualified,
        }
    }
}

/// The yes/no token pair used by confirmation prompts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answers {
    /// Confirms
    pub yes: ReactionToken,
    /// Declines
    pub no: ReactionToken,
}

impl Default for Answers {
    fn default() -> Self {
        Self {
            yes: ReactionToken::unicode("\u{2705}"),
            no: ReactionToken::unicode("\u{274c}"),
        }
    }
}

/// Interactive prompts for one command invocation: who is being asked, where, and
/// through which messenger and hub.
#[derive(Debug)]
pub struct Prompter<'a, M> {
    pub(crate) messenger: &'a M,
    pub(crate) hub: &'a ReactionHub,
    pub(crate) channel_id: ChannelId,
    pub(crate) author: UserId,
    pub(crate) answers: Answers,
    pub(crate) timeout: Duration,
}

impl<'a, M: Messenger> Prompter<'a, M> {
    /// A prompter for `author` in `channel_id` with the default answers and timeout.
    #[must_use]
    pub fn new(
        messenger: &'a M,
        hub: &'a ReactionHub,
        channel_id: ChannelId,
        author: UserId,
    ) -> Self {
        Self {
            messenger,
            hub,
            channel_id,
            author,
            answers: Answers::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Uses `answers` for yes/no prompts.
    #[must_use]
    pub fn with_answers(mut self, answers: Answers) -> Self {
        self.answers = answers;
        self
    }

    /// Uses `timeout` as the default prompt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The messenger prompts are sent through.
    #[must_use]
    pub const fn messenger(&self) -> &'a M {
        self.messenger
    }

    /// The user whose reactions count.
    #[must_use]
    pub const fn author(&self) -> UserId {
        self.author
    }

    /// Default prompt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Default wait options for this prompter (its timeout, everything else default).
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::default().timeout(self.timeout)
    }

    /// Posts `reply` in the prompter's channel.
    pub async fn send(&self, reply: &Reply) -> Result<MessageRef> {
        self.messenger.send(self.channel_id, reply).await
    }

    /// Posts `reply`, or edits `existing` to show it.
    pub async fn send_or_edit(
        &self,
        existing: Option<MessageRef>,
        reply: &Reply,
    ) -> Result<MessageRef> {
        match existing {
            Some(message) => {
                self.messenger.edit(&message, reply).await?;
                Ok(message)
            }
            None => self.send(reply).await,
        }
    }

    /// Waits for the author to react to `message`.
    ///
    /// Resolves with the first qualifying reaction: one from the author whose token is in
    /// the accepted set (or any token when the wait is unrestricted). Returns `Ok(None)` when
    /// the timeout elapses first, after editing the message to the timeout notice.
    ///
    /// # Errors
    /// Fails if another wait is watching the message, or if attaching a candidate
    /// reaction fails for any reason other than the emoji not existing. Cleanup failures
    /// are logged and swallowed.
    pub async fn wait_for_reactions(
        &self,
        message: &MessageRef,
        options: WaitOptions,
    ) -> Result<Option<ReactionEvent>> {
        let mut subscription = self.hub.subscribe(message.message_id)?;
        let accepted = match &options.accepted {
            Some(tokens) => Some(self.attach_candidates(message, tokens).await?),
            None => None,
        };

        let me = self.messenger.current_user_id();
        let deadline = Instant::now() + options.timeout;

        let chosen = loop {
            let event = match tokio::time::timeout_at(deadline, subscription.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) | Err(_) => {
                    drop(subscription);
                    self.finish_timeout(message, accepted.as_deref(), &options)
                        .await;
                    return Ok(None);
                }
            };

            if event.user_id == me {
                continue;
            }

            let token_accepted = accepted
                .as_ref()
                .is_none_or(|tokens| tokens.contains(&event.token));
            if event.user_id == self.author && token_accepted {
                break event;
            }

            debug!(
                "Ignoring reaction {} from {} on message {}",
                event.token, event.user_id, message.message_id
            );
            if accepted.is_some() && options.strip_disqualified {
                self.remove_quietly(message, &event.token, event.user_id)
                    .await;
            }
        };
        drop(subscription);

        if let Some(tokens) = &accepted
            && options.strip_disqualified
        {
            self.strip_reactions(message, tokens, Some(&chosen)).await;
        }

        Ok(Some(chosen))
    }

    async fn attach_candidates(
        &self,
        message: &MessageRef,
        tokens: &[ReactionToken],
    ) -> Result<Vec<ReactionToken>> {
        let mut attached = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.messenger.add_reaction(message, token).await {
                Ok(()) => attached.push(token.clone()),
                Err(Error::NotFound { message: reason }) => {
                    warn!("Dropping reaction {token} that could not be attached: {reason}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(attached)
    }

    async fn finish_timeout(
        &self,
        message: &MessageRef,
        accepted: Option<&[ReactionToken]>,
        options: &WaitOptions,
    ) {
        debug!("Reaction wait on message {} timed out", message.message_id);
        if let Err(e) = self.messenger.edit(message, &options.on_timeout).await {
            warn!(
                "Failed to show the timeout notice on {}: {e}",
                message.message_id
            );
        }
        if let Some(tokens) = accepted
            && options.strips_on_timeout()
        {
            self.strip_reactions(message, tokens, None).await;
        }
    }

    /// Clears every reaction, falling back to removing the candidates (and the chosen
    /// reaction) one at a time when the bulk clear is refused.
    async fn strip_reactions(
        &self,
        message: &MessageRef,
        tokens: &[ReactionToken],
        chosen: Option<&ReactionEvent>,
    ) {
        let Err(e) = self.messenger.clear_reactions(message).await else {
            return;
        };
        debug!(
            "Bulk reaction clear on {} failed ({e}), removing one by one",
            message.message_id
        );

        let me = self.messenger.current_user_id();
        for token in tokens {
            self.remove_quietly(message, token, me).await;
        }
        if let Some(event) = chosen {
            self.remove_quietly(message, &event.token, event.user_id)
                .await;
        }
    }

    async fn remove_quietly(&self, message: &MessageRef, token: &ReactionToken, user_id: UserId) {
        if let Err(e) = self
            .messenger
            .remove_reaction(message, token, user_id)
            .await
        {
            if e.is_cleanup_tolerable() {
                debug!(
                    "Could not remove reaction {token} from {}: {e}",
                    message.message_id
                );
            } else {
                warn!(
                    "Could not remove reaction {token} from {}: {e}",
                    message.message_id
                );
            }
        }
    }
}
