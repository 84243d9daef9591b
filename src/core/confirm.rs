//! Yes/no confirmation prompts built on reaction waits.

use crate::core::{
    ids::{MessageRef, Reply},
    messenger::Messenger,
    reactions::Prompter,
};
use std::time::Duration;
use tracing::warn;

/// Prompt used when a caller has nothing more specific to ask.
pub const DEFAULT_PROMPT: &str = "Are you sure?";

impl<M: Messenger> Prompter<'_, M> {
    /// Asks the author to confirm with the yes/no reaction pair.
    ///
    /// Sends `prompt`, or edits `existing` to show it, then waits up to `timeout` for the
    /// author to pick one of the two answers. Returns `true` only for the yes token; a
    /// decline, a timeout or a delivery failure all return `false`. The message is `None`
    /// only when the prompt could not be posted at all.
    pub async fn confirm_action(
        &self,
        prompt: &Reply,
        existing: Option<MessageRef>,
        timeout: Duration,
    ) -> (bool, Option<MessageRef>) {
        let message = match self.send_or_edit(existing, prompt).await {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    "Could not post confirmation prompt in {}: {e}",
                    self.channel_id
                );
                return (false, existing);
            }
        };

        let options = self
            .wait_options()
            .timeout(timeout)
            .accepting([self.answers.yes.clone(), self.answers.no.clone()]);
        match self.wait_for_reactions(&message, options).await {
            Ok(Some(reaction)) => (reaction.token == self.answers.yes, Some(message)),
            Ok(None) => (false, Some(message)),
            Err(e) => {
                warn!("Confirmation wait on {} failed: {e}", message.message_id);
                (false, Some(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ids::ReactionToken;
    use crate::core::reactions::{Answers, DEFAULT_TIMEOUT, ReactionHub};
    use crate::test_utils::{Call, FIRST_MESSAGE_ID, MockMessenger, event, wait_until_watching};
    use poise::serenity_prelude::{ChannelId, MessageId, UserId};

    const AUTHOR: u64 = 10;

    fn prompter<'a>(
        messenger: &'a MockMessenger,
        hub: &'a ReactionHub,
    ) -> Prompter<'a, MockMessenger> {
        Prompter::new(messenger, hub, ChannelId::new(1), UserId::new(AUTHOR))
    }

    fn sent() -> MessageRef {
        MessageRef::new(ChannelId::new(1), MessageId::new(FIRST_MESSAGE_ID))
    }

    async fn answer(hub: &ReactionHub, token: &ReactionToken) {
        wait_until_watching(hub, MessageId::new(FIRST_MESSAGE_ID)).await;
        hub.dispatch(event(FIRST_MESSAGE_ID, AUTHOR, token));
    }

    #[tokio::test]
    async fn test_yes_confirms() {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);
        let answers = Answers::default();

        let prompt = Reply::text(DEFAULT_PROMPT);
        let (result, ()) = tokio::join!(
            prompter.confirm_action(&prompt, None, DEFAULT_TIMEOUT),
            answer(&hub, &answers.yes),
        );

        assert_eq!(result, (true, Some(sent())));
        assert_eq!(messenger.texts(), vec![DEFAULT_PROMPT.to_string()]);
        assert_eq!(
            messenger.count(|call| matches!(call, Call::ClearReactions { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_no_declines() {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);
        let answers = Answers::default();

        let prompt = Reply::text("Delete everything?");
        let (result, ()) = tokio::join!(
            prompter.confirm_action(&prompt, None, DEFAULT_TIMEOUT),
            answer(&hub, &answers.no),
        );

        assert_eq!(result, (false, Some(sent())));
    }

    #[tokio::test]
    async fn test_custom_answers_are_used() {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let answers = Answers {
            yes: ReactionToken::parse("quantacheck:475029940639891467").unwrap(),
            no: ReactionToken::parse("quantacross:475029927281164288").unwrap(),
        };
        let prompter = prompter(&messenger, &hub).with_answers(answers.clone());

        let prompt = Reply::text(DEFAULT_PROMPT);
        let (result, ()) = tokio::join!(
            prompter.confirm_action(&prompt, None, DEFAULT_TIMEOUT),
            answer(&hub, &answers.yes),
        );

        assert!(result.0);
        assert!(messenger.calls().contains(&Call::AddReaction {
            message: sent(),
            token: answers.no,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_declines_and_edits() {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);

        let result = prompter
            .confirm_action(&Reply::text(DEFAULT_PROMPT), None, DEFAULT_TIMEOUT)
            .await;

        assert_eq!(result, (false, Some(sent())));
        assert_eq!(
            messenger.texts(),
            vec![DEFAULT_PROMPT.to_string(), "Timed out!".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_send_skips_the_wait() {
        let messenger = MockMessenger {
            fail_send: true,
            ..MockMessenger::new()
        };
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);

        let result = prompter
            .confirm_action(&Reply::text(DEFAULT_PROMPT), None, DEFAULT_TIMEOUT)
            .await;

        assert_eq!(result, (false, None));
        assert_eq!(
            messenger.count(|call| matches!(call, Call::AddReaction { .. })),
            0
        );
        assert_eq!(hub.pending(), 0);
    }

    #[tokio::test]
    async fn test_existing_message_is_reused() {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);
        let existing = MessageRef::new(ChannelId::new(1), MessageId::new(77));
        let answers = Answers::default();

        let driver = async {
            wait_until_watching(&hub, existing.message_id).await;
            hub.dispatch(event(77, AUTHOR, &answers.yes));
        };
        let prompt = Reply::text("Really?");
        let (result, ()) = tokio::join!(
            prompter.confirm_action(&prompt, Some(existing), DEFAULT_TIMEOUT),
            driver,
        );

        assert_eq!(result, (true, Some(existing)));
        assert_eq!(messenger.count(|call| matches!(call, Call::Send { .. })), 0);
        assert!(messenger.calls().contains(&Call::Edit {
            message: existing,
            reply: Reply::text("Really?"),
        }));
    }

    #[tokio::test]
    async fn test_failed_edit_keeps_existing_message() {
        let messenger = MockMessenger {
            fail_edit: true,
            ..MockMessenger::new()
        };
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);
        let existing = MessageRef::new(ChannelId::new(1), MessageId::new(77));

        let result = prompter
            .confirm_action(
                &Reply::text(DEFAULT_PROMPT),
                Some(existing),
                DEFAULT_TIMEOUT,
            )
            .await;

        assert_eq!(result, (false, Some(existing)));
        assert_eq!(
            messenger.count(|call| matches!(call, Call::AddReaction { .. })),
            0
        );
    }
}
