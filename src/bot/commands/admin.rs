//! Server administration commands.

const NOT_CHANGED: &str = "Prefix has not been changed.";

const REMOVE_PREFIX: &str =
    "You may have forgotten the prefix. Do you want to remove the need for a prefix?";

/// What to say once `prefix` is stored.
fn prefix_set_notice(prefix: &str) -> String {
    if prefix.is_empty() {
        "The prefix has been removed. Mention me to use my commands.".to_string()
    } else {
        format!("The prefix has been set to: \"{prefix}\" successfully!")
    }
}

/// What to say when `prefix` is already in use.
fn prefix_unchanged_notice(prefix: &str) -> String {
    if prefix.is_empty() {
        "I already respond only to mentions here!".to_string()
    } else {
        format!("The prefix is already set to `{prefix}`!")
    }
}

mod inner {
    #![allow(missing_docs)]

    use super::{NOT_CHANGED, REMOVE_PREFIX, prefix_set_notice, prefix_unchanged_notice};
    use crate::{
        bot::{BotData, prompter},
        core::{
            ids::{Reply, Scope},
            prefix::{PrefixReview, review_prefix},
        },
        errors::{Error, Result},
    };
    use tracing::info;

    /// Changes the prefix I respond to here.
    ///
    /// Leave the prefix out to make me respond to mentions only.
    #[poise::command(
        prefix_command,
        category = "Admin",
        aliases("set-prefix", "set_prefix"),
        required_permissions = "MANAGE_GUILD"
    )]
    pub async fn setprefix(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "The new prefix"]
        #[rest]
        prefix: Option<String>,
    ) -> Result<()> {
        let data = ctx.data();
        let bot_id = ctx.framework().bot_id.get();

        let (prefix, confirmations) = match review_prefix(prefix.as_deref(), bot_id) {
            PrefixReview::Rejected(reason) => {
                ctx.say(reason).await?;
                return Ok(());
            }
            PrefixReview::Missing => (String::new(), vec![REMOVE_PREFIX.to_string()]),
            PrefixReview::Accepted {
                prefix,
                confirmations,
            } => (prefix, confirmations),
        };

        let scope = Scope::of(ctx.guild_id(), ctx.channel_id());
        if data.prefixes.get_prefix(&scope).await == prefix {
            ctx.say(prefix_unchanged_notice(&prefix)).await?;
            return Ok(());
        }

        let prompter = prompter(ctx);
        let mut message = None;
        for question in confirmations {
            let (accepted, shown) = prompter
                .confirm_action(&Reply::text(question), message, prompter.timeout())
                .await;
            message = shown;
            if !accepted {
                prompter
                    .send_or_edit(message, &Reply::text(NOT_CHANGED))
                    .await?;
                return Ok(());
            }
        }

        let notice = match data.prefixes.set_prefix(&scope, &prefix).await {
            Ok(()) => {
                info!("Prefix for scope {} set to {prefix:?}", scope.key());
                prefix_set_notice(&prefix)
            }
            Err(Error::NotConnected) => {
                "I can't reach my database right now, so the prefix can't be changed. Try again later."
                    .to_string()
            }
            Err(Error::InvalidPrefix { reason }) => format!("{NOT_CHANGED} ({reason})"),
            Err(e) => return Err(e),
        };
        prompter.send_or_edit(message, &Reply::text(notice)).await?;
        Ok(())
    }
}

pub use inner::*;
