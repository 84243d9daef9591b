//! Command lifecycle hooks and framework error handling.
//!
//! Every command that reaches `pre_command` is counted as in flight on the exit
//! coordinator. It is released exactly once: by `post_command` when it returns `Ok`, or by
//! [`on_error`] for the error kinds poise raises after `pre_command` has run.

use crate::{
    bot::{BotData, Context},
    core::ids::Reply,
    errors::{Error, Result},
};
use poise::{FrameworkError, serenity_prelude as serenity};
use std::time::Duration;
use tracing::{debug, error, warn};

/// How long an unknown-command suggestion waits for an answer.
pub const SUGGESTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Counts the command as in flight.
pub async fn pre_command(ctx: Context<'_>) {
    let running = ctx.data().exit.on_command();
    debug!(
        "{} invoked {} ({running} running)",
        ctx.author().name,
        ctx.command().qualified_name
    );
}

/// Releases a command that finished successfully.
pub async fn post_command(ctx: Context<'_>) {
    // Underflow is logged by the coordinator
    let _ = ctx.data().exit.on_command_completion();
}

/// Framework errors that can be raised while a command invocation is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InvocationError {
    Command,
    ArgumentParse,
    CommandPanic,
    CommandStructureMismatch,
    SubcommandRequired,
}

/// Whether an error of `kind` is raised after `pre_command` counted the invocation.
///
/// Subcommand-required errors are raised before `pre_command`, and autocomplete callbacks
/// never go through it.
const fn follows_pre_command(kind: InvocationError, autocomplete: bool) -> bool {
    !autocomplete
        && matches!(
            kind,
            InvocationError::Command
                | InvocationError::ArgumentParse
                | InvocationError::CommandPanic
                | InvocationError::CommandStructureMismatch
        )
}

fn is_autocomplete(ctx: Context<'_>) -> bool {
    match ctx {
        poise::Context::Application(app) => matches!(
            app.interaction_type,
            poise::CommandInteractionType::Autocomplete
        ),
        poise::Context::Prefix(_) => false,
    }
}

/// Bot data of an invocation that went through `pre_command` before failing.
fn started_command<'a>(error: &FrameworkError<'a, BotData, Error>) -> Option<&'a BotData> {
    let (kind, ctx) = match error {
        FrameworkError::Command { ctx, .. } => (InvocationError::Command, *ctx),
        FrameworkError::ArgumentParse { ctx, .. } => (InvocationError::ArgumentParse, *ctx),
        FrameworkError::CommandPanic { ctx, .. } => (InvocationError::CommandPanic, *ctx),
        FrameworkError::CommandStructureMismatch { ctx, .. } => (
            InvocationError::CommandStructureMismatch,
            poise::Context::Application(*ctx),
        ),
        FrameworkError::SubcommandRequired { ctx } => (InvocationError::SubcommandRequired, *ctx),
        _ => return None,
    };
    follows_pre_command(kind, is_autocomplete(ctx)).then_some(ctx.data())
}

/// Central framework error handler.
pub async fn on_error(error: FrameworkError<'_, BotData, Error>) {
    if let Some(data) = started_command(&error) {
        let _ = data.exit.on_command_error();
    }

    match error {
        FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {error:?}");
        }
        FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {error:?}", ctx.command().name);
            if let Err(e) = ctx.say(format!("An error occurred: {error}")).await {
                error!("Failed to send error message: {e}");
            }
        }
        FrameworkError::UnknownCommand {
            msg,
            prefix,
            msg_content,
            framework,
            ..
        } => {
            if let Err(e) = suggest_command(framework.user_data, msg, prefix, msg_content).await {
                warn!("Failed to suggest a command for {msg_content:?}: {e}");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// The command name a prefixed message tried to invoke.
fn invoked_name(msg_content: &str) -> Option<&str> {
    msg_content.split_whitespace().next()
}

/// The text following the invoked name.
fn invoked_args(msg_content: &str) -> &str {
    msg_content
        .trim_start()
        .split_once(char::is_whitespace)
        .map_or("", |(_, rest)| rest.trim())
}

fn help_hint(prefix: &str) -> String {
    format!("Try using `{prefix}help` for information about my commands.")
}

/// Offers the closest visible command when a prefixed message names no command.
async fn suggest_command(
    data: &BotData,
    msg: &serenity::Message,
    prefix: &str,
    msg_content: &str,
) -> Result<()> {
    let Some(invoked) = invoked_name(msg_content) else {
        return Ok(());
    };
    if prefix.is_empty() {
        return Ok(());
    }

    let prompter = data.prompter(msg.channel_id, msg.author.id);
    let threshold = data.settings.fuzzy.command_threshold;
    let Some((name, _)) = data.registry.suggest(invoked, threshold) else {
        let notice = format!(
            "I don't have the command `{invoked}`, sorry! {}",
            help_hint(prefix)
        );
        prompter.send(&Reply::text(notice)).await?;
        return Ok(());
    };

    let prompt = Reply::text(format!("Did you mean to use `{prefix}{name}`?"));
    let (accepted, Some(message)) = prompter
        .confirm_action(&prompt, None, SUGGESTION_TIMEOUT)
        .await
    else {
        return Ok(());
    };

    let follow_up = if accepted {
        let args = invoked_args(msg_content);
        let usage = if args.is_empty() {
            format!("{prefix}{name}")
        } else {
            format!("{prefix}{name} {args}")
        };
        format!("Use `{usage}` to run it.")
    } else {
        help_hint(prefix)
    };
    prompter
        .send_or_edit(Some(message), &Reply::text(follow_up))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoked_name_and_args() {
        assert_eq!(invoked_name("getusr quanta bot"), Some("getusr"));
        assert_eq!(invoked_name("   "), None);
        assert_eq!(invoked_args("getusr   quanta bot "), "quanta bot");
        assert_eq!(invoked_args("ping"), "");
    }

    #[test]
    fn test_only_counted_invocations_are_released() {
        for kind in [
            InvocationError::Command,
            InvocationError::ArgumentParse,
            InvocationError::CommandPanic,
            InvocationError::CommandStructureMismatch,
        ] {
            assert!(follows_pre_command(kind, false), "{kind:?}");
            assert!(
                !follows_pre_command(kind, true),
                "{kind:?} from autocomplete"
            );
        }
        assert!(!follows_pre_command(
            InvocationError::SubcommandRequired,
            false
        ));
        assert!(!follows_pre_command(
            InvocationError::SubcommandRequired,
            true
        ));
    }

    #[test]
    fn test_help_hint() {
        assert_eq!(
            help_hint("?"),
            "Try using `?help` for information about my commands."
        );
    }
}
