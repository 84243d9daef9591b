//! Owner-only commands, hidden from help.

use std::time::Duration;

/// Longest delay `wait` accepts.
const MAX_WAIT: Duration = Duration::from_secs(300);

/// Seconds to wait before forcing a shutdown. `now`, `immediately` and `force` mean 0,
/// a missing argument means `default`. `None` when the argument is not understood.
fn parse_wait(raw: Option<&str>, default: u64) -> Option<u64> {
    let Some(raw) = raw.map(str::trim) else {
        return Some(default);
    };
    if ["now", "immediately", "force"]
        .iter()
        .any(|word| raw.eq_ignore_ascii_case(word))
    {
        return Some(0);
    }
    raw.parse().ok()
}

fn commands_aborted(count: u64) -> String {
    let s = if count == 1 { "" } else { "s" };
    format!("{count} command{s} aborted to allow shutdown.")
}

mod inner {
    #![allow(missing_docs)]

    use super::{MAX_WAIT, commands_aborted, parse_wait};
    use crate::{
        bot::{BotData, prompter},
        core::{confirm::DEFAULT_PROMPT, ids::Reply, messenger::Messenger},
        errors::{Error, Result},
    };
    use std::time::Duration;
    use tracing::{info, instrument, warn};

    /// Bye bye Quanta...
    ///
    /// Waits for other running commands to finish, up to the given number of seconds,
    /// before shutting down. Use `now` to skip the wait.
    #[poise::command(
        prefix_command,
        owners_only,
        hide_in_help,
        category = "Developer",
        aliases("kill", "stop", "logout", "terminate")
    )]
    pub async fn shutdown(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Seconds to wait for other commands, or \"now\""] wait: Option<String>,
    ) -> Result<()> {
        let default = ctx.data().settings.shutdown.wait_secs;
        let Some(secs) = parse_wait(wait.as_deref(), default) else {
            let wait = wait.unwrap_or_default();
            ctx.say(format!("Invalid argument \"{wait}\" for wait."))
                .await?;
            return Ok(());
        };
        drain_and_exit(ctx, Duration::from_secs(secs)).await
    }

    #[instrument(skip(ctx), fields(user = %ctx.author().name))]
    async fn drain_and_exit(
        ctx: poise::Context<'_, BotData, Error>,
        budget: Duration,
    ) -> Result<()> {
        let exit = &ctx.data().exit;
        let prompter = prompter(ctx);

        let (accepted, message) = prompter
            .confirm_action(&Reply::text(DEFAULT_PROMPT), None, prompter.timeout())
            .await;
        if !accepted {
            if message.is_some() {
                prompter
                    .send_or_edit(message, &Reply::text("Shutdown cancelled."))
                    .await?;
            }
            return Ok(());
        }

        let message = prompter
            .send_or_edit(message, &Reply::text("Shutting down..."))
            .await?;
        // This command stays in flight until it returns, so the phase can't settle yet
        let running = exit.request_shutdown();
        info!("Shutdown requested with {running} command(s) running");

        let left = exit.wait_for_others(budget).await;
        if left == 0 {
            prompter
                .send_or_edit(Some(message), &Reply::text("Goodbye!"))
                .await?;
            return Ok(());
        }

        warn!("Forcing shutdown! {left} command(s) left hanging.");
        if let Err(e) = prompter
            .send_or_edit(Some(message), &Reply::text(commands_aborted(left)))
            .await
        {
            warn!("Failed to report aborted commands: {e}");
        }
        exit.force_terminate();
        Ok(())
    }

    /// Says what you say!
    #[poise::command(
        prefix_command,
        owners_only,
        hide_in_help,
        category = "Developer",
        aliases("speak")
    )]
    pub async fn say(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "What to say"]
        #[rest]
        text: String,
    ) -> Result<()> {
        ctx.say(text).await?;
        Ok(())
    }

    /// Stays busy for a while. Handy for trying out shutdown.
    #[poise::command(prefix_command, owners_only, hide_in_help, category = "Developer")]
    pub async fn wait(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "How long to wait in seconds"] seconds: Option<u64>,
    ) -> Result<()> {
        let duration = Duration::from_secs(seconds.unwrap_or(1)).min(MAX_WAIT);
        let prompter = prompter(ctx);

        let message = prompter.send(&Reply::text("Waiting...")).await?;
        tokio::time::sleep(duration).await;
        prompter
            .send_or_edit(Some(message), &Reply::text("Finished Waiting."))
            .await?;

        let yes = &ctx.data().answers.yes;
        if let Err(e) = prompter.messenger().add_reaction(&message, yes).await {
            warn!("Failed to mark {} as done: {e}", message.message_id);
        }
        Ok(())
    }
}

pub use inner::*;
