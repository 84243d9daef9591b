//! General Discord commands - ping, help, user lookup and prefix info.
//! The lookups here run through the reaction prompts, so they ask the user when a name is
//! ambiguous instead of guessing.

use crate::core::registry::CommandEntry;
use std::time::Duration;

/// Reply to `ping` for a gateway heartbeat latency of `latency`.
fn pong(latency: Duration) -> String {
    let secs = latency.as_secs_f64();
    if latency.is_zero() {
        "Pong! I haven't measured my latency yet.".to_string()
    } else if latency < Duration::from_secs(1) {
        format!("Pong! {secs:.4} seconds.")
    } else {
        format!("Pong... {secs:.4} seconds. That's slow!")
    }
}

/// Help overview listing `entries` grouped by category, in registration order.
fn command_overview<'a>(
    entries: impl IntoIterator<Item = &'a CommandEntry>,
    prefix: &str,
) -> String {
    let mut categories: Vec<(&str, Vec<&CommandEntry>)> = Vec::new();
    for entry in entries {
        let category = entry.category.as_deref().unwrap_or("Other");
        match categories.iter_mut().find(|(name, _)| *name == category) {
            Some((_, listed)) => listed.push(entry),
            None => categories.push((category, vec![entry])),
        }
    }

    let mut text = String::from("**Quanta Help**\n");
    for (category, listed) in categories {
        text.push_str(&format!("\n**{category}**\n"));
        for entry in listed {
            match &entry.description {
                Some(description) => {
                    text.push_str(&format!("• `{prefix}{}` - {description}\n", entry.name));
                }
                None => text.push_str(&format!("• `{prefix}{}`\n", entry.name)),
            }
        }
    }
    text.push_str(&format!(
        "\nTo see more information about a specific command use `{prefix}help (command)`."
    ));
    text
}

/// Help text for a single command.
fn describe_command(entry: &CommandEntry, prefix: &str) -> String {
    let mut text = format!("**{prefix}{}**", entry.name);
    if let Some(description) = &entry.description {
        text.push_str(&format!("\n{description}"));
    }
    if !entry.aliases.is_empty() {
        text.push_str(&format!("\nAliases: {}", entry.aliases.join(", ")));
    }
    text
}

fn unknown_command(prefix: &str) -> String {
    format!(
        "I couldn't find that command, sorry! Check `{prefix}help` for a list of the commands I have."
    )
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{command_overview, describe_command, pong, unknown_command};
    use crate::{
        bot::{BotData, handlers::autocomplete_command_name, prompter},
        core::{
            fuzzy::{Candidate, RankOptions, Resolution},
            ids::{Reply, Scope},
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;

    /// Shows my latency to Discord.
    #[poise::command(slash_command, prefix_command, category = "General")]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say(pong(ctx.ping().await)).await?;
        Ok(())
    }

    /// Shows my commands, or details about one of them.
    ///
    /// A misspelled command name is matched against the closest command, which is offered
    /// with a yes/no prompt.
    #[poise::command(
        slash_command,
        prefix_command,
        category = "General",
        aliases("commands")
    )]
    pub async fn help(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Command to look up"]
        #[autocomplete = "autocomplete_command_name"]
        #[rest]
        command: Option<String>,
    ) -> Result<()> {
        let data = ctx.data();
        let prefix = ctx.prefix();

        let Some(query) = command.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            ctx.say(command_overview(data.registry.visible(), prefix))
                .await?;
            return Ok(());
        };

        if let Some(entry) = data.registry.lookup(query).filter(|entry| !entry.hidden) {
            ctx.say(describe_command(entry, prefix)).await?;
            return Ok(());
        }

        let threshold = data.settings.fuzzy.command_threshold;
        let Some((_, entry)) = data.registry.suggest(query, threshold) else {
            ctx.say(unknown_command(prefix)).await?;
            return Ok(());
        };

        // Slash invocations must be answered through the interaction
        if let poise::Context::Application(_) = ctx {
            ctx.say(format!(
                "{} Did you mean `{prefix}{}`?",
                unknown_command(prefix),
                entry.name
            ))
            .await?;
            return Ok(());
        }

        let prompter = prompter(ctx);
        let prompt = Reply::text(format!("Do you mean my command `{}`?", entry.name));
        let (accepted, message) = prompter
            .confirm_action(&prompt, None, prompter.timeout())
            .await;
        let text = if accepted {
            describe_command(entry, prefix)
        } else {
            unknown_command(prefix)
        };
        prompter.send_or_edit(message, &Reply::text(text)).await?;
        Ok(())
    }

    async fn member_candidates(
        ctx: poise::Context<'_, BotData, Error>,
    ) -> Result<Vec<Candidate<serenity::User>>> {
        let Some(guild_id) = ctx.guild_id() else {
            let author = ctx.author();
            return Ok(vec![
                Candidate::new(author.name.clone(), author.clone()).with_id(author.id.get()),
            ]);
        };

        let members = guild_id
            .members(ctx.http(), None, None::<serenity::UserId>)
            .await?;
        Ok(members
            .into_iter()
            .map(|member| {
                let id = member.user.id.get();
                Candidate::new(member.user.name.clone(), member.user)
                    .with_id(id)
                    .with_alias(member.nick)
            })
            .collect())
    }

    /// Finds a member of this server by mention, id, name or nickname.
    #[poise::command(
        prefix_command,
        category = "General",
        aliases("get-user", "getmember", "get-member")
    )]
    pub async fn getuser(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Who to look for"]
        #[rest]
        user: String,
    ) -> Result<()> {
        let candidates = member_candidates(ctx).await?;
        let prompter = prompter(ctx);
        let options = RankOptions::from(&ctx.data().settings.fuzzy);

        match prompter.resolve(&user, candidates, None, options).await? {
            Resolution::Found { value, message } => {
                let reply =
                    Reply::text(format!("Found {}.", serenity::Mentionable::mention(&value)));
                prompter.send_or_edit(message, &reply).await?;
            }
            Resolution::NotFound { query, message } => {
                prompter
                    .report_not_found(message, &format!("Couldn't find the user \"{query}\"."))
                    .await?;
            }
        }
        Ok(())
    }

    /// Shows the prefix I respond to here.
    #[poise::command(slash_command, prefix_command, category = "General")]
    pub async fn prefix(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let scope = Scope::of(ctx.guild_id(), ctx.channel_id());
        let prefix = ctx.data().prefixes.get_prefix(&scope).await;
        let bot_id = ctx.framework().bot_id;

        let text = if prefix.is_empty() {
            format!("I don't use a prefix here, mention me instead: <@{bot_id}>")
        } else {
            format!("My prefix here is `{prefix}`. You can also mention me: <@{bot_id}>")
        };
        ctx.say(text).await?;
        Ok(())
    }

    /// Tells you which reaction you add to my message.
    #[poise::command(prefix_command, category = "General", aliases("get-reaction"))]
    pub async fn getreaction(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let prompter = prompter(ctx);
        let message = prompter
            .send(&Reply::text("React to this message!"))
            .await?;

        if let Some(reaction) = prompter
            .wait_for_reactions(&message, prompter.wait_options())
            .await?
        {
            let reply = Reply::text(format!("You reacted with {}", reaction.token));
            prompter.send_or_edit(Some(message), &reply).await?;
        }
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
