//! Bot layer - Discord-specific interface and command handlers
//!
//! This module wires the core services into poise: the dynamic prefix, the command
//! lifecycle hooks that feed the exit coordinator, reaction routing, and the supervisor
//! that turns a terminal exit phase into a shard shutdown or a process exit.

/// Discord command implementations (general, admin, developer)
pub mod commands;
/// Framework error, event and autocomplete handlers
pub mod handlers;
/// Serenity implementation of the core messenger
pub mod messenger;

use crate::{
    config::{owners, settings::Settings},
    core::{
        exit::ExitCoordinator,
        ids::Scope,
        prefix::PrefixCache,
        reactions::{Answers, Prompter, ReactionHub},
        registry::CommandRegistry,
    },
    errors::{Error, Result},
};
use messenger::SerenityMessenger;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Poise context with the bot's data and error types.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Shared data available to all bot commands.
/// This structure holds the core services every command and hook needs.
pub struct BotData {
    /// Loaded configuration
    pub settings: Arc<Settings>,
    /// Prefix lookups
    pub prefixes: Arc<PrefixCache>,
    /// Reaction routing for prompts
    pub reactions: ReactionHub,
    /// Shutdown coordination
    pub exit: Arc<ExitCoordinator>,
    /// Index of the registered commands
    pub registry: CommandRegistry,
    /// Outbound messaging for prompts
    pub messenger: SerenityMessenger,
    /// Yes/no tokens from the settings
    pub answers: Answers,
}

impl BotData {
    /// A prompter for `author` in `channel_id`, with the configured answers and timeout.
    #[must_use]
    pub fn prompter(
        &self,
        channel_id: serenity::ChannelId,
        author: serenity::UserId,
    ) -> Prompter<'_, SerenityMessenger> {
        Prompter::new(&self.messenger, &self.reactions, channel_id, author)
            .with_answers(self.answers.clone())
            .with_timeout(self.settings.reactions.timeout())
    }
}

/// A prompter for the invoking user in the invocation's channel.
#[must_use]
pub fn prompter(ctx: Context<'_>) -> Prompter<'_, SerenityMessenger> {
    ctx.data().prompter(ctx.channel_id(), ctx.author().id)
}

/// Every command the bot registers.
#[must_use]
pub fn all_commands() -> Vec<poise::Command<BotData, Error>> {
    vec![
        commands::ping(),
        commands::help(),
        commands::getuser(),
        commands::prefix(),
        commands::getreaction(),
        commands::setprefix(),
        commands::shutdown(),
        commands::say(),
        commands::wait(),
    ]
}

async fn dynamic_prefix(ctx: poise::PartialContext<'_, BotData, Error>) -> Result<Option<String>> {
    let scope = Scope::of(ctx.guild_id, ctx.channel_id);
    let prefix = ctx.data.prefixes.get_prefix(&scope).await;
    // An empty prefix means mention-only mode
    Ok((!prefix.is_empty()).then_some(prefix))
}

#[allow(clippy::exit)]
fn exit_now() -> ! {
    warn!("Forced shutdown, exiting without cleanup");
    std::process::exit(0)
}

/// Waits for the exit coordinator to terminate, then stops the bot exactly once.
///
/// A graceful exit closes the prefix store and shuts every shard down, which lets
/// `Client::start` return. A forced exit ends the process on the spot, and so does a
/// signal that arrives while the graceful teardown is still running.
fn spawn_supervisor(
    exit: Arc<ExitCoordinator>,
    prefixes: Arc<PrefixCache>,
    shard_manager: Arc<serenity::ShardManager>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if exit.terminated().await {
            exit_now();
        }

        info!("Shutting down");
        let teardown = async {
            if let Err(e) = prefixes.store().close().await {
                warn!("Failed to close the database cleanly: {e}");
            }
            shard_manager.shutdown_all().await;
        };
        tokio::select! {
            () = teardown => {}
            () = exit.forced() => exit_now(),
        }
    })
}

/// Builds the framework and runs the client until shutdown.
///
/// # Errors
/// Returns an error if the client cannot be created or the gateway connection fails.
#[instrument(skip_all)]
pub async fn run_bot(
    token: String,
    settings: Arc<Settings>,
    prefixes: Arc<PrefixCache>,
    exit: Arc<ExitCoordinator>,
) -> Result<()> {
    let answers = {
        let (yes, no) = settings.reactions.answer_tokens()?;
        Answers { yes, no }
    };
    let owners = owners::get_owner_ids();
    if owners.is_empty() {
        info!("BOT_OWNER_IDS not set, using the application owner");
    }

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: all_commands(),
            prefix_options: poise::PrefixFrameworkOptions {
                dynamic_prefix: Some(|ctx| Box::pin(dynamic_prefix(ctx))),
                mention_as_prefix: settings.bot.mention_as_prefix,
                case_insensitive_commands: true,
                ..Default::default()
            },
            initialize_owners: owners.is_empty(),
            owners,
            pre_command: |ctx| Box::pin(handlers::pre_command(ctx)),
            post_command: |ctx| Box::pin(handlers::post_command(ctx)),
            on_error: |error| Box::pin(handlers::on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup({
            let settings = Arc::clone(&settings);
            let prefixes = Arc::clone(&prefixes);
            let exit = Arc::clone(&exit);
            move |ctx, ready, framework| {
                Box::pin(async move {
                    info!("Logged in as {}", ready.user.name);
                    info!("Registering commands globally...");
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                    Ok(BotData {
                        settings,
                        prefixes,
                        reactions: ReactionHub::new(),
                        exit,
                        registry: CommandRegistry::from_commands(&framework.options().commands),
                        messenger: SerenityMessenger::new(Arc::clone(&ctx.http), ready.user.id),
                        answers,
                    })
                })
            }
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| tracing::error!("Error creating client: {e:?}"))?;

    let supervisor = spawn_supervisor(exit, prefixes, Arc::clone(&client.shard_manager));

    info!("Starting bot client...");
    let result = client.start().await;
    supervisor.abort();
    result.inspect_err(|e| tracing::error!("Client error: {e:?}"))?;
    Ok(())
}
