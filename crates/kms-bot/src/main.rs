//! kms - Discord moderation bot with rolling per-channel message purges.

mod commands;
mod config;
mod discord;

use std::sync::Arc;

use anyhow::Context as _;
use kms_core::app::{ModerationService, Reconciler, SchedulerBuilder};
use kms_core::impls::SqliteTaskStore;
use poise::serenity_prelude as serenity;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::commands::Data;
use crate::config::BotConfig;
use crate::discord::DiscordGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kms_bot=info,kms_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env()?;
    info!(db = %config.db_path.display(), guild = ?config.guild_id, "starting kms");

    let store = SqliteTaskStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;

    // スケジューラはクライアントと同じトークンの HTTP クライアントで動く
    let http = Arc::new(serenity::Http::new(&config.discord_token));
    let gateway = Arc::new(DiscordGateway::new(http));
    let scheduler = SchedulerBuilder::new()
        .store(Arc::new(store))
        .channels(gateway.clone())
        .build()?;
    let moderation = ModerationService::new(gateway);

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MODERATION;

    let setup_scheduler = scheduler.clone();
    let setup_config = config.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: None,
                ..Default::default()
            },
            on_error: |error| Box::pin(commands::on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let name = ready.user.name.clone();
            Box::pin(async move {
                info!("logged in as {} (id {})", name, ready.user.id);

                let commands = &framework.options().commands;
                match setup_config.guild_id {
                    Some(guild) => {
                        let guild = serenity::GuildId::new(guild.get());
                        poise::builtins::register_in_guild(ctx, commands, guild).await?;
                        info!(%guild, "registered slash commands in guild");
                    }
                    None => {
                        poise::builtins::register_globally(ctx, commands).await?;
                        info!("registered global slash commands");
                    }
                }

                Reconciler::new(setup_scheduler.clone()).reconcile().await;

                ctx.set_presence(
                    Some(serenity::ActivityData::playing(format!("@{name} help"))),
                    serenity::OnlineStatus::Online,
                );

                Ok(Data {
                    scheduler: setup_scheduler,
                    moderation,
                    config: setup_config,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("building discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "could not listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, shutting down");
        shard_manager.shutdown_all().await;
    });

    let result = client.start().await;
    scheduler.shutdown().await;
    result.context("discord client stopped with an error")?;

    info!("bye");
    Ok(())
}
