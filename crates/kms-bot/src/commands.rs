//! Slash commands (poise).
//!
//! | command              | who            |
//! |----------------------|----------------|
//! | `ping`               | anyone         |
//! | `purge_messages`     | owner or mod   |
//! | `stop_message_purge` | owner          |
//! | `purge_users`        | owner          |
//! | `tmo`                | anyone (self)  |
//! | `help`               | anyone         |

use std::borrow::Cow;

use kms_core::app::{MemberPurgeReport, ModerationService, PurgeScheduler};
use kms_core::domain::{
    ChannelId, GuildId, ModerationError, RoleId, UserId, format_duration, parse_duration,
};
use poise::serenity_prelude as serenity;
use tracing::{info, warn};

use crate::config::BotConfig;

/// poise data
pub struct Data {
    pub scheduler: PurgeScheduler,
    pub moderation: ModerationService,
    pub config: BotConfig,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

const NOT_ALLOWED: &str = "You are not allowed to run that command";
const NO_PROTECTED_ROLES: &str =
    "No protected roles are configured (KMS_PROTECTED_ROLE_IDS / KMS_MOD_ROLE_ID), nobody was kicked";

pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        ping(),
        purge_messages(),
        stop_message_purge(),
        purge_users(),
        tmo(),
        help(),
    ]
}

/// Owner always passes; a member with the moderator role passes when allowed.
fn is_allowed(
    author: serenity::UserId,
    owner: Option<serenity::UserId>,
    roles: &[serenity::RoleId],
    mod_role: Option<RoleId>,
) -> bool {
    if owner == Some(author) {
        return true;
    }
    mod_role.is_some_and(|role| roles.iter().any(|r| r.get() == role.get()))
}

async fn deny(ctx: Context<'_>) -> Result<bool, Error> {
    ctx.send(poise::CreateReply::default().content(NOT_ALLOWED).ephemeral(true))
        .await?;
    Ok(false)
}

async fn guild_owner(ctx: Context<'_>) -> Option<serenity::UserId> {
    ctx.partial_guild().await.map(|g| g.owner_id)
}

async fn owner_only(ctx: Context<'_>) -> Result<bool, Error> {
    let owner = guild_owner(ctx).await;
    if is_allowed(ctx.author().id, owner, &[], None) {
        return Ok(true);
    }
    deny(ctx).await
}

async fn owner_or_mod(ctx: Context<'_>) -> Result<bool, Error> {
    let owner = guild_owner(ctx).await;
    let roles = match ctx.author_member().await {
        Some(Cow::Borrowed(member)) => member.roles.clone(),
        Some(Cow::Owned(member)) => member.roles,
        None => Vec::new(),
    };
    if is_allowed(ctx.author().id, owner, &roles, ctx.data().config.mod_role_id) {
        return Ok(true);
    }
    deny(ctx).await
}

/// Pings the bot
#[poise::command(slash_command)]
async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("pong").await?;
    Ok(())
}

/// Sets a task which will purge messages in this channel after a given time-to-live
#[poise::command(slash_command, guild_only, check = "owner_or_mod")]
async fn purge_messages(
    ctx: Context<'_>,
    #[description = "Time-to-live for messages in the channel. E.g. 24h, 30s, 2d, 5m"] ttl: String,
) -> Result<(), Error> {
    let ttl = match parse_duration(&ttl) {
        Ok(ttl) => ttl,
        Err(err) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(err.to_string())
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
    };

    let is_text = ctx
        .guild_channel()
        .await
        .is_some_and(|c| c.kind == serenity::ChannelType::Text);
    if !is_text {
        ctx.say("This command only works in text channels").await?;
        return Ok(());
    }

    // マーカー投稿などで 3 秒を超えることがある
    ctx.defer_ephemeral().await?;

    let channel = ChannelId::new(ctx.channel_id().get());
    let reply = match ctx.data().scheduler.set_schedule(channel, ttl).await {
        Ok(outcome) => {
            info!(
                %channel,
                user = %ctx.author().id,
                retention = %format_duration(outcome.effective),
                "purge task updated"
            );
            "Purge loop was set".to_string()
        }
        Err(err) => {
            warn!(%channel, error = %err, "failed to set purge task");
            format!("failed to set purge task for channel: {err}")
        }
    };
    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// Stops the message purge of the current channel
#[poise::command(slash_command, guild_only, check = "owner_only")]
async fn stop_message_purge(ctx: Context<'_>) -> Result<(), Error> {
    let channel = ChannelId::new(ctx.channel_id().get());
    if ctx.data().scheduler.stop_schedule(channel).await {
        ctx.say("Message purging stopped in this channel.").await?;
    } else {
        ctx.say("Nothing to stop in this channel.").await?;
    }
    Ok(())
}

/// Purges all users who are not assigned specific roles
#[poise::command(slash_command, guild_only, check = "owner_only")]
async fn purge_users(
    ctx: Context<'_>,
    #[description = "Prints users as a response rather than purging them"] dry_run: Option<bool>,
) -> Result<(), Error> {
    let dry_run = dry_run.unwrap_or(false);
    let Some(guild) = ctx.guild_id() else {
        return Ok(());
    };
    ctx.defer().await?;

    let data = ctx.data();
    let bot = UserId::new(ctx.framework().bot_id.get());
    let result = data
        .moderation
        .purge_members(
            GuildId::new(guild.get()),
            bot,
            &data.config.protected_roles,
            dry_run,
        )
        .await;
    let report = match result {
        Ok(report) => report,
        Err(ModerationError::NoProtectedRoles) => {
            ctx.say(NO_PROTECTED_ROLES).await?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    ctx.send(
        poise::CreateReply::default()
            .content(purge_report_text(&report))
            .ephemeral(dry_run),
    )
    .await?;
    Ok(())
}

/// Time yourself out for a defined duration
#[poise::command(slash_command, guild_only)]
async fn tmo(
    ctx: Context<'_>,
    #[description = "Duration in which to be timed out for. E.g. 1h, 1d"] duration: String,
    #[description = "Optional reason for the timeout"] reason: Option<String>,
) -> Result<(), Error> {
    let Some(guild) = ctx.guild_id() else {
        return Ok(());
    };

    let reply = match parse_duration(&duration) {
        Err(err) => err.to_string(),
        Ok(duration) => {
            let result = ctx
                .data()
                .moderation
                .self_timeout(
                    GuildId::new(guild.get()),
                    UserId::new(ctx.author().id.get()),
                    duration,
                    reason.as_deref(),
                )
                .await;
            match result {
                Ok(_) => format!("You will be timed out for {}", format_duration(duration)),
                Err(err) => timeout_error_text(&err),
            }
        }
    };

    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// Shows the available commands
#[poise::command(slash_command)]
async fn help(
    ctx: Context<'_>,
    #[description = "Command to show help about"] command: Option<String>,
) -> Result<(), Error> {
    poise::builtins::help(ctx, command.as_deref(), Default::default()).await?;
    Ok(())
}

fn purge_report_text(report: &MemberPurgeReport) -> String {
    if report.dry_run {
        return format!(
            "```Users to purge: {}```",
            report.plan.names_to_kick().join(", ")
        );
    }
    if report.failed == 0 {
        format!("Users have been kicked ({})", report.kicked)
    } else {
        format!(
            "Users have been kicked ({}), {} could not be kicked",
            report.kicked, report.failed
        )
    }
}

fn timeout_error_text(err: &ModerationError) -> String {
    match err {
        ModerationError::TimeoutTooLong(_) => "Timeouts can last at most 28 days".to_string(),
        ModerationError::ZeroTimeout => "Timeout duration must be positive".to_string(),
        ModerationError::Platform(err) => format!("failed to time you out: {err}"),
        ModerationError::NoProtectedRoles => NO_PROTECTED_ROLES.to_string(),
    }
}

/// Logs command failures and tells the caller.
pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            warn!(command = %ctx.command().name, error = %error, "command failed");
            let reply = poise::CreateReply::default()
                .content(format!("command failed: {error}"))
                .ephemeral(true);
            if let Err(err) = ctx.send(reply).await {
                warn!(error = %err, "could not report command failure");
            }
        }
        other => {
            if let Err(err) = poise::builtins::on_error(other).await {
                warn!(error = %err, "error while handling framework error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kms_core::domain::{MemberPurgePlan, MemberSummary, PlatformError};
    use rstest::rstest;
    use std::time::Duration;

    fn user(id: u64) -> serenity::UserId {
        serenity::UserId::new(id)
    }

    #[rstest]
    #[case::owner(1, Some(1), vec![], None, true)]
    #[case::moderator(2, Some(1), vec![7], Some(7), true)]
    #[case::mod_role_unset(2, Some(1), vec![7], None, false)]
    #[case::stranger(3, Some(1), vec![8], Some(7), false)]
    #[case::unknown_owner(1, None, vec![], None, false)]
    fn allowance(
        #[case] author: u64,
        #[case] owner: Option<u64>,
        #[case] roles: Vec<u64>,
        #[case] mod_role: Option<u64>,
        #[case] expected: bool,
    ) {
        let roles: Vec<_> = roles.into_iter().map(serenity::RoleId::new).collect();
        assert_eq!(
            is_allowed(
                user(author),
                owner.map(user),
                &roles,
                mod_role.map(RoleId::new)
            ),
            expected
        );
    }

    fn report(dry_run: bool, kicked: usize, failed: usize) -> MemberPurgeReport {
        MemberPurgeReport {
            plan: MemberPurgePlan {
                protected: Vec::new(),
                to_kick: ["lurker", "spammer"]
                    .iter()
                    .enumerate()
                    .map(|(i, name)| MemberSummary {
                        user_id: UserId::new(i as u64 + 1),
                        name: name.to_string(),
                        roles: Vec::new(),
                    })
                    .collect(),
            },
            dry_run,
            kicked,
            failed,
        }
    }

    #[test]
    fn dry_run_lists_names() {
        assert_eq!(
            purge_report_text(&report(true, 0, 0)),
            "```Users to purge: lurker, spammer```"
        );
    }

    #[rstest]
    #[case::all_kicked(2, 0, "Users have been kicked (2)")]
    #[case::some_failed(1, 1, "Users have been kicked (1), 1 could not be kicked")]
    fn kick_summary(#[case] kicked: usize, #[case] failed: usize, #[case] expected: &str) {
        assert_eq!(purge_report_text(&report(false, kicked, failed)), expected);
    }

    #[test]
    fn timeout_errors_are_human_readable() {
        assert_eq!(
            timeout_error_text(&ModerationError::TimeoutTooLong(Duration::from_secs(1))),
            "Timeouts can last at most 28 days"
        );
        assert_eq!(
            timeout_error_text(&ModerationError::Platform(
                PlatformError::MissingPermissions
            )),
            "failed to time you out: missing permissions"
        );
    }

    #[test]
    fn missing_protection_points_at_the_config() {
        let text = timeout_error_text(&ModerationError::NoProtectedRoles);
        assert!(text.contains("KMS_PROTECTED_ROLE_IDS"));
        assert!(text.contains("nobody was kicked"));
    }
}
