//! Bot configuration loaded from the environment (and `.env` if present).

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use kms_core::domain::{GuildId, RoleId};
use thiserror::Error;

const DEFAULT_DB_PATH: &str = "kms.db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is not a valid id: {value:?}")]
    InvalidId { var: &'static str, value: String },
}

#[derive(Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub db_path: PathBuf,
    /// コマンドを即時登録するギルド。None ならグローバル登録
    pub guild_id: Option<GuildId>,
    pub mod_role_id: Option<RoleId>,
    /// `purge_users` でキックされないロール
    pub protected_roles: HashSet<RoleId>,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("discord_token", &"<redacted>")
            .field("db_path", &self.db_path)
            .field("guild_id", &self.guild_id)
            .field("mod_role_id", &self.mod_role_id)
            .field("protected_roles", &self.protected_roles)
            .finish()
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_KEY").ok_or(ConfigError::Missing("DISCORD_KEY"))?;
        let db_path = get("KMS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        let guild_id = get("KMS_GUILD_ID")
            .map(|v| parse_id("KMS_GUILD_ID", &v).map(GuildId::new))
            .transpose()?;
        let mod_role_id = get("KMS_MOD_ROLE_ID")
            .map(|v| parse_id("KMS_MOD_ROLE_ID", &v).map(RoleId::new))
            .transpose()?;

        let mut protected_roles = HashSet::new();
        if let Some(list) = get("KMS_PROTECTED_ROLE_IDS") {
            for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                protected_roles.insert(RoleId::new(parse_id("KMS_PROTECTED_ROLE_IDS", part)?));
            }
        }
        // モデレーターは常に保護する
        protected_roles.extend(mod_role_id);

        Ok(Self {
            discord_token,
            db_path,
            guild_id,
            mod_role_id,
            protected_roles,
        })
    }
}

fn parse_id(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| ConfigError::InvalidId {
            var,
            value: value.to_string(),
        })
}
