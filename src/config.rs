//! YAML configuration loading and validation.
//!
//! Field shapes follow `original_source/config.py`'s `Server`/`Bot`/`Ottd`
//! dataclasses; load/validate structure follows the teacher's
//! `Config::load` (read file, parse, then a validation pass) in
//! `cli/src/config.rs`.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::bot::AutoReconnectCondition;

fn default_server_port() -> u16 {
    3979
}

fn default_coordinator_host() -> String {
    "coordinator.openttd.org".to_string()
}

fn default_coordinator_port() -> u16 {
    3976
}

fn default_revision_stable() -> bool {
    true
}

/// `server:` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub player_name: String,
    #[serde(default)]
    pub server_host: Option<String>,
    #[serde(default)]
    pub invite_code: Option<String>,
    /// External 1-based company id, as written in the config file.
    #[serde(default)]
    pub company_id: Option<u8>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default)]
    pub server_password: Option<String>,
    #[serde(default)]
    pub company_password: Option<String>,
}

/// `bot:` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BotSection {
    #[serde(default)]
    pub spectate_if_alone: bool,
    #[serde(default)]
    pub auto_reconnect_if: Vec<AutoReconnectCondition>,
    pub auto_reconnect_wait: u64,
    pub reconnect_count: u32,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub saveload_dump_file: Option<String>,

    // Deprecated boolean fields, folded into `auto_reconnect_if` at load time.
    #[serde(default)]
    pub auto_reconnect: Option<bool>,
    #[serde(default)]
    pub auto_reconnect_if_wrong_game_password: Option<bool>,
    #[serde(default)]
    pub auto_reconnect_if_company_not_found: Option<bool>,
    #[serde(default)]
    pub auto_reconnect_if_cannot_move: Option<bool>,
    #[serde(default)]
    pub auto_reconnect_if_shutdown: Option<bool>,
    #[serde(default)]
    pub auto_reconnect_if_banned: Option<bool>,
    #[serde(default)]
    pub auto_reconnect_if_restarting: Option<bool>,
}

/// `ottd:` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OttdConfig {
    #[serde(default)]
    pub network_revision: Option<String>,
    #[serde(default)]
    pub revision_major: Option<u8>,
    #[serde(default)]
    pub revision_minor: Option<u8>,
    #[serde(default = "default_revision_stable")]
    pub revision_stable: bool,
    #[serde(default = "default_coordinator_host")]
    pub coordinator_host: String,
    #[serde(default = "default_coordinator_port")]
    pub coordinator_port: u16,
}

/// The full, as-deserialized configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub bot: BotSection,
    #[serde(default = "Config::default_ottd")]
    pub ottd: OttdConfig,
}

impl Config {
    fn default_ottd() -> OttdConfig {
        OttdConfig {
            network_revision: None,
            revision_major: None,
            revision_minor: None,
            revision_stable: default_revision_stable(),
            coordinator_host: default_coordinator_host(),
            coordinator_port: default_coordinator_port(),
        }
    }

    /// Loads and validates a configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Enforces the invariants `original_source/config.py`'s
    /// `__post_init__` methods check, plus folds deprecated booleans into
    /// `auto_reconnect_if`.
    fn validate(&mut self) -> Result<()> {
        if self.server.server_host.is_some() == self.server.invite_code.is_some() {
            bail!("exactly one of server.server_host or server.invite_code must be set");
        }
        if self.server.company_id.is_some() == self.server.company_name.is_some() {
            bail!("exactly one of server.company_id or server.company_name must be set");
        }
        if let Some(id) = self.server.company_id {
            if !(1..=15).contains(&id) {
                bail!("server.company_id must be in 1..=15, got {id}");
            }
        }
        if (self.ottd.revision_major.is_some()) != (self.ottd.revision_minor.is_some()) {
            bail!("ottd.revision_major and ottd.revision_minor must both be set, or neither");
        }
        if self.ottd.network_revision.is_none()
            && self.ottd.revision_major.is_none()
            && self.ottd.revision_minor.is_none()
        {
            bail!(
                "ottd.network_revision must be set when ottd.revision_major/revision_minor are not, \
                 since the major/minor pair cannot be derived from a revision queried later from the server"
            );
        }
        if self.bot.auto_reconnect_wait == 0 {
            bail!("bot.auto_reconnect_wait must be a positive integer");
        }
        if self.bot.reconnect_count == 0 {
            bail!("bot.reconnect_count must be a positive integer");
        }

        self.fold_deprecated_reconnect_flags();

        if self.bot.auto_reconnect_if.is_empty() {
            bail!("bot.auto_reconnect_if must not be empty");
        }

        Ok(())
    }

    /// Folds the deprecated `auto_reconnect*` booleans into
    /// `auto_reconnect_if`, logging a `WARN` deprecation notice per field
    /// present, matching `original_source/config.py`'s fold-in mapping.
    fn fold_deprecated_reconnect_flags(&mut self) {
        let mut conditions: HashSet<AutoReconnectCondition> =
            self.bot.auto_reconnect_if.iter().copied().collect();

        if let Some(true) = self.bot.auto_reconnect {
            log::warn!("bot.auto_reconnect is deprecated; use bot.auto_reconnect_if instead");
            conditions.insert(AutoReconnectCondition::Unhandled);
            conditions.insert(AutoReconnectCondition::Kicked);
            conditions.insert(AutoReconnectCondition::ConnectionLost);
        }
        let deprecated_flags: &[(Option<bool>, &str, AutoReconnectCondition)] = &[
            (
                self.bot.auto_reconnect_if_wrong_game_password,
                "bot.auto_reconnect_if_wrong_game_password",
                AutoReconnectCondition::WrongGamePassword,
            ),
            (
                self.bot.auto_reconnect_if_company_not_found,
                "bot.auto_reconnect_if_company_not_found",
                AutoReconnectCondition::CompanyNotFound,
            ),
            (
                self.bot.auto_reconnect_if_cannot_move,
                "bot.auto_reconnect_if_cannot_move",
                AutoReconnectCondition::CannotMove,
            ),
            (
                self.bot.auto_reconnect_if_shutdown,
                "bot.auto_reconnect_if_shutdown",
                AutoReconnectCondition::ServerShuttingDown,
            ),
            (
                self.bot.auto_reconnect_if_banned,
                "bot.auto_reconnect_if_banned",
                AutoReconnectCondition::Banned,
            ),
            (
                self.bot.auto_reconnect_if_restarting,
                "bot.auto_reconnect_if_restarting",
                AutoReconnectCondition::ServerRestarting,
            ),
        ];
        for (flag, name, condition) in deprecated_flags {
            if *flag == Some(true) {
                log::warn!("{name} is deprecated; use bot.auto_reconnect_if instead");
                conditions.insert(*condition);
            }
        }

        self.bot.auto_reconnect_if = conditions.into_iter().collect();
    }
}
