//! Binary entry point: parse argv, load config, resolve the remote server,
//! then drive the reconnect supervisor until it returns.
//!
//! Mirrors `original_source/main.py`'s shape (usage check, config load,
//! optional coordinator resolve, then the connection loop) and the
//! teacher's `env_logger` init convention from `cli/src/main.rs`.

use std::collections::HashSet;

use anyhow::{Context, Result};

use prayerbot::bot::{AutoReconnectCondition, BotConfig, CompanyTarget};
use prayerbot::config::Config;
use prayerbot::ip_resolver::RemoteServer;
use prayerbot::reconnect::{self, ReconnectPolicy, SessionError};
use prayerbot::runner;

/// Derives `(revision_major, revision_minor)` from the configured pair if
/// present, else by splitting `network_revision` on `.`, matching
/// `prayer_bot.py`'s `"major.minor".split('.')` fallback.
fn derive_revision(config: &Config) -> Result<(u8, u8)> {
    if let (Some(major), Some(minor)) = (config.ottd.revision_major, config.ottd.revision_minor) {
        return Ok((major, minor));
    }
    let revision = config
        .ottd
        .network_revision
        .as_deref()
        .context("ottd.network_revision must be set when revision_major/revision_minor are not")?;
    let mut parts = revision.split('.');
    let major: u8 = parts
        .next()
        .context("network_revision is empty")?
        .parse()
        .with_context(|| format!("network_revision {revision:?} has a non-numeric major component"))?;
    let minor: u8 = parts
        .next()
        .context("network_revision has no minor component")?
        .parse()
        .with_context(|| format!("network_revision {revision:?} has a non-numeric minor component"))?;
    Ok((major, minor))
}

fn company_target(config: &Config) -> CompanyTarget {
    if let Some(id) = config.server.company_id {
        CompanyTarget::Id(id - 1)
    } else {
        let name = config.server.company_name.clone().unwrap_or_default();
        CompanyTarget::Name(name.into_bytes())
    }
}

fn bot_config(config: &Config) -> Result<BotConfig> {
    let (revision_major, revision_minor) = derive_revision(config)?;
    Ok(BotConfig {
        player_name: config.server.player_name.clone(),
        network_revision: config.ottd.network_revision.clone(),
        revision_major,
        revision_minor,
        revision_stable: config.ottd.revision_stable,
        server_password: config.server.server_password.clone(),
        company_password: config.server.company_password.clone(),
        company_target: company_target(config),
        spectate_if_alone: config.bot.spectate_if_alone,
        auto_reconnect_if: config
            .bot
            .auto_reconnect_if
            .iter()
            .copied()
            .collect::<HashSet<AutoReconnectCondition>>(),
    })
}

async fn resolve_remote_server(config: &Config) -> Result<RemoteServer> {
    if let Some(host) = &config.server.server_host {
        return Ok(RemoteServer {
            host: host.clone(),
            port: config.server.server_port,
        });
    }
    let invite_code = config
        .server
        .invite_code
        .as_deref()
        .context("neither server_host nor invite_code is set")?;
    runner::resolve_invite_code(invite_code, &config.ottd.coordinator_host, config.ottd.coordinator_port)
        .await
        .context("resolving invite code via coordinator")
}

async fn run(config_path: &str) -> Result<()> {
    let config = Config::load(config_path).context("loading configuration")?;

    if let Some(level) = &config.bot.log_level {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str())).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let remote_server = resolve_remote_server(&config).await?;
    log::info!("resolved remote server to {}:{}", remote_server.host, remote_server.port);

    let policy = ReconnectPolicy {
        auto_reconnect_if: config
            .bot
            .auto_reconnect_if
            .iter()
            .copied()
            .collect::<HashSet<AutoReconnectCondition>>(),
        auto_reconnect_wait: std::time::Duration::from_secs(config.bot.auto_reconnect_wait),
        reconnect_count: config.bot.reconnect_count,
    };
    let saveload_dump_file = config.bot.saveload_dump_file.as_ref().map(std::path::PathBuf::from);

    reconnect::run(&policy, || {
        let remote_server = remote_server.clone();
        let saveload_dump_file = saveload_dump_file.clone();
        async move {
            let bot_config = bot_config(&config).map_err(SessionError::Other)?;
            runner::run_game_session(&remote_server, bot_config, saveload_dump_file.as_deref()).await
        }
    })
    .await
}


fn main() -> std::process::ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} [config file]", args.first().map_or("prayerbot", String::as_str));
        return std::process::ExitCode::from(1);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start the async runtime: {e}");
            return std::process::ExitCode::from(1);
        }
    };

    match runtime.block_on(run(&args[1])) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            std::process::ExitCode::from(1)
        }
    }
}
