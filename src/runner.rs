//! Drives one TCP connection lifecycle: dial, run a protocol handler until
//! it terminates, close the socket unconditionally.
//!
//! Mirrors `client_runner.py::run_client` (strip IPv6 brackets, connect,
//! drive the protocol task, always close on exit) and
//! `server_connector.py::connect_to_server` for the game-session shape.
//! Socket close on every exit path is made structural with
//! `scopeguard::guard`, the same RAII-cleanup idiom the teacher uses in
//! `relay/connection.rs`'s `_shutdown_guard`.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::bot::{BotAction, BotConfig, PrayerBot};
use crate::ip_resolver::{IpResolver, RemoteServer, ResolveOutcome};
use crate::protocol::coordinator::CoordinatorPacket;
use crate::protocol::game::GamePacket;
use crate::reconnect::SessionError;
use crate::wire::frame::{encode_frame, FrameDecoder};

const BAN_CHECK_DELAY: Duration = Duration::from_secs(1);
const CONFIRM_MOVE_DELAY: Duration = Duration::from_secs(1);
const READ_BUF_SIZE: usize = 4096;

/// Strips a single layer of surrounding `[`/`]` from a coordinator-supplied
/// host, independently at each end (matching `str.removeprefix`/
/// `removesuffix` in `client_runner.py`, not a balanced-bracket check).
fn strip_brackets(host: &str) -> &str {
    let host = host.strip_prefix('[').unwrap_or(host);
    host.strip_suffix(']').unwrap_or(host)
}

async fn dial(host: &str, port: u16) -> std::io::Result<TcpStream> {
    let host = strip_brackets(host);
    TcpStream::connect((host, port)).await
}

/// Waits on an optional deadline; `None` never resolves, letting
/// `tokio::select!` treat an unscheduled timer as simply absent from the
/// race.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

/// Resolves `invite_code` to a direct address via the coordinator protocol.
pub async fn resolve_invite_code(
    invite_code: &str,
    coordinator_host: &str,
    coordinator_port: u16,
) -> anyhow::Result<RemoteServer> {
    let mut stream = dial(coordinator_host, coordinator_port).await?;
    let _close_guard = scopeguard::guard((), |()| {
        log::debug!("closing coordinator connection");
    });

    let mut resolver = IpResolver::new(invite_code);
    stream
        .write_all(&encode_frame(&resolver.initial_packet())?)
        .await?;

    let mut decoder = FrameDecoder::<CoordinatorPacket>::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            anyhow::bail!("coordinator closed the connection before resolving the invite code");
        }
        for packet in decoder.feed(&buf[..n])? {
            if let ResolveOutcome::Resolved(remote_server) = resolver.handle_packet(packet)? {
                return Ok(remote_server);
            }
        }
    }
}

/// Runs one game session against `remote_server` to completion, returning
/// whether the reconnect supervisor should start another one.
pub async fn run_game_session(
    remote_server: &RemoteServer,
    bot_config: BotConfig,
    saveload_dump_file: Option<&std::path::Path>,
) -> Result<bool, SessionError> {
    let mut stream = dial(&remote_server.host, remote_server.port)
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                SessionError::ConnectionRefused
            } else {
                SessionError::Other(e.into())
            }
        })?;
    let _close_guard = scopeguard::guard((), |()| {
        log::debug!("closing game connection");
    });

    let mut bot = PrayerBot::new(bot_config);
    let mut decoder = FrameDecoder::<GamePacket>::new();
    let mut ban_check_deadline: Option<Instant> = None;
    let mut confirm_move_deadline: Option<Instant> = None;

    for action in bot.opened() {
        apply_action(&mut stream, &mut bot, action, &mut ban_check_deadline, &mut confirm_move_deadline, saveload_dump_file)
            .await
            .map_err(SessionError::Other)?;
    }

    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        tokio::select! {
            read_result = stream.read(&mut buf) => {
                let n = read_result.map_err(|e| SessionError::Other(e.into()))?;
                if n == 0 {
                    log::warn!("server closed the connection");
                    for action in bot.connection_lost() {
                        apply_action(&mut stream, &mut bot, action, &mut ban_check_deadline, &mut confirm_move_deadline, saveload_dump_file)
                            .await
                            .map_err(SessionError::Other)?;
                    }
                } else {
                    let packets = decoder.feed(&buf[..n]).map_err(|e| SessionError::Other(e.into()))?;
                    for packet in packets {
                        let actions = bot.handle_packet(packet).map_err(|e| SessionError::Other(e.into()))?;
                        for action in actions {
                            apply_action(&mut stream, &mut bot, action, &mut ban_check_deadline, &mut confirm_move_deadline, saveload_dump_file)
                                .await
                                .map_err(SessionError::Other)?;
                        }
                    }
                }
            }
            () = sleep_until_opt(ban_check_deadline) => {
                ban_check_deadline = None;
                for action in bot.ban_check_timer_fired() {
                    apply_action(&mut stream, &mut bot, action, &mut ban_check_deadline, &mut confirm_move_deadline, saveload_dump_file)
                        .await
                        .map_err(SessionError::Other)?;
                }
            }
            () = sleep_until_opt(confirm_move_deadline) => {
                confirm_move_deadline = None;
                for action in bot.confirm_move_timer_fired() {
                    apply_action(&mut stream, &mut bot, action, &mut ban_check_deadline, &mut confirm_move_deadline, saveload_dump_file)
                        .await
                        .map_err(SessionError::Other)?;
                }
            }
        }

        if bot.is_terminated() {
            return Ok(bot.should_reconnect);
        }
    }
}

async fn apply_action(
    stream: &mut TcpStream,
    bot: &mut PrayerBot,
    action: BotAction,
    ban_check_deadline: &mut Option<Instant>,
    confirm_move_deadline: &mut Option<Instant>,
    saveload_dump_file: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    match action {
        BotAction::Send(packet) => {
            stream.write_all(&encode_frame(&packet)?).await?;
        }
        BotAction::StartBanCheckTimer => {
            *ban_check_deadline = Some(Instant::now() + BAN_CHECK_DELAY);
        }
        BotAction::CancelBanCheckTimer => {
            *ban_check_deadline = None;
        }
        BotAction::StartConfirmMoveTimer => {
            *confirm_move_deadline = Some(Instant::now() + CONFIRM_MOVE_DELAY);
        }
        BotAction::CancelConfirmMoveTimer => {
            *confirm_move_deadline = None;
        }
        BotAction::DumpSaveload => {
            if let (Some(path), Some(bytes)) = (saveload_dump_file, bot.last_savegame_bytes()) {
                if let Err(e) = tokio::fs::write(path, bytes).await {
                    log::warn!("failed to write saveload_dump_file {}: {e}", path.display());
                }
            }
        }
        BotAction::Terminate => {}
    }
    Ok(())
}
