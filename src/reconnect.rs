//! Reconnect supervisor: runs one client session in a loop governed by
//! `auto_reconnect_if`, `auto_reconnect_wait`, and `reconnect_count`.
//!
//! Mirrors the outer/inner loop shape of `run_connection_loop` in the
//! teacher's `hub/command_channel.rs`, but deliberately does not copy its
//! exponential backoff doubling: `spec.md` §4.8 pins a fixed
//! `auto_reconnect_wait` sleep between every attempt.

use std::future::Future;
use std::time::Duration;

use crate::bot::AutoReconnectCondition;

/// How one session attempt ended.
#[derive(Debug)]
pub enum SessionError {
    /// The dial itself was refused (pre-connection failure).
    ConnectionRefused,
    /// Anything else: mid-session error, decode failure, etc.
    Other(anyhow::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::ConnectionRefused => write!(f, "connection refused"),
            SessionError::Other(e) => write!(f, "{e}"),
        }
    }
}

/// Policy governing the supervisor's retry behavior.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub auto_reconnect_if: std::collections::HashSet<AutoReconnectCondition>,
    pub auto_reconnect_wait: Duration,
    pub reconnect_count: u32,
}

impl ReconnectPolicy {
    fn allows(&self, condition: AutoReconnectCondition) -> bool {
        self.auto_reconnect_if.contains(&condition)
    }
}

/// Runs `run_session` under the reconnect policy until a session completes
/// without requesting reconnection, or an unrecoverable error propagates.
///
/// `run_session` is invoked once per attempt and must run exactly one
/// connection lifecycle, returning `Ok(should_reconnect)` on a clean
/// termination or `Err(SessionError::ConnectionRefused)` if the dial itself
/// failed.
pub async fn run<F, Fut>(policy: &ReconnectPolicy, mut run_session: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, SessionError>>,
{
    loop {
        let mut attempt = 1u32;
        let should_reconnect = loop {
            match run_session().await {
                Ok(should_reconnect) => break should_reconnect,
                Err(SessionError::ConnectionRefused) => {
                    attempt += 1;
                    if !policy.allows(AutoReconnectCondition::ConnectionLost)
                        || attempt > policy.reconnect_count
                    {
                        anyhow::bail!("connection refused after {attempt} attempts");
                    }
                    log::info!(
                        "connection refused, retrying in {:?} (attempt {attempt})",
                        policy.auto_reconnect_wait
                    );
                    tokio::time::sleep(policy.auto_reconnect_wait).await;
                }
                Err(SessionError::Other(e)) => return Err(e),
            }
        };

        if !should_reconnect {
            return Ok(());
        }
        log::info!("session ended, reconnecting in {:?}", policy.auto_reconnect_wait);
        tokio::time::sleep(policy.auto_reconnect_wait).await;
    }
}
