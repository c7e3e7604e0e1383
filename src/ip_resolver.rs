//! Drives a coordinator-protocol conversation to resolve an invite code to
//! a direct `host:port`.

use anyhow::{bail, Result};

use crate::protocol::coordinator::CoordinatorPacket;

/// Remote server address, as resolved either directly from config or via
/// the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServer {
    /// Host to dial. May be a bracketed IPv6 literal as received from the
    /// coordinator; callers dialing a socket must strip the brackets.
    pub host: String,
    /// Port to dial.
    pub port: u16,
}

/// Outcome of feeding one coordinator packet to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Still waiting; no terminal packet seen yet.
    Pending,
    /// The coordinator resolved the invite code to `remote_server`.
    Resolved(RemoteServer),
}

/// State machine for the invite-code-to-address resolution conversation.
///
/// One instance is used per coordinator TCP session (see `spec.md` §4.5 and
/// §5 — the coordinator resolve and the subsequent game session run
/// sequentially, never concurrently).
#[derive(Debug)]
pub struct IpResolver {
    invite_code: String,
    remote_server: Option<RemoteServer>,
}

impl IpResolver {
    /// Creates a resolver for `invite_code`.
    pub fn new(invite_code: impl Into<String>) -> Self {
        Self {
            invite_code: invite_code.into(),
            remote_server: None,
        }
    }

    /// The outbound packet to send immediately after the transport is up.
    pub fn initial_packet(&self) -> CoordinatorPacket {
        CoordinatorPacket::client_connect(self.invite_code.clone())
    }

    /// The resolved address, if resolution has completed.
    pub fn remote_server(&self) -> Option<&RemoteServer> {
        self.remote_server.as_ref()
    }

    /// Feeds one inbound coordinator packet and reports what happened.
    ///
    /// # Errors
    ///
    /// Returns an error ("cannot retrieve server IP") on `GC_ERROR`,
    /// `GC_CONNECT_FAILED`, or `GC_STUN_REQUEST` (STUN is not implemented).
    pub fn handle_packet(&mut self, packet: CoordinatorPacket) -> Result<ResolveOutcome> {
        match packet {
            CoordinatorPacket::GcError {
                error_code,
                error_str,
            } => {
                log::error!("Received server error {error_code}: {error_str}");
                bail!("cannot retrieve server IP");
            }
            CoordinatorPacket::GcConnecting { .. } => Ok(ResolveOutcome::Pending),
            CoordinatorPacket::GcConnectFailed { .. } => {
                bail!("cannot retrieve server IP");
            }
            CoordinatorPacket::GcDirectConnect { host, port, .. } => {
                let remote_server = RemoteServer { host, port };
                self.remote_server = Some(remote_server.clone());
                Ok(ResolveOutcome::Resolved(remote_server))
            }
            CoordinatorPacket::GcStunRequest { .. } => {
                log::error!("NOT IMPLEMENTED: cannot make STUN request");
                bail!("cannot retrieve server IP");
            }
            CoordinatorPacket::ClientConnect { .. } => Ok(ResolveOutcome::Pending),
        }
    }
}
