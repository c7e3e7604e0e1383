//! The prayer bot: owns one game-session lifecycle from the moment the
//! transport is up until a termination condition is signaled.
//!
//! The state machine is deliberately synchronous and side-effect-free with
//! respect to I/O: `handle_packet` and the timer callbacks return the
//! packets to send and never touch the socket themselves. [`crate::runner`]
//! drives the actual I/O and timers around it.

use std::collections::HashSet;

use md5::{Digest, Md5};
use thiserror::Error;

use crate::protocol::game::{GamePacket, COMPANY_SPECTATOR, MAX_COMPANIES};
use crate::saveload::{find_company_by_name, SaveloadBuffer};
use crate::wire::WireError;

/// `DAY_TICKS`: the frame-count step between successive ACKs, per the OpenTTD
/// tick rate.
const DAY_TICKS: u32 = 74;

/// Errors the bot itself can raise, distinct from a signaled reconnect
/// condition (which is not an error — it is a normal, if sometimes
/// unwanted, termination).
#[derive(Debug, Error)]
pub enum BotError {
    /// A packet failed to decode.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The configuration named a company password requirement that no
    /// password was supplied for, discovered this far into the session.
    ///
    /// Reserved for a case `spec.md` never actually reaches (the server
    /// password is always sent unconditionally per §4.7); kept only because
    /// the error taxonomy names it.
    #[error("no server password configured")]
    NoServerPassword,
}

/// `NetworkErrorCode`: the numeric codes carried by `SERVER_ERROR` and
/// `SERVER_ERROR_QUIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs, reason = "enumerator names are the documentation here")]
pub enum NetworkErrorCode {
    General = 0,
    Desync = 1,
    SavegameFailed = 2,
    ConnectionLost = 3,
    IllegalPacket = 4,
    NewgrfMismatch = 5,
    NotAuthorized = 6,
    NotExpected = 7,
    WrongRevision = 8,
    NameInUse = 9,
    WrongPassword = 10,
    CompanyMismatch = 11,
    Kicked = 12,
    Cheater = 13,
    Full = 14,
    TooManyCommands = 15,
    TimeoutPassword = 16,
    TimeoutComputer = 17,
    TimeoutMap = 18,
    TimeoutJoin = 19,
    InvalidClientName = 20,
    End = 21,
}

impl NetworkErrorCode {
    /// Looks up the enumerator name for a raw code, for logging.
    pub fn name(code: u8) -> &'static str {
        match code {
            0 => "GENERAL",
            1 => "DESYNC",
            2 => "SAVEGAME_FAILED",
            3 => "CONNECTION_LOST",
            4 => "ILLEGAL_PACKET",
            5 => "NEWGRF_MISMATCH",
            6 => "NOT_AUTHORIZED",
            7 => "NOT_EXPECTED",
            8 => "WRONG_REVISION",
            9 => "NAME_IN_USE",
            10 => "WRONG_PASSWORD",
            11 => "COMPANY_MISMATCH",
            12 => "KICKED",
            13 => "CHEATER",
            14 => "FULL",
            15 => "TOO_MANY_COMMANDS",
            16 => "TIMEOUT_PASSWORD",
            17 => "TIMEOUT_COMPUTER",
            18 => "TIMEOUT_MAP",
            19 => "TIMEOUT_JOIN",
            20 => "INVALID_CLIENT_NAME",
            21 => "END",
            _ => "INVALID",
        }
    }
}

/// `AutoReconnectCondition`: the set of termination conditions the config
/// can opt into reconnecting for.
///
/// `None` is a sentinel meaning "reconnect under no condition" — it is never
/// itself the condition passed to [`PrayerBot::reconnect_if`], so it must
/// never match a real termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs, reason = "enumerator names are the documentation here")]
pub enum AutoReconnectCondition {
    None,
    Unhandled,
    ConnectionLost,
    Kicked,
    ServerFull,
    WrongGamePassword,
    CompanyNotFound,
    CannotMove,
    ServerShuttingDown,
    Banned,
    ServerRestarting,
    WrongRevision,
}

/// Identity and session constants issued on `SERVER_WELCOME`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProperties {
    /// This client's id for the session.
    pub client_id: u32,
    /// Per-session seed used for company password hashing.
    pub game_seed: u32,
    /// Server identity string, used for company password hashing.
    pub server_id: String,
}

/// `(client_id, company_id)`, the parameter pair threaded through every
/// player-movement-relevant packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerMovement {
    /// Client the update is about.
    pub client_id: u32,
    /// That client's current company, or [`COMPANY_SPECTATOR`].
    pub company_id: u8,
}

/// Which company the bot targets: a fixed id, or a name to be resolved
/// against the `PLYR` savegame chunk once the map arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyTarget {
    /// Join this company id directly.
    Id(u8),
    /// Resolve to a company id by matching this name against the `PLYR`
    /// savegame chunk once the map arrives.
    Name(Vec<u8>),
}

/// Static configuration the bot consumes for the session; owned by the
/// caller and handed in at construction.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Name the bot joins under.
    pub player_name: String,
    /// `None` until learned via `CLIENT_GAME_INFO`/`SERVER_GAME_INFO`.
    pub network_revision: Option<String>,
    /// Client revision major version, used to build `newgrf_version`.
    pub revision_major: u8,
    /// Client revision minor version, used to build `newgrf_version`.
    pub revision_minor: u8,
    /// Whether this revision is a stable release.
    pub revision_stable: bool,
    /// Server (not company) password, sent on `SERVER_NEED_GAME_PASSWORD`.
    pub server_password: Option<String>,
    /// Plaintext company password; hashed before being sent.
    pub company_password: Option<String>,
    /// Which company to join.
    pub company_target: CompanyTarget,
    /// Move to spectator if the last other player leaves the company.
    pub spectate_if_alone: bool,
    /// Conditions under which the reconnect supervisor should retry.
    pub auto_reconnect_if: HashSet<AutoReconnectCondition>,
}

/// The five states of one game session, per `spec.md` §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    /// Waiting out the one-second ban-check window.
    Opening,
    /// Negotiating revision (if needed) and sending `CLIENT_JOIN`.
    Joining,
    /// NewGRF check and password handshakes, up to `SERVER_WELCOME`.
    Handshaking,
    /// Downloading and decoding the savegame.
    MapTransfer,
    /// Acknowledging frames and handling company movement.
    InGame,
}

/// Requests the state machine makes of its driver: send a packet, start or
/// cancel a timer, or terminate the session.
#[derive(Debug, Clone, PartialEq)]
pub enum BotAction {
    /// Send this packet to the server.
    Send(GamePacket),
    /// Start the one-second ban-check timer.
    StartBanCheckTimer,
    /// Cancel the ban-check timer, if running.
    CancelBanCheckTimer,
    /// Start the one-second confirm-move timer.
    StartConfirmMoveTimer,
    /// Cancel the confirm-move timer, if running.
    CancelConfirmMoveTimer,
    /// The savegame buffer for the just-finished map transfer is about to
    /// be freed; if `bot.saveload_dump_file` is configured, write
    /// [`PrayerBot::last_savegame_bytes`] to it now.
    DumpSaveload,
    /// Terminate the session. `should_reconnect` is already folded in.
    Terminate,
}

/// One game session's worth of state.
#[derive(Debug)]
pub struct PrayerBot {
    config: BotConfig,
    state: BotState,
    own_client_id: Option<u32>,
    server_properties: Option<ServerProperties>,
    target_company_id: Option<u8>,
    frame_counter: u32,
    last_ack_frame: u32,
    token: Option<u8>,
    ready_to_play: bool,
    is_playing: bool,
    other_clients_playing: HashSet<u32>,
    confirm_move_pending: bool,
    was_game_password_sent: bool,
    saveload_buffer: Option<SaveloadBuffer>,
    /// Raw (possibly compressed) savegame bytes retained for
    /// `saveload_dump_file`, set right before the buffer is consumed.
    last_savegame_bytes: Option<Vec<u8>>,
    pub should_reconnect: bool,
    terminated: bool,
}

impl PrayerBot {
    /// Builds a fresh bot for a new session. Call [`PrayerBot::opened`] once
    /// the transport is up to schedule the ban-check timer.
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            state: BotState::Opening,
            own_client_id: None,
            server_properties: None,
            target_company_id: None,
            frame_counter: 0,
            last_ack_frame: 0,
            token: None,
            ready_to_play: false,
            is_playing: false,
            other_clients_playing: HashSet::new(),
            confirm_move_pending: false,
            was_game_password_sent: false,
            saveload_buffer: None,
            last_savegame_bytes: None,
            should_reconnect: false,
            terminated: false,
        }
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Raw bytes of the most recently decoded savegame transfer, for the
    /// optional `saveload_dump_file` debugging aid. `None` before the first
    /// map transfer completes.
    pub fn last_savegame_bytes(&self) -> Option<&[u8]> {
        self.last_savegame_bytes.as_deref()
    }

    /// Transport is up: schedule the one-second ban-check timer.
    pub fn opened(&mut self) -> Vec<BotAction> {
        vec![BotAction::StartBanCheckTimer]
    }

    /// The ban-check timer fired without a ban/full/close: transition to
    /// **Joining** and send whatever the join sequence requires.
    pub fn ban_check_timer_fired(&mut self) -> Vec<BotAction> {
        self.state = BotState::Joining;
        let mut actions = vec![BotAction::CancelBanCheckTimer];
        if self.config.network_revision.is_none() {
            actions.push(BotAction::Send(GamePacket::ClientGameInfo));
        } else {
            actions.push(self.send_client_join());
        }
        actions
    }

    /// The one-second confirm-move timer fired without `is_playing` becoming
    /// true: signal `CANNOT_MOVE`.
    pub fn confirm_move_timer_fired(&mut self) -> Vec<BotAction> {
        self.confirm_move_pending = false;
        if self.is_playing {
            return Vec::new();
        }
        self.reconnect_if(AutoReconnectCondition::CannotMove)
    }

    /// Sends `CLIENT_JOIN` and transitions to **Handshaking**, per `spec.md`
    /// §4.7 state 3 (NewGRF check and password handshakes, up to
    /// `SERVER_WELCOME`).
    fn send_client_join(&mut self) -> BotAction {
        let revision = self
            .config
            .network_revision
            .clone()
            .unwrap_or_default();
        let newgrf_version = ((u32::from(self.config.revision_major) + 16) << 24)
            | (u32::from(self.config.revision_minor) << 20)
            | (u32::from(self.config.revision_stable) << 19)
            | 28004;
        self.state = BotState::Handshaking;
        BotAction::Send(GamePacket::ClientJoin {
            revision,
            newgrf_version,
            name: self.config.player_name.clone(),
            playas: COMPANY_SPECTATOR,
        })
    }

    /// Handles one decoded inbound packet, returning the actions the driver
    /// should perform.
    pub fn handle_packet(&mut self, packet: GamePacket) -> Result<Vec<BotAction>, BotError> {
        match packet {
            GamePacket::ServerBanned | GamePacket::ServerFull => {
                Ok(self.reconnect_if(AutoReconnectCondition::Banned))
            }
            GamePacket::ServerGameInfo { revision } => {
                self.config.network_revision = Some(revision);
                Ok(vec![self.send_client_join()])
            }
            GamePacket::ServerCheckNewgrfs => Ok(vec![BotAction::Send(
                GamePacket::ClientNewgrfsChecked,
            )]),
            GamePacket::ServerNeedGamePassword => {
                if self.was_game_password_sent {
                    return Ok(self.reconnect_if(AutoReconnectCondition::WrongGamePassword));
                }
                match &self.config.server_password {
                    None => Ok(self.reconnect_if(AutoReconnectCondition::WrongGamePassword)),
                    Some(password) => {
                        self.was_game_password_sent = true;
                        Ok(vec![BotAction::Send(GamePacket::ClientGamePassword {
                            password: password.clone(),
                        })])
                    }
                }
            }
            GamePacket::ServerWelcome {
                client_id,
                game_seed,
                server_id,
            } => {
                self.own_client_id = Some(client_id);
                self.server_properties = Some(ServerProperties {
                    client_id,
                    game_seed,
                    server_id,
                });
                self.state = BotState::MapTransfer;
                Ok(vec![BotAction::Send(GamePacket::ClientGetMap)])
            }
            GamePacket::ServerMapBegin { frame } => {
                self.frame_counter = frame;
                if self.target_company_id.is_none() {
                    self.saveload_buffer = Some(SaveloadBuffer::new());
                }
                Ok(Vec::new())
            }
            GamePacket::ServerMapData { data } => {
                if let Some(buffer) = self.saveload_buffer.as_mut() {
                    buffer.append(&data);
                }
                Ok(Vec::new())
            }
            GamePacket::ServerMapDone => {
                let mut actions = Vec::new();
                if let Some(buffer) = self.saveload_buffer.take() {
                    self.last_savegame_bytes = Some(buffer.as_bytes().to_vec());
                    actions.push(BotAction::DumpSaveload);
                    let savegame = buffer.decode()?;
                    match &self.config.company_target {
                        CompanyTarget::Id(id) => self.target_company_id = Some(*id),
                        CompanyTarget::Name(name) => {
                            match find_company_by_name(&savegame, name) {
                                Some(id) => self.target_company_id = Some(id),
                                None => {
                                    actions.extend(
                                        self.reconnect_if(AutoReconnectCondition::CompanyNotFound),
                                    );
                                    return Ok(actions);
                                }
                            }
                        }
                    }
                }
                self.ready_to_play = true;
                self.state = BotState::InGame;
                actions.push(BotAction::Send(GamePacket::ClientMapOk));
                Ok(actions)
            }
            GamePacket::ServerFrame {
                frame_counter_server,
                frame_counter_max,
                token,
            } => {
                if let Some(t) = token {
                    self.token = Some(t);
                }
                self.frame_counter = self.frame_counter.max(frame_counter_server).max(frame_counter_max);
                if self.last_ack_frame < self.frame_counter {
                    self.last_ack_frame = self.frame_counter + DAY_TICKS;
                    let token = self.token.unwrap_or(0);
                    Ok(vec![BotAction::Send(GamePacket::ClientAck {
                        frame: self.frame_counter,
                        token,
                    })])
                } else {
                    Ok(Vec::new())
                }
            }
            GamePacket::ServerClientInfo { client_id, playas } => {
                Ok(self.player_movement(PlayerMovement {
                    client_id,
                    company_id: playas,
                }))
            }
            GamePacket::ServerMove {
                client_id,
                company_id,
            } => Ok(self.player_movement(PlayerMovement {
                client_id,
                company_id,
            })),
            GamePacket::ServerQuit { client_id } => Ok(self.player_movement(PlayerMovement {
                client_id,
                company_id: COMPANY_SPECTATOR,
            })),
            GamePacket::ServerErrorQuit { client_id } => {
                Ok(self.player_movement(PlayerMovement {
                    client_id,
                    company_id: COMPANY_SPECTATOR,
                }))
            }
            GamePacket::ServerError {
                error_code,
                error_str,
            } => {
                log::error!(
                    "server error {error_code} ({}): {}",
                    NetworkErrorCode::name(error_code),
                    error_str.as_deref().unwrap_or("no details provided")
                );
                let condition = match error_code {
                    c if c == NetworkErrorCode::WrongPassword as u8 => {
                        AutoReconnectCondition::WrongGamePassword
                    }
                    c if c == NetworkErrorCode::Kicked as u8 => AutoReconnectCondition::Kicked,
                    c if c == NetworkErrorCode::WrongRevision as u8 => {
                        AutoReconnectCondition::WrongRevision
                    }
                    _ => AutoReconnectCondition::Unhandled,
                };
                Ok(self.reconnect_if(condition))
            }
            GamePacket::ServerNewGame => Ok(self.reconnect_if(AutoReconnectCondition::ServerRestarting)),
            GamePacket::ServerShutdown => {
                Ok(self.reconnect_if(AutoReconnectCondition::ServerShuttingDown))
            }
            // Informational packets with no state-machine effect.
            GamePacket::ServerWait { .. }
            | GamePacket::ServerMapSize
            | GamePacket::ServerJoin
            | GamePacket::ServerSync
            | GamePacket::ServerCommand
            | GamePacket::ServerChat
            | GamePacket::ServerExternalChat
            | GamePacket::ServerCompanyUpdate
            | GamePacket::ServerConfigUpdate => Ok(Vec::new()),
            // Never received by this client.
            GamePacket::ClientJoin { .. }
            | GamePacket::ClientGameInfo
            | GamePacket::ClientNewgrfsChecked
            | GamePacket::ClientGamePassword { .. }
            | GamePacket::ClientGetMap
            | GamePacket::ClientMapOk
            | GamePacket::ClientAck { .. }
            | GamePacket::ClientMove { .. } => Ok(Vec::new()),
        }
    }

    /// Player-movement handler, shared by `SERVER_CLIENT_INFO`, `SERVER_MOVE`,
    /// `SERVER_QUIT`, `SERVER_ERROR_QUIT`, per `spec.md` §4.7.
    fn player_movement(&mut self, movement: PlayerMovement) -> Vec<BotAction> {
        if Some(movement.client_id) == self.own_client_id {
            self.is_playing = Some(movement.company_id) == self.target_company_id;
            self.join_company()
        } else if movement.company_id <= MAX_COMPANIES {
            self.other_clients_playing.insert(movement.client_id);
            self.join_company()
        } else {
            self.other_clients_playing.remove(&movement.client_id);
            if self.ready_to_play
                && self.is_playing
                && self.other_clients_playing.is_empty()
                && self.config.spectate_if_alone
            {
                vec![BotAction::Send(GamePacket::ClientMove {
                    company_id: COMPANY_SPECTATOR,
                    hashed_password: String::new(),
                })]
            } else {
                Vec::new()
            }
        }
    }

    /// Join-company handler, per `spec.md` §4.7.
    fn join_company(&mut self) -> Vec<BotAction> {
        if !self.ready_to_play {
            return Vec::new();
        }
        if self.is_playing {
            if self.confirm_move_pending {
                self.confirm_move_pending = false;
                return vec![BotAction::CancelConfirmMoveTimer];
            }
            return Vec::new();
        }
        let should_attempt = !self.confirm_move_pending
            && (!self.config.spectate_if_alone || !self.other_clients_playing.is_empty());
        if !should_attempt {
            return Vec::new();
        }
        let Some(target) = self.target_company_id else {
            return Vec::new();
        };
        self.confirm_move_pending = true;
        vec![
            BotAction::Send(GamePacket::ClientMove {
                company_id: target,
                hashed_password: self.company_password_hash(),
            }),
            BotAction::StartConfirmMoveTimer,
        ]
    }

    /// Company password hash, per `spec.md` §4.7: a 32-byte salted buffer,
    /// MD5'd, emitted as **uppercase** hex (upstream `GenerateCompanyPasswordHash`;
    /// an older implementation emitted lowercase — not replicated here).
    fn company_password_hash(&self) -> String {
        let Some(password) = self.config.company_password.as_deref().filter(|p| !p.is_empty())
        else {
            return String::new();
        };
        let server_id = self
            .server_properties
            .as_ref()
            .map(|p| p.server_id.as_bytes())
            .unwrap_or(&[]);
        let game_seed = self.server_properties.as_ref().map_or(0, |p| p.game_seed);

        let password_bytes = password.as_bytes();
        let mut salted = [0u8; 32];
        for (i, slot) in salted.iter_mut().enumerate() {
            let pw_byte = password_bytes.get(i).copied().unwrap_or(0);
            let server_byte = server_id.get(i).copied().unwrap_or(0);
            let seed_byte = ((game_seed >> (i % 32)) & 0xFF) as u8;
            *slot = pw_byte ^ server_byte ^ seed_byte;
        }

        let digest = Md5::digest(salted);
        digest.iter().map(|b| format!("{b:02X}")).collect()
    }

    /// Records whether `condition` is in the configured `auto_reconnect_if`
    /// set, cancels any running timers, and terminates the session.
    fn reconnect_if(&mut self, condition: AutoReconnectCondition) -> Vec<BotAction> {
        self.should_reconnect = self.config.auto_reconnect_if.contains(&condition);
        self.terminated = true;
        let mut actions = vec![BotAction::CancelBanCheckTimer];
        if self.confirm_move_pending {
            self.confirm_move_pending = false;
            actions.push(BotAction::CancelConfirmMoveTimer);
        }
        actions.push(BotAction::Terminate);
        actions
    }

    /// Called by the runner when the connection drops mid-session: treated
    /// as `CONNECTION_LOST` per `spec.md` §7.
    pub fn connection_lost(&mut self) -> Vec<BotAction> {
        self.reconnect_if(AutoReconnectCondition::ConnectionLost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(auto_reconnect_if: &[AutoReconnectCondition]) -> BotConfig {
        BotConfig {
            player_name: "prayer".to_string(),
            network_revision: Some("14.1".to_string()),
            revision_major: 14,
            revision_minor: 1,
            revision_stable: true,
            server_password: None,
            company_password: None,
            company_target: CompanyTarget::Id(0),
            spectate_if_alone: true,
            auto_reconnect_if: auto_reconnect_if.iter().copied().collect(),
        }
    }

    #[test]
    fn company_password_hash_matches_testable_property() {
        // password="p", server_id="s", game_seed=0: digest equals
        // uppercase(md5(buffer with byte 0 = 'p' ^ 's', rest zero)).
        let mut bot = PrayerBot::new(BotConfig {
            company_password: Some("p".to_string()),
            ..config(&[])
        });
        bot.server_properties = Some(ServerProperties {
            client_id: 0,
            game_seed: 0,
            server_id: "s".to_string(),
        });
        let mut expected_buf = [0u8; 32];
        expected_buf[0] = b'p' ^ b's';
        let expected: String = Md5::digest(expected_buf)
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect();
        assert_eq!(bot.company_password_hash(), expected);
    }

    #[test]
    fn empty_company_password_yields_empty_hash() {
        let bot = PrayerBot::new(config(&[]));
        assert_eq!(bot.company_password_hash(), "");
    }

    #[test]
    fn ban_check_timer_without_revision_queries_game_info() {
        let mut cfg = config(&[]);
        cfg.network_revision = None;
        let mut bot = PrayerBot::new(cfg);
        let actions = bot.ban_check_timer_fired();
        assert_eq!(bot.state(), BotState::Joining);
        assert!(actions.contains(&BotAction::Send(GamePacket::ClientGameInfo)));
    }

    #[test]
    fn ban_check_timer_with_revision_sends_join_directly() {
        let mut bot = PrayerBot::new(config(&[]));
        let actions = bot.ban_check_timer_fired();
        assert!(actions
            .iter()
            .any(|a| matches!(a, BotAction::Send(GamePacket::ClientJoin { .. }))));
        assert_eq!(bot.state(), BotState::Handshaking);
    }

    #[test]
    fn queried_revision_also_enters_handshaking() {
        let mut cfg = config(&[]);
        cfg.network_revision = None;
        let mut bot = PrayerBot::new(cfg);
        bot.ban_check_timer_fired();
        assert_eq!(bot.state(), BotState::Joining);
        bot.handle_packet(GamePacket::ServerGameInfo {
            revision: "14.1".to_string(),
        })
        .unwrap();
        assert_eq!(bot.state(), BotState::Handshaking);
    }

    #[test]
    fn ack_monotonicity_increases_by_at_least_day_ticks() {
        let mut bot = PrayerBot::new(config(&[]));
        bot.ready_to_play = true;
        let actions = bot
            .handle_packet(GamePacket::ServerFrame {
                frame_counter_server: 100,
                frame_counter_max: 100,
                token: Some(5),
            })
            .unwrap();
        assert_eq!(
            actions,
            vec![BotAction::Send(GamePacket::ClientAck { frame: 100, token: 5 })]
        );
        assert_eq!(bot.last_ack_frame, 174);

        // A second frame below last_ack_frame produces no ack.
        let actions = bot
            .handle_packet(GamePacket::ServerFrame {
                frame_counter_server: 120,
                frame_counter_max: 120,
                token: Some(5),
            })
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn spectate_if_alone_emits_single_move_to_spectator() {
        let mut bot = PrayerBot::new(config(&[]));
        bot.own_client_id = Some(7);
        bot.target_company_id = Some(0);
        bot.ready_to_play = true;
        bot.is_playing = true;
        bot.other_clients_playing.insert(99);

        // The only other player leaves their company.
        let actions = bot.player_movement(PlayerMovement {
            client_id: 99,
            company_id: COMPANY_SPECTATOR,
        });
        assert_eq!(
            actions,
            vec![BotAction::Send(GamePacket::ClientMove {
                company_id: COMPANY_SPECTATOR,
                hashed_password: String::new(),
            })]
        );
    }

    #[test]
    fn join_company_schedules_confirm_move_timer() {
        let mut bot = PrayerBot::new(config(&[]));
        bot.ready_to_play = true;
        bot.target_company_id = Some(0);
        bot.config.spectate_if_alone = false;
        let actions = bot.join_company();
        assert!(actions
            .iter()
            .any(|a| matches!(a, BotAction::Send(GamePacket::ClientMove { .. }))));
        assert!(actions.contains(&BotAction::StartConfirmMoveTimer));
        assert!(bot.confirm_move_pending);
    }

    #[test]
    fn confirm_move_timeout_signals_cannot_move() {
        let mut bot = PrayerBot::new(config(&[AutoReconnectCondition::CannotMove]));
        bot.ready_to_play = true;
        bot.target_company_id = Some(0);
        bot.config.spectate_if_alone = false;
        bot.join_company();
        let actions = bot.confirm_move_timer_fired();
        assert!(actions.contains(&BotAction::Terminate));
        assert!(bot.should_reconnect);
    }

    #[test]
    fn server_error_classification_maps_known_codes() {
        let mut bot = PrayerBot::new(config(&[AutoReconnectCondition::WrongGamePassword]));
        let actions = bot
            .handle_packet(GamePacket::ServerError {
                error_code: NetworkErrorCode::WrongPassword as u8,
                error_str: Some("nope".to_string()),
            })
            .unwrap();
        assert!(actions.contains(&BotAction::Terminate));
        assert!(bot.should_reconnect);
    }

    #[test]
    fn server_error_unknown_code_is_unhandled_and_not_reconnected_by_default() {
        let mut bot = PrayerBot::new(config(&[]));
        let actions = bot
            .handle_packet(GamePacket::ServerError {
                error_code: 99,
                error_str: None,
            })
            .unwrap();
        assert!(actions.contains(&BotAction::Terminate));
        assert!(!bot.should_reconnect);
    }

    #[test]
    fn none_condition_never_matches_a_real_termination() {
        let mut bot = PrayerBot::new(config(&[AutoReconnectCondition::None]));
        let actions = bot
            .handle_packet(GamePacket::ServerError {
                error_code: NetworkErrorCode::Kicked as u8,
                error_str: None,
            })
            .unwrap();
        assert!(actions.contains(&BotAction::Terminate));
        assert!(!bot.should_reconnect);
    }

    #[test]
    fn company_not_found_signals_when_name_lookup_fails() {
        let mut cfg = config(&[AutoReconnectCondition::CompanyNotFound]);
        cfg.company_target = CompanyTarget::Name(b"Nope".to_vec());
        let mut bot = PrayerBot::new(cfg);
        bot.saveload_buffer = Some(SaveloadBuffer::new());
        // An OTTN container with no PLYR chunk.
        let mut data = Vec::new();
        data.extend_from_slice(b"OTTN");
        data.extend_from_slice(&296u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&[0, 0, 0, 0]);
        bot.saveload_buffer.as_mut().unwrap().append(&data);

        let actions = bot.handle_packet(GamePacket::ServerMapDone).unwrap();
        assert!(actions.contains(&BotAction::Terminate));
        assert!(bot.should_reconnect);
    }
}
