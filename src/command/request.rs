//! Command objects and the producer-facing ticket

use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;
use wlan_sme_shared::{CommandKind, CompletionStatus, MacAddr, SessionId, SessionMode};

/// Identity of one use of a pool slot
///
/// The generation is bumped every time the slot is handed out, so a handle
/// kept past its command's completion no longer matches anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandHandle {
    pub(crate) slot: usize,
    pub(crate) generation: u64,
}

impl CommandHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd[{}/{}]", self.slot, self.generation)
    }
}

/// Scan request parameters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanRequest {
    /// SSIDs to probe for; empty means wildcard
    pub ssids: Vec<String>,
    /// Channels to visit; empty means all allowed channels
    pub channels: Vec<u16>,
    pub passive: bool,
    pub dwell_time_ms: u32,
}

/// Connect request parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub ssid: String,
    pub bssid: Option<MacAddr>,
    pub channel: u16,
    /// Link needs a key exchange after association
    pub secured: bool,
}

/// Roam (reassociation) request parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoamRequest {
    pub bssid: MacAddr,
    pub channel: u16,
    pub secured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectRequest {
    /// 802.11 reason code sent to the peer
    pub reason: u16,
}

/// Key installation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest {
    pub key_index: u8,
    pub pairwise: bool,
    pub peer: MacAddr,
    pub key: Vec<u8>,
    /// Installing this key finishes the key exchange
    pub completes_handshake: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSessionRequest {
    pub mode: SessionMode,
    pub mac: MacAddr,
}

/// TDLS link operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TdlsAction {
    Discover,
    Setup,
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdlsRequest {
    pub peer: MacAddr,
    pub action: TdlsAction,
}

/// Radio MAC layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwMode {
    SingleMac,
    /// Dual band simultaneous
    DualMacDbs,
    /// Single band simultaneous
    DualMacSbs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwModeRequest {
    pub mode: HwMode,
}

/// Kind-specific command parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPayload {
    Scan(ScanRequest),
    Connect(ConnectRequest),
    Roam(RoamRequest),
    Disconnect(DisconnectRequest),
    SetKey(KeyRequest),
    AddSession(AddSessionRequest),
    DeleteSession,
    TdlsOp(TdlsRequest),
    HwModeChange(HwModeRequest),
}

impl CommandPayload {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandPayload::Scan(_) => CommandKind::Scan,
            CommandPayload::Connect(_) => CommandKind::Connect,
            CommandPayload::Roam(_) => CommandKind::Roam,
            CommandPayload::Disconnect(_) => CommandKind::Disconnect,
            CommandPayload::SetKey(_) => CommandKind::SetKey,
            CommandPayload::AddSession(_) => CommandKind::AddSession,
            CommandPayload::DeleteSession => CommandKind::DeleteSession,
            CommandPayload::TdlsOp(_) => CommandKind::TdlsOp,
            CommandPayload::HwModeChange(_) => CommandKind::HwModeChange,
        }
    }
}

/// A single management operation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub session: SessionId,
    pub payload: CommandPayload,
    /// Why the command was issued; logged with diagnostics
    pub reason_code: u16,
    /// Generated by the scheduler rather than a producer
    pub synthesized: bool,
}

impl Command {
    pub fn new(session: SessionId, payload: CommandPayload) -> Self {
        let reason_code = match &payload {
            CommandPayload::Disconnect(d) => d.reason,
            _ => 0,
        };

        Self {
            kind: payload.kind(),
            session,
            payload,
            reason_code,
            synthesized: false,
        }
    }

    pub fn with_reason(mut self, reason_code: u16) -> Self {
        self.reason_code = reason_code;
        self
    }

    /// Disconnect issued by the scheduler itself
    pub(crate) fn forced_disconnect(session: SessionId, reason: u16) -> Self {
        Self {
            synthesized: true,
            ..Self::new(session, CommandPayload::Disconnect(DisconnectRequest { reason }))
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} reason={}", self.kind, self.session, self.reason_code)
    }
}

/// Result delivered to the producer through its completion channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub handle: CommandHandle,
    pub kind: CommandKind,
    pub session: SessionId,
    pub status: CompletionStatus,
    /// Time from enqueue to completion
    pub elapsed: Duration,
}

/// Where a command stood when `enqueue` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Queued, possibly deferred behind another command
    Pending,
    /// Dispatched to the lower layer, awaiting completion
    Active,
    /// Already completed (the handler finished it synchronously)
    Finished,
}

/// Returned to the producer by `enqueue`
#[derive(Debug)]
pub struct Ticket {
    pub handle: CommandHandle,
    pub disposition: Disposition,
    /// Resolves exactly once with the command's outcome
    pub completion: oneshot::Receiver<CommandOutcome>,
}
