//! WLAN SME Shared Types
//!
//! This crate provides the identifiers, command kinds, completion status and
//! error taxonomy shared between the command scheduler and the lower layer
//! that executes its requests.

pub mod error;
pub mod state_machine;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use error::{Defect, Fault, SchedulerError};
pub use state_machine::{SessionEvent, SessionState, SessionStateMachine, TransitionResult};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Scheduler limits and defaults
pub mod limits {
    /// Number of command slots allocated at start-up
    pub const DEFAULT_POOL_CAPACITY: usize = 40;

    /// Ceiling on scan requests tracked at once (active + pending)
    pub const DEFAULT_MAX_SCAN_REQUESTS: usize = 8;

    /// Time an active general command may run before it is considered wedged
    pub const DEFAULT_ACTIVE_TIMEOUT_MS: u64 = 30_000;

    /// Timeout monitor tick
    pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 1_000;

    /// Time a session may sit waiting for keys before it is torn down
    pub const DEFAULT_KEY_WAIT_TIMEOUT_MS: u64 = 5_000;

    /// Entries kept in the self-recovery ring
    pub const DEFAULT_RECOVERY_LOG_DEPTH: usize = 16;

    /// General-pending entries dumped when diagnosing a fault
    pub const DEFAULT_DIAG_PENDING_DEPTH: usize = 5;

    /// Largest key material accepted by a set-key request
    pub const MAX_KEY_LEN: usize = 32;

    /// Most SSIDs a single scan request may carry
    pub const MAX_SCAN_SSIDS: usize = 10;

    /// Most channels a single scan request may carry
    pub const MAX_SCAN_CHANNELS: usize = 64;
}

/// 802.11 reason codes used by scheduler-generated disconnects
pub mod reason {
    /// Unspecified reason
    pub const UNSPECIFIED: u16 = 1;

    /// Deauthenticated because the interface is being removed
    pub const DEAUTH_LEAVING: u16 = 3;

    /// 4-way handshake timeout
    pub const KEY_WAIT_TIMEOUT: u16 = 15;
}

/// Identifier of one logical wireless interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u8);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Role a session plays on the shared radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    Station,
    SoftAp,
    P2pClient,
    P2pGo,
}

impl SessionMode {
    /// Infrastructure client roles (connect, roam, TDLS apply)
    pub fn is_client(&self) -> bool {
        matches!(self, SessionMode::Station | SessionMode::P2pClient)
    }

    /// Roles that own a BSS
    pub fn is_ap(&self) -> bool {
        matches!(self, SessionMode::SoftAp | SessionMode::P2pGo)
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Station => write!(f, "STA"),
            SessionMode::SoftAp => write!(f, "SAP"),
            SessionMode::P2pClient => write!(f, "P2P-CLI"),
            SessionMode::P2pGo => write!(f, "P2P-GO"),
        }
    }
}

/// Kind of a management command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Scan,
    Connect,
    Roam,
    Disconnect,
    SetKey,
    AddSession,
    DeleteSession,
    TdlsOp,
    HwModeChange,
}

impl CommandKind {
    /// Scans run on their own lane
    pub fn is_scan(&self) -> bool {
        matches!(self, CommandKind::Scan)
    }

    /// Get the kind name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Scan => "scan",
            CommandKind::Connect => "connect",
            CommandKind::Roam => "roam",
            CommandKind::Disconnect => "disconnect",
            CommandKind::SetKey => "set-key",
            CommandKind::AddSession => "add-session",
            CommandKind::DeleteSession => "delete-session",
            CommandKind::TdlsOp => "tdls",
            CommandKind::HwModeChange => "hw-mode",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The four command queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueId {
    GeneralPending,
    GeneralActive,
    ScanPending,
    ScanActive,
}

impl QueueId {
    /// Queues in purge order
    pub const ALL: [QueueId; 4] = [
        QueueId::GeneralPending,
        QueueId::GeneralActive,
        QueueId::ScanPending,
        QueueId::ScanActive,
    ];

    pub fn is_active(&self) -> bool {
        matches!(self, QueueId::GeneralActive | QueueId::ScanActive)
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueId::GeneralPending => write!(f, "general-pending"),
            QueueId::GeneralActive => write!(f, "general-active"),
            QueueId::ScanPending => write!(f, "scan-pending"),
            QueueId::ScanActive => write!(f, "scan-active"),
        }
    }
}

/// Final status of a command, as reported by the lower layer or the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Operation completed successfully
    Success,
    /// Operation was attempted and failed
    Failed { reason: String },
    /// Operation was refused before reaching the radio
    Rejected { reason: String },
    /// Command was aborted before it completed
    Cancelled,
}

impl CompletionStatus {
    pub fn failed(reason: impl Into<String>) -> Self {
        CompletionStatus::Failed {
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        CompletionStatus::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompletionStatus::Success)
    }
}

/// 48-bit IEEE MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}
