//! Scheduler error taxonomy
//!
//! Producer-facing errors are returned synchronously. Defects mark a
//! violated invariant and are never tolerated silently; `Fault` is the
//! unrecoverable escalation handed to the host.

use thiserror::Error;

use crate::{CommandKind, QueueId, SessionId};

/// Errors returned by scheduler operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Command pool exhausted: all {capacity} slots in use")]
    PoolExhausted { capacity: usize },

    #[error("Scan ceiling reached: {limit} scan requests already tracked")]
    ScanCeilingReached { limit: usize },

    #[error("Stale command handle: slot {slot} generation {generation}")]
    StaleHandle { slot: usize, generation: u64 },

    #[error("Command in slot {slot} already finished")]
    AlreadyFinished { slot: usize },

    #[error("Invariant violated: {0}")]
    Defect(#[from] Defect),

    #[error("Scheduler is shut down")]
    ShutDown,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SchedulerError {
    /// Pool exhaustion and defects indicate a leak or a broken invariant
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::PoolExhausted { .. } | SchedulerError::Defect(_)
        )
    }
}

/// Programming defects detected by the pool and queues
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Defect {
    #[error("slot {slot} released while still linked into {queue}")]
    StillLinked { slot: usize, queue: QueueId },

    #[error("slot {slot} released twice")]
    DoubleRelease { slot: usize },

    #[error("command in slot {slot} aborted twice")]
    DoubleAbort { slot: usize },

    #[error("slot {slot} is not linked into any queue")]
    NotLinked { slot: usize },

    #[error("queue bookkeeping corrupted: {0}")]
    Corrupted(String),
}

/// Unrecoverable conditions escalated to the host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("{kind} on {session} wedged for {elapsed_ms}ms")]
    WedgedCommand {
        kind: CommandKind,
        session: SessionId,
        elapsed_ms: u64,
    },

    #[error("scheduler defect: {0}")]
    Defect(Defect),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SchedulerError::PoolExhausted { capacity: 4 }.is_fatal());
        assert!(SchedulerError::Defect(Defect::DoubleAbort { slot: 1 }).is_fatal());
        assert!(!SchedulerError::ScanCeilingReached { limit: 8 }.is_fatal());
        assert!(!SchedulerError::ShutDown.is_fatal());
        assert!(!SchedulerError::AlreadyFinished { slot: 1 }.is_fatal());
    }

    #[test]
    fn test_defect_message() {
        let err: SchedulerError = Defect::StillLinked {
            slot: 3,
            queue: QueueId::GeneralActive,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Invariant violated: slot 3 released while still linked into general-active"
        );
    }

    #[test]
    fn test_fault_message() {
        let fault = Fault::WedgedCommand {
            kind: CommandKind::Roam,
            session: SessionId(1),
            elapsed_ms: 31_000,
        };
        assert_eq!(fault.to_string(), "roam on session#1 wedged for 31000ms");
    }
}
