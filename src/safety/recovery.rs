//! Self-recovery ring buffer
//!
//! Written every time a command becomes active and when the timeout
//! monitor fires. Purely diagnostic: nothing reads it to make decisions.

use std::collections::VecDeque;

use wlan_sme_shared::{now_ms, CommandKind, SessionId};

/// Why an entry was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    /// Command moved to an active queue
    Dispatched,
    /// Active general command exceeded its timeout
    ActiveTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryEntry {
    pub kind: CommandKind,
    pub session: SessionId,
    pub reason: ReasonCode,
    pub timestamp_ms: u64,
}

/// Read-only copy of the ring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfRecoveryStats {
    pub capacity: usize,
    /// Entries ever recorded, including overwritten ones
    pub total_recorded: u64,
    /// Oldest first
    pub entries: Vec<RecoveryEntry>,
}

/// Fixed-capacity circular log of recent dispatches
#[derive(Debug)]
pub struct SelfRecoveryLog {
    entries: VecDeque<RecoveryEntry>,
    capacity: usize,
    total_recorded: u64,
}

impl SelfRecoveryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            total_recorded: 0,
        }
    }

    /// Record an entry, overwriting the oldest once full
    pub fn record(&mut self, kind: CommandKind, session: SessionId, reason: ReasonCode) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(RecoveryEntry {
            kind,
            session,
            reason,
            timestamp_ms: now_ms(),
        });
        self.total_recorded += 1;
    }

    pub fn latest(&self) -> Option<&RecoveryEntry> {
        self.entries.back()
    }

    pub fn stats(&self) -> SelfRecoveryStats {
        SelfRecoveryStats {
            capacity: self.capacity,
            total_recorded: self.total_recorded,
            entries: self.entries.iter().copied().collect(),
        }
    }
}
