//! Scan lane
//!
//! Scans bypass the general queue. Any number may be active as long as no
//! two belong to the same session; the head of Scan-Pending waits (and holds
//! everyone behind it) while its session already has one running.

use tracing::{debug, warn};
use wlan_sme_shared::{QueueId, SchedulerError};

use super::state::{Job, SchedulerState};

impl SchedulerState {
    /// Scan requests currently tracked, pending and active
    pub fn scans_tracked(&self) -> usize {
        self.queues.len(QueueId::ScanPending) + self.queues.len(QueueId::ScanActive)
    }

    /// Refuse a new scan once `limit` are already tracked
    pub fn check_scan_ceiling(&self, limit: usize) -> Result<(), SchedulerError> {
        if self.scans_tracked() >= limit {
            warn!("[SCAN] ceiling of {} reached, refusing scan", limit);
            return Err(SchedulerError::ScanCeilingReached { limit });
        }
        Ok(())
    }

    /// Activate the head of Scan-Pending unless its session is already scanning
    pub fn next_scan(&mut self) -> Result<Option<Job>, SchedulerError> {
        let Some(slot) = self.queues.head(QueueId::ScanPending) else {
            return Ok(None);
        };
        let handle = self.queues.pool().handle_of(slot);

        if let Some(session) = self.queues.command(slot).map(|c| c.session) {
            let busy = self
                .queues
                .find(QueueId::ScanActive, |c| c.session == session)
                .is_some();
            if busy {
                debug!("[SCAN] {} waits for the running scan on {}", handle, session);
                return Ok(None);
            }
        }

        self.activate(handle, QueueId::ScanActive).map(Some)
    }
}
