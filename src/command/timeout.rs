//! Timeout tracking for the active general command

use std::time::Duration;

use tokio::time::Instant;
use wlan_sme_shared::{CommandKind, SessionId};

use super::request::CommandHandle;

/// Armed when a general command becomes active, dropped when it leaves
#[derive(Debug, Clone)]
pub struct ActiveTimer {
    pub handle: CommandHandle,
    pub kind: CommandKind,
    pub session: SessionId,
    pub started_at: Instant,
    escalated: bool,
}

impl ActiveTimer {
    pub fn start(handle: CommandHandle, kind: CommandKind, session: SessionId) -> Self {
        Self {
            handle,
            kind,
            session,
            started_at: Instant::now(),
            escalated: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Check if the command has been active longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.elapsed() >= timeout
    }

    /// True exactly once per activation, the first time the timer is expired
    pub fn try_escalate(&mut self, timeout: Duration) -> bool {
        if self.escalated || !self.is_timed_out(timeout) {
            return false;
        }
        self.escalated = true;
        true
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer() -> ActiveTimer {
        ActiveTimer::start(
            CommandHandle {
                slot: 0,
                generation: 1,
            },
            CommandKind::Roam,
            SessionId(1),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_timed_out_before_deadline() {
        let timer = timer();
        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!timer.is_timed_out(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalates_once() {
        let mut timer = timer();
        let timeout = Duration::from_secs(1);

        assert!(!timer.try_escalate(timeout));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(timer.try_escalate(timeout));
        assert!(timer.is_escalated());
        assert!(!timer.try_escalate(timeout));
    }
}
