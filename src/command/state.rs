//! Scheduler state guarded by the global lock
//!
//! Everything here runs with the lock held and never awaits. The dispatcher
//! pulls `Job`s out, drops the lock, and runs the handlers.

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use wlan_sme_shared::{
    reason, CommandKind, CompletionStatus, Defect, QueueId, SchedulerError, SessionId,
};

use super::pool::CommandEntry;
use super::queue::QueueSet;
use super::request::{Command, CommandHandle, CommandOutcome};
use super::timeout::ActiveTimer;
use crate::config::SchedulerConfig;
use crate::safety::{ReasonCode, SelfRecoveryLog};
use crate::session::{check_eligibility, Eligibility, SessionEffect, SessionRegistry, SessionSnapshot};

/// A command moved to an active queue, ready for its handler
#[derive(Debug, Clone)]
pub(crate) struct Job {
    pub handle: CommandHandle,
    pub command: Command,
    pub snapshot: Option<SessionSnapshot>,
}

/// One queued command as shown in diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub handle: CommandHandle,
    pub kind: CommandKind,
    pub session: SessionId,
    pub reason_code: u16,
    pub synthesized: bool,
}

/// Contents of one queue, head first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSummary {
    pub queue: QueueId,
    pub entries: Vec<QueueEntry>,
}

/// Point-in-time view of the pool and all four queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    pub pool_capacity: usize,
    pub free_slots: usize,
    pub queues: Vec<QueueSummary>,
    /// How long the active general command has been running
    pub active_elapsed: Option<Duration>,
    pub shut_down: bool,
}

impl QueueStatus {
    pub fn queue(&self, id: QueueId) -> &[QueueEntry] {
        self.queues
            .iter()
            .find(|q| q.queue == id)
            .map(|q| q.entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self, id: QueueId) -> usize {
        self.queue(id).len()
    }

    /// Write the status to the log
    pub fn log(&self) {
        info!(
            "[SCHED] pool {}/{} free{}",
            self.free_slots,
            self.pool_capacity,
            if self.shut_down { " (shut down)" } else { "" }
        );
        for summary in &self.queues {
            info!("    {}: {} entries", summary.queue, summary.entries.len());
            for entry in &summary.entries {
                info!(
                    "      {} {} {} reason={}{}",
                    entry.handle,
                    entry.kind,
                    entry.session,
                    entry.reason_code,
                    if entry.synthesized { " (synthesized)" } else { "" }
                );
            }
        }
        if let Some(elapsed) = self.active_elapsed {
            info!("    active general command running for {:?}", elapsed);
        }
    }
}

/// What the timeout monitor learns about a wedged command
#[derive(Debug, Clone)]
pub(crate) struct TimeoutReport {
    pub handle: CommandHandle,
    pub kind: CommandKind,
    pub session: SessionId,
    pub reason_code: u16,
    pub elapsed: Duration,
    /// Head of General-Pending, already formatted
    pub pending: Vec<String>,
}

pub(crate) struct SchedulerState {
    pub queues: QueueSet,
    pub sessions: SessionRegistry,
    pub recovery: SelfRecoveryLog,
    pub active_timer: Option<ActiveTimer>,
    pub closed: bool,
    diag_depth: usize,
}

impl SchedulerState {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            queues: QueueSet::new(config.pool_capacity),
            sessions: SessionRegistry::new(),
            recovery: SelfRecoveryLog::new(config.recovery_log_depth),
            active_timer: None,
            closed: false,
            diag_depth: config.diag_pending_depth,
        }
    }

    /// Acquire a slot, fill it and link it into its pending queue
    pub fn admit(
        &mut self,
        command: Command,
        responder: Option<oneshot::Sender<CommandOutcome>>,
        priority: bool,
    ) -> Result<CommandHandle, SchedulerError> {
        let handle = match self.queues.pool_mut().acquire() {
            Ok(handle) => handle,
            Err(e) => {
                error!("[SCHED] {} refused: {}", command, e);
                self.log_diagnostics();
                return Err(e);
            }
        };

        let queue = if command.kind.is_scan() {
            QueueId::ScanPending
        } else {
            QueueId::GeneralPending
        };
        debug!(
            "[SCHED] {} {} -> {}{}",
            handle,
            command,
            queue,
            if priority { " (head)" } else { "" }
        );

        self.queues
            .pool_mut()
            .install(handle, CommandEntry::new(command, responder))?;
        // Scans are strictly FIFO; priority only applies to the general lane
        if priority && queue == QueueId::GeneralPending {
            self.queues.link_head(handle, queue)?;
        } else {
            self.queues.link_tail(handle, queue)?;
        }
        Ok(handle)
    }

    fn is_scanning(&self, session: SessionId) -> bool {
        self.queues
            .find(QueueId::ScanActive, |c| c.session == session)
            .is_some()
    }

    /// First General-Pending command whose session is not mid-scan
    fn general_candidate(&self) -> Option<usize> {
        self.queues
            .find(QueueId::GeneralPending, |c| !self.is_scanning(c.session))
    }

    /// Pick and activate the next general command, if one may run now
    pub fn next_general(&mut self) -> Result<Option<Job>, SchedulerError> {
        loop {
            if !self.queues.is_empty(QueueId::GeneralActive) {
                return Ok(None);
            }
            let Some(slot) = self.general_candidate() else {
                return Ok(None);
            };

            let handle = self.queues.pool().handle_of(slot);
            let Some(command) = self.queues.command(slot) else {
                return Err(Defect::Corrupted(format!("slot {slot} queued without a command")).into());
            };
            let (kind, session) = (command.kind, command.session);

            match check_eligibility(self.sessions.get(session), kind) {
                Eligibility::Eligible => {
                    return self.activate(handle, QueueId::GeneralActive).map(Some);
                }
                Eligibility::Deferred => {
                    debug!("[SCHED] {} {} deferred: {} waiting for key", handle, kind, session);
                    return Ok(None);
                }
                Eligibility::TeardownFirst => {
                    info!("[SCHED] {} closing mid-handshake, disconnecting first", session);
                    if !self.force_disconnect(session, reason::DEAUTH_LEAVING) {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Move a pending command to its active queue
    pub fn activate(&mut self, handle: CommandHandle, target: QueueId) -> Result<Job, SchedulerError> {
        self.queues.move_to(handle, target)?;

        let command = self
            .queues
            .command(handle.slot)
            .cloned()
            .ok_or_else(|| Defect::Corrupted(format!("{handle} activated without a command")))?;

        self.recovery
            .record(command.kind, command.session, ReasonCode::Dispatched);
        if target == QueueId::GeneralActive {
            self.active_timer = Some(ActiveTimer::start(handle, command.kind, command.session));
        }

        info!("[SCHED] {} {} -> {}", handle, command, target);

        Ok(Job {
            handle,
            snapshot: self.sessions.snapshot(command.session),
            command,
        })
    }

    /// Link a scheduler-issued disconnect at the head of General-Pending
    ///
    /// Returns false if no slot was free; the caller retries on a later drain.
    pub fn force_disconnect(&mut self, session: SessionId, reason_code: u16) -> bool {
        let command = Command::forced_disconnect(session, reason_code);
        match self.admit(command, None, true) {
            Ok(handle) => {
                info!("[SCHED] {} synthesized disconnect for {}", handle, session);
                true
            }
            Err(e) => {
                error!("[SCHED] could not synthesize disconnect for {}: {}", session, e);
                false
            }
        }
    }

    /// A disconnect for `session` is already queued or running
    pub fn has_disconnect(&self, session: SessionId) -> bool {
        [QueueId::GeneralPending, QueueId::GeneralActive]
            .into_iter()
            .any(|id| {
                self.queues
                    .find(id, |c| c.session == session && c.kind == CommandKind::Disconnect)
                    .is_some()
            })
    }

    /// Active command a completion report refers to
    pub fn match_completion(
        &self,
        kind: CommandKind,
        session: Option<SessionId>,
    ) -> Option<CommandHandle> {
        let slot = if kind.is_scan() {
            match session {
                Some(session) => self.queues.find(QueueId::ScanActive, |c| c.session == session)?,
                None => self.queues.head(QueueId::ScanActive)?,
            }
        } else {
            let slot = self.queues.head(QueueId::GeneralActive)?;
            let command = self.queues.command(slot)?;
            if command.kind != kind || session.is_some_and(|s| s != command.session) {
                return None;
            }
            slot
        };

        Some(self.queues.pool().handle_of(slot))
    }

    /// Unlink, release and report a command
    pub fn finish(
        &mut self,
        handle: CommandHandle,
        status: CompletionStatus,
        now_ms: u64,
    ) -> Result<SessionEffect, SchedulerError> {
        let queue = self.queues.unlink(handle)?;
        let entry = self
            .queues
            .pool_mut()
            .release(handle)?
            .ok_or_else(|| Defect::Corrupted(format!("{handle} released without a command")))?;

        if self.active_timer.as_ref().is_some_and(|t| t.handle == handle) {
            self.active_timer = None;
        }

        let command = entry.command;
        let effect = self.sessions.apply_completion(&command, &status, now_ms);

        let elapsed = entry.enqueued_at.elapsed();
        match &status {
            CompletionStatus::Success => {
                info!("[SCHED] {} {} done in {:?}", handle, command, elapsed)
            }
            CompletionStatus::Cancelled => {
                info!("[SCHED] {} {} cancelled from {}", handle, command, queue)
            }
            CompletionStatus::Failed { reason } => {
                warn!("[SCHED] {} {} failed: {}", handle, command, reason)
            }
            CompletionStatus::Rejected { reason } => {
                warn!("[SCHED] {} {} rejected: {}", handle, command, reason)
            }
        }

        if let Some(responder) = entry.responder {
            let _ = responder.send(CommandOutcome {
                handle,
                kind: command.kind,
                session: command.session,
                status,
                elapsed,
            });
        }

        if effect == SessionEffect::Removed {
            let leftover = self.cancel_where(now_ms, |c| c.session == command.session)?;
            if leftover > 0 {
                info!(
                    "[SCHED] cancelled {} leftover commands for removed {}",
                    leftover, command.session
                );
            }
        }

        Ok(effect)
    }

    /// Cancel a queued or active command on behalf of a producer
    pub fn abort(&mut self, handle: CommandHandle, now_ms: u64) -> Result<(), SchedulerError> {
        if self.queues.locate(handle).is_some() {
            self.finish(handle, CompletionStatus::Cancelled, now_ms)?;
            self.queues.pool_mut().mark_aborted(handle.slot);
            return Ok(());
        }

        let pool = self.queues.pool();
        if handle.slot < pool.capacity() && pool.handle_of(handle.slot) == handle {
            // Same use of the slot, already gone from every queue
            if pool.was_aborted(handle.slot) {
                return Err(Defect::DoubleAbort { slot: handle.slot }.into());
            }
            // Lost a race with its completion or a purge
            return Err(SchedulerError::AlreadyFinished { slot: handle.slot });
        }

        Err(SchedulerError::StaleHandle {
            slot: handle.slot,
            generation: handle.generation,
        })
    }

    /// Cancel every matching command, walking the queues in purge order
    pub fn cancel_where(
        &mut self,
        now_ms: u64,
        pred: impl Fn(&Command) -> bool,
    ) -> Result<usize, SchedulerError> {
        let mut doomed = Vec::new();
        for id in QueueId::ALL {
            for (slot, command) in self.queues.commands(id) {
                if pred(command) {
                    doomed.push(self.queues.pool().handle_of(slot));
                }
            }
        }

        let mut cancelled = 0;
        for handle in doomed {
            // A removed session may already have taken some of these with it
            if self.queues.locate(handle).is_some() {
                self.finish(handle, CompletionStatus::Cancelled, now_ms)?;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    /// Escalate the active general command once it outlives `timeout`
    pub fn check_active_timeout(&mut self, timeout: Duration) -> Option<TimeoutReport> {
        let timer = self.active_timer.as_mut()?;
        if !timer.try_escalate(timeout) {
            return None;
        }
        let (handle, kind, session, elapsed) = (timer.handle, timer.kind, timer.session, timer.elapsed());

        self.recovery.record(kind, session, ReasonCode::ActiveTimeout);

        Some(TimeoutReport {
            handle,
            kind,
            session,
            reason_code: self
                .queues
                .command(handle.slot)
                .map(|c| c.reason_code)
                .unwrap_or_default(),
            elapsed,
            pending: self.describe(QueueId::GeneralPending, self.diag_depth),
        })
    }

    /// Sessions stuck in key exchange that do not yet have a disconnect queued
    pub fn expired_key_waits(&self, now_ms: u64, timeout_ms: u64) -> Vec<SessionId> {
        self.sessions
            .key_wait_expired(now_ms, timeout_ms)
            .into_iter()
            .filter(|s| !self.has_disconnect(*s))
            .collect()
    }

    fn describe(&self, id: QueueId, limit: usize) -> Vec<String> {
        self.queues
            .commands(id)
            .take(limit)
            .map(|(slot, c)| format!("{} {}", self.queues.pool().handle_of(slot), c))
            .collect()
    }

    /// Dump active commands and the head of General-Pending
    pub fn log_diagnostics(&self) {
        for id in [QueueId::GeneralActive, QueueId::ScanActive] {
            for line in self.describe(id, usize::MAX) {
                error!("    {}: {}", id, line);
            }
        }
        for line in self.describe(QueueId::GeneralPending, self.diag_depth) {
            error!("    {}: {}", QueueId::GeneralPending, line);
        }
    }

    pub fn status(&self) -> QueueStatus {
        let queues = QueueId::ALL
            .into_iter()
            .map(|id| QueueSummary {
                queue: id,
                entries: self
                    .queues
                    .commands(id)
                    .map(|(slot, c)| QueueEntry {
                        handle: self.queues.pool().handle_of(slot),
                        kind: c.kind,
                        session: c.session,
                        reason_code: c.reason_code,
                        synthesized: c.synthesized,
                    })
                    .collect(),
            })
            .collect();

        QueueStatus {
            pool_capacity: self.queues.pool().capacity(),
            free_slots: self.queues.pool().free_count(),
            queues,
            active_elapsed: self.active_timer.as_ref().map(|t| t.elapsed()),
            shut_down: self.closed,
        }
    }

    /// Check slot accounting plus the scheduling invariants
    pub fn audit(&self) -> Result<(), Defect> {
        self.queues.audit()?;

        if self.queues.len(QueueId::GeneralActive) > 1 {
            return Err(Defect::Corrupted(format!(
                "{} general commands active",
                self.queues.len(QueueId::GeneralActive)
            )));
        }

        let mut scanning: Vec<SessionId> = self
            .queues
            .commands(QueueId::ScanActive)
            .map(|(_, c)| c.session)
            .collect();
        scanning.sort();
        if scanning.windows(2).any(|w| w[0] == w[1]) {
            return Err(Defect::Corrupted("two active scans for one session".into()));
        }

        match (&self.active_timer, self.queues.head(QueueId::GeneralActive)) {
            (None, None) => Ok(()),
            (Some(timer), Some(slot)) if timer.handle == self.queues.pool().handle_of(slot) => Ok(()),
            _ => Err(Defect::Corrupted(
                "active timer out of step with general-active".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::request::{CommandPayload, ConnectRequest, ScanRequest};
    use wlan_sme_shared::{MacAddr, SessionEvent, SessionMode};

    fn state(capacity: usize) -> SchedulerState {
        SchedulerState::new(&SchedulerConfig {
            pool_capacity: capacity,
            ..Default::default()
        })
    }

    fn connect(session: u8) -> Command {
        Command::new(
            SessionId(session),
            CommandPayload::Connect(ConnectRequest {
                ssid: "lab".into(),
                bssid: None,
                channel: 1,
                secured: true,
            }),
        )
    }

    fn scan(session: u8) -> Command {
        Command::new(SessionId(session), CommandPayload::Scan(ScanRequest::default()))
    }

    #[test]
    fn test_single_active_general() {
        let mut state = state(4);
        state.admit(connect(1), None, false).unwrap();
        state.admit(connect(2), None, false).unwrap();

        let job = state.next_general().unwrap().unwrap();
        assert_eq!(job.command.session, SessionId(1));
        assert!(state.next_general().unwrap().is_none());
        assert_eq!(state.queues.len(QueueId::GeneralActive), 1);
        assert!(state.active_timer.is_some());
        assert!(state.audit().is_ok());
    }

    #[test]
    fn test_skip_over_scanning_session() {
        let mut state = state(4);
        let s = state.admit(scan(1), None, false).unwrap();
        state.activate(s, QueueId::ScanActive).unwrap();

        state.admit(connect(1), None, false).unwrap();
        state.admit(connect(2), None, false).unwrap();

        let job = state.next_general().unwrap().unwrap();
        assert_eq!(job.command.session, SessionId(2));
    }

    #[test]
    fn test_teardown_first_synthesizes_disconnect() {
        let mut state = state(4);
        state
            .sessions
            .register(SessionId(3), SessionMode::Station, MacAddr::default());
        state
            .sessions
            .apply_event(SessionId(3), SessionEvent::Associated { secured: true }, 0);

        state
            .admit(Command::new(SessionId(3), CommandPayload::DeleteSession), None, false)
            .unwrap();

        let job = state.next_general().unwrap().unwrap();
        assert_eq!(job.command.kind, CommandKind::Disconnect);
        assert!(job.command.synthesized);
        assert_eq!(job.command.reason_code, reason::DEAUTH_LEAVING);
        assert_eq!(state.queues.len(QueueId::GeneralPending), 1);
    }

    #[test]
    fn test_finish_delivers_outcome() {
        let mut state = state(2);
        let (tx, mut rx) = oneshot::channel();
        let handle = state.admit(connect(1), Some(tx), false).unwrap();
        state.next_general().unwrap().unwrap();

        state
            .finish(handle, CompletionStatus::failed("no ack"), 0)
            .unwrap();

        let outcome = rx.try_recv().unwrap();
        assert_eq!(outcome.handle, handle);
        assert_eq!(outcome.status, CompletionStatus::failed("no ack"));
        assert!(state.active_timer.is_none());
        assert_eq!(state.queues.pool().free_count(), 2);
        assert!(state.audit().is_ok());
    }

    #[test]
    fn test_abort_twice_is_defect() {
        let mut state = state(2);
        let handle = state.admit(connect(1), None, false).unwrap();

        state.abort(handle, 0).unwrap();
        assert_eq!(
            state.abort(handle, 0),
            Err(SchedulerError::Defect(Defect::DoubleAbort { slot: handle.slot }))
        );
    }

    #[test]
    fn test_abort_after_cancel_is_not_defect() {
        let mut state = state(2);
        let handle = state.admit(connect(1), None, false).unwrap();
        state.cancel_where(0, |_| true).unwrap();

        let err = state.abort(handle, 0).unwrap_err();
        assert_eq!(err, SchedulerError::AlreadyFinished { slot: handle.slot });
        assert!(!err.is_fatal());
        assert!(state.audit().is_ok());
    }

    #[test]
    fn test_abort_after_reuse_is_stale() {
        let mut state = state(1);
        let old = state.admit(connect(1), None, false).unwrap();
        state.abort(old, 0).unwrap();
        state.admit(connect(2), None, false).unwrap();

        assert!(matches!(
            state.abort(old, 0),
            Err(SchedulerError::StaleHandle { .. })
        ));
        assert_eq!(state.queues.len(QueueId::GeneralPending), 1);
    }

    #[test]
    fn test_general_completion_must_match_kind() {
        let mut state = state(2);
        state.admit(connect(1), None, false).unwrap();
        state.next_general().unwrap().unwrap();

        assert!(state.match_completion(CommandKind::Roam, None).is_none());
        assert!(state
            .match_completion(CommandKind::Connect, Some(SessionId(2)))
            .is_none());
        assert!(state
            .match_completion(CommandKind::Connect, Some(SessionId(1)))
            .is_some());
    }

    #[test]
    fn test_status_lists_queues_in_order() {
        let mut state = state(3);
        state.admit(connect(1), None, false).unwrap();
        state.admit(scan(2), None, false).unwrap();

        let status = state.status();
        assert_eq!(status.free_slots, 1);
        assert_eq!(status.len(QueueId::GeneralPending), 1);
        assert_eq!(status.len(QueueId::ScanPending), 1);
        let order: Vec<QueueId> = status.queues.iter().map(|q| q.queue).collect();
        assert_eq!(order, QueueId::ALL.to_vec());
    }
}
