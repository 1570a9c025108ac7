//! Command scheduler
//!
//! Owns the pool, the four queues and the session registry behind a single
//! lock. Producers enqueue, the lower layer reports completions, and every
//! state change ends with a drain that dispatches whatever became runnable.

use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use wlan_sme_shared::{
    reason, CommandKind, CompletionStatus, Defect, MacAddr, SchedulerError, SessionEvent,
    SessionId, SessionMode, SessionState, TransitionResult,
};

use super::handlers::{self, HandlerContext};
use super::request::{Command, CommandHandle, CommandPayload, Disposition, Ticket};
use super::state::{Job, QueueStatus, SchedulerState, TimeoutReport};
use crate::config::SchedulerConfig;
use crate::lower::{CompletionReceiver, LowerLayer};
use crate::safety::SelfRecoveryStats;

/// Serializes management commands onto one lower layer
pub struct Scheduler {
    config: SchedulerConfig,
    lower: Arc<dyn LowerLayer>,
    state: Mutex<SchedulerState>,
    epoch: Instant,
}

impl Scheduler {
    /// Create a scheduler in front of `lower`
    pub fn new(config: SchedulerConfig, lower: Arc<dyn LowerLayer>) -> Result<Self, SchedulerError> {
        config.validate()?;

        info!(
            "[SCHED] {} slots, {} scans max, {:?} active timeout, lower layer '{}'",
            config.pool_capacity,
            config.max_scan_requests,
            config.active_timeout,
            lower.name()
        );

        Ok(Self {
            state: Mutex::new(SchedulerState::new(&config)),
            config,
            lower,
            epoch: Instant::now(),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn lower(&self) -> &Arc<dyn LowerLayer> {
        &self.lower
    }

    /// Milliseconds since the scheduler was created
    pub fn clock_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Register an interface that exists without an add-session command
    pub async fn register_session(&self, id: SessionId, mode: SessionMode, mac: MacAddr) -> bool {
        self.state.lock().await.sessions.register(id, mode, mac)
    }

    pub async fn session_state(&self, id: SessionId) -> Option<SessionState> {
        self.state.lock().await.sessions.state(id)
    }

    /// Feed a protocol-layer event into a session, then drain
    pub async fn session_event(
        &self,
        id: SessionId,
        event: SessionEvent,
    ) -> Option<TransitionResult> {
        let result = {
            let mut state = self.state.lock().await;
            state.sessions.apply_event(id, event, self.clock_ms())
        };

        if let Err(e) = self.drain().await {
            error!("[SCHED] drain after session event failed: {}", e);
        }
        result
    }

    /// Queue a command built from `payload`
    ///
    /// `priority` puts a general command at the head of General-Pending.
    /// Scans ignore it.
    ///
    /// General dispatch is strict FIFO: a head command deferred because its
    /// session is waiting for keys holds back everything behind it. While a
    /// session is in `WaitingForKey`, enqueue its `SetKey` with `priority`
    /// set, otherwise it waits until the key-wait timeout forces a
    /// disconnect.
    pub async fn enqueue(
        &self,
        session: SessionId,
        payload: CommandPayload,
        priority: bool,
    ) -> Result<Ticket, SchedulerError> {
        self.enqueue_command(Command::new(session, payload), priority)
            .await
    }

    /// Queue a prepared command
    pub async fn enqueue_command(
        &self,
        command: Command,
        priority: bool,
    ) -> Result<Ticket, SchedulerError> {
        let (responder, completion) = oneshot::channel();

        let handle = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(SchedulerError::ShutDown);
            }
            if command.kind.is_scan() {
                state.check_scan_ceiling(self.config.max_scan_requests)?;
            }
            state.admit(command, Some(responder), priority)?
        };

        // The command is queued either way; a later drain picks it up
        if let Err(e) = self.drain().await {
            error!("[SCHED] drain after enqueue of {} failed: {}", handle, e);
        }

        Ok(Ticket {
            handle,
            disposition: self.disposition(handle).await,
            completion,
        })
    }

    async fn disposition(&self, handle: CommandHandle) -> Disposition {
        match self.state.lock().await.queues.locate(handle) {
            Some(queue) if queue.is_active() => Disposition::Active,
            Some(_) => Disposition::Pending,
            None => Disposition::Finished,
        }
    }

    /// Dispatch everything that may run now
    ///
    /// Commands are moved to their active queue with the lock held; handlers
    /// run after it is released.
    pub async fn drain(&self) -> Result<(), SchedulerError> {
        loop {
            let jobs = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Ok(());
                }

                let mut jobs = Vec::new();
                if let Some(job) = state.next_general()? {
                    jobs.push(job);
                }
                while let Some(job) = state.next_scan()? {
                    jobs.push(job);
                }
                jobs
            };

            if jobs.is_empty() {
                return Ok(());
            }

            for job in jobs {
                self.run(job).await?;
            }
        }
    }

    async fn run(&self, job: Job) -> Result<(), SchedulerError> {
        let ctx = HandlerContext {
            handle: job.handle,
            session: job.command.session,
            snapshot: job.snapshot,
        };

        let result = handlers::dispatch(&ctx, &job.command, self.lower.as_ref()).await;
        let Some(status) = result.into_status() else {
            return Ok(());
        };

        let mut state = self.state.lock().await;
        match state.queues.locate(job.handle) {
            Some(queue) if queue.is_active() => {
                state.finish(job.handle, status, self.clock_ms())?;
            }
            _ => {
                debug!("[SCHED] {} left its active queue before the handler returned", job.handle);
            }
        }
        Ok(())
    }

    /// Cancel one command
    ///
    /// The producer's completion resolves with `Cancelled`. Aborting the
    /// same handle again is a defect; aborting one that already completed
    /// or was purged returns `AlreadyFinished`.
    pub async fn abort(&self, handle: CommandHandle) -> Result<(), SchedulerError> {
        {
            let mut state = self.state.lock().await;
            state.abort(handle, self.clock_ms())?;
        }
        self.drain().await
    }

    /// Cancel every command for `session`; returns how many were cancelled
    pub async fn abort_session(&self, session: SessionId) -> Result<usize, SchedulerError> {
        let cancelled = {
            let mut state = self.state.lock().await;
            state.cancel_where(self.clock_ms(), |c| c.session == session)?
        };
        info!("[SCHED] aborted {} commands for {}", cancelled, session);

        self.drain().await?;
        Ok(cancelled)
    }

    /// Cancel everything and refuse further commands
    pub async fn shutdown(&self) -> Result<usize, SchedulerError> {
        let mut state = self.state.lock().await;
        state.closed = true;
        let cancelled = state.cancel_where(self.clock_ms(), |_| true)?;
        info!("[SCHED] shut down, {} commands cancelled", cancelled);
        Ok(cancelled)
    }

    /// Cancel everything without closing; the self-recovery path
    pub async fn purge(&self, why: &str) -> Result<usize, SchedulerError> {
        let cancelled = {
            let mut state = self.state.lock().await;
            state.cancel_where(self.clock_ms(), |_| true)?
        };
        warn!("[SCHED] purged {} commands: {}", cancelled, why);
        Ok(cancelled)
    }

    /// Ingest a completion from the lower layer
    ///
    /// General completions must match the General-Active head by kind (and
    /// session when given). Scan completions match the session's active
    /// scan, or the oldest one when `session` is `None`. Returns false when
    /// nothing matched and the report was discarded.
    pub async fn on_completion(
        &self,
        kind: CommandKind,
        session: Option<SessionId>,
        status: CompletionStatus,
    ) -> bool {
        {
            let mut state = self.state.lock().await;
            let Some(handle) = state.match_completion(kind, session) else {
                warn!(
                    "[SCHED] discarding unmatched {} completion for {} ({:?})",
                    kind,
                    session.map_or_else(|| "any session".to_string(), |s| s.to_string()),
                    status
                );
                return false;
            };

            if let Err(e) = state.finish(handle, status, self.clock_ms()) {
                error!("[SCHED] completing {} failed: {}", handle, e);
                return false;
            }
        }

        if let Err(e) = self.drain().await {
            error!("[SCHED] drain after completion failed: {}", e);
        }
        true
    }

    /// Feed a radio's completion channel into `on_completion`
    pub fn spawn_completion_pump(self: &Arc<Self>, mut completions: CompletionReceiver) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            while let Some(event) = completions.recv().await {
                scheduler
                    .on_completion(event.kind, Some(event.session), event.status)
                    .await;
            }
            debug!("[SCHED] completion channel closed");
        })
    }

    /// Snapshot of the pool and queues, also written to the log
    pub async fn dump_queue_status(&self) -> QueueStatus {
        let status = self.state.lock().await.status();
        status.log();
        status
    }

    pub async fn self_recovery_stats(&self) -> SelfRecoveryStats {
        self.state.lock().await.recovery.stats()
    }

    /// Verify slot accounting and scheduling invariants
    pub async fn audit(&self) -> Result<(), Defect> {
        self.state.lock().await.audit()
    }

    pub(crate) async fn check_active_timeout(&self) -> Option<TimeoutReport> {
        self.state
            .lock()
            .await
            .check_active_timeout(self.config.active_timeout)
    }

    /// Force a disconnect on every session stuck waiting for keys
    pub(crate) async fn expire_key_waits(&self) -> Vec<SessionId> {
        let mut expired = Vec::new();
        {
            let mut state = self.state.lock().await;
            let stuck = state.expired_key_waits(
                self.clock_ms(),
                self.config.key_wait_timeout.as_millis() as u64,
            );
            for session in stuck {
                warn!("[SCHED] {} key exchange timed out", session);
                if state.force_disconnect(session, reason::KEY_WAIT_TIMEOUT) {
                    expired.push(session);
                }
            }
        }

        if !expired.is_empty() {
            if let Err(e) = self.drain().await {
                error!("[SCHED] drain after key-wait timeout failed: {}", e);
            }
        }
        expired
    }
}
