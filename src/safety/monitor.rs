//! Timeout Monitor
//!
//! Runs a background task that watches the active general command and the
//! sessions waiting for keys, and hands escalations to the host.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use wlan_sme_shared::{CommandKind, Fault, SessionId};

use crate::command::{CommandHandle, Scheduler};

/// Actions the timeout monitor asks the host to take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Reset the command path; the wedged command is still queued
    SelfRecovery {
        handle: CommandHandle,
        kind: CommandKind,
        session: SessionId,
        elapsed: Duration,
    },
    /// Self-recovery is disabled; the host should treat this as a crash
    Fatal(Fault),
}

/// Watches the scheduler for wedged commands
pub struct TimeoutMonitor {
    scheduler: Arc<Scheduler>,
    /// Channel to send recovery actions
    action_tx: mpsc::UnboundedSender<RecoveryAction>,
    /// Channel to receive recovery actions
    action_rx: Arc<RwLock<mpsc::UnboundedReceiver<RecoveryAction>>>,
    /// Flag to track if monitoring is active
    monitoring_active: Arc<RwLock<bool>>,
}

impl TimeoutMonitor {
    /// Create a monitor for `scheduler`
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();

        Self {
            scheduler,
            action_tx,
            action_rx: Arc::new(RwLock::new(action_rx)),
            monitoring_active: Arc::new(RwLock::new(false)),
        }
    }

    /// Receive the next recovery action (blocks until available)
    pub async fn recv_action(&self) -> Option<RecoveryAction> {
        self.action_rx.write().await.recv().await
    }

    /// Run one monitor pass
    ///
    /// Forces disconnects for expired key waits and escalates the active
    /// general command the first time it is found past its timeout.
    pub async fn check_once(&self) -> Vec<RecoveryAction> {
        check_scheduler(&self.scheduler).await
    }

    /// Start the monitoring background task
    pub async fn start_monitoring(&self) -> Result<MonitorHandle> {
        let mut active = self.monitoring_active.write().await;
        if *active {
            bail!("Timeout monitoring already active");
        }
        *active = true;
        drop(active);

        let scheduler = self.scheduler.clone();
        let action_tx = self.action_tx.clone();
        let monitoring_active = self.monitoring_active.clone();
        let period = scheduler.config().monitor_interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                // Check if we should stop
                if !*monitoring_active.read().await {
                    break;
                }

                for action in check_scheduler(&scheduler).await {
                    if action_tx.send(action).is_err() {
                        warn!("[MONITOR] action receiver dropped");
                    }
                }
            }

            info!("[MONITOR] Monitoring stopped");
        });

        Ok(MonitorHandle {
            active: self.monitoring_active.clone(),
            task,
        })
    }
}

async fn check_scheduler(scheduler: &Scheduler) -> Vec<RecoveryAction> {
    let mut actions = Vec::new();

    let forced = scheduler.expire_key_waits().await;
    if !forced.is_empty() {
        info!("[MONITOR] forced disconnect on {} stalled sessions", forced.len());
    }

    let Some(report) = scheduler.check_active_timeout().await else {
        return actions;
    };

    error!(
        "[MONITOR] {} {} on {} stuck for {:?} (reason={})",
        report.handle, report.kind, report.session, report.elapsed, report.reason_code
    );
    for line in &report.pending {
        error!("    pending: {}", line);
    }
    let lower = scheduler.lower();
    for line in lower.pending_requests().await {
        error!("    {} outstanding: {}", lower.name(), line);
    }

    let action = if scheduler.config().self_recovery {
        warn!("[MONITOR] requesting self-recovery");
        RecoveryAction::SelfRecovery {
            handle: report.handle,
            kind: report.kind,
            session: report.session,
            elapsed: report.elapsed,
        }
    } else {
        RecoveryAction::Fatal(Fault::WedgedCommand {
            kind: report.kind,
            session: report.session,
            elapsed_ms: report.elapsed.as_millis() as u64,
        })
    };
    actions.push(action);
    actions
}

/// Handle to the monitoring task
pub struct MonitorHandle {
    active: Arc<RwLock<bool>>,
    task: tokio::task::JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop after the current tick
    pub async fn stop(self) {
        *self.active.write().await = false;
        self.task.abort();
        let _ = self.task.await;
    }
}
