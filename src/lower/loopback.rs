//! Loopback radio
//!
//! A `LowerLayer` with no firmware behind it. Every accepted request is
//! recorded and, when auto-completion is on, answered with a success
//! completion after a fixed latency. Kinds can be configured to be refused
//! outright or to stall forever, which is how a wedged firmware looks to the
//! scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use wlan_sme_shared::{CommandKind, CompletionStatus, SessionId};

use super::traits::LowerLayer;
use crate::command::{
    AddSessionRequest, ConnectRequest, DisconnectRequest, HwModeRequest, KeyRequest,
    RoamRequest, ScanRequest, TdlsRequest,
};

/// Completion reported by the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub kind: CommandKind,
    pub session: SessionId,
    pub status: CompletionStatus,
}

/// Channel on which the radio reports completions
pub type CompletionReceiver = mpsc::UnboundedReceiver<CompletionEvent>;

/// A request the radio accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioRequest {
    pub kind: CommandKind,
    pub session: SessionId,
}

/// Loopback radio behaviour
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Answer every accepted request with a success completion
    pub auto_complete: bool,
    /// Completion delay for general commands
    pub latency: Duration,
    /// Completion delay for scans
    pub scan_latency: Duration,
    /// Kinds rejected synchronously
    pub refuse: Vec<CommandKind>,
    /// Kinds accepted but never completed
    pub stall: Vec<CommandKind>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            auto_complete: true,
            latency: Duration::from_millis(20),
            scan_latency: Duration::from_millis(120),
            refuse: Vec::new(),
            stall: Vec::new(),
        }
    }
}

/// In-process stand-in for the firmware command path
pub struct LoopbackRadio {
    config: LoopbackConfig,
    history: Mutex<Vec<RadioRequest>>,
    outstanding: Arc<Mutex<Vec<RadioRequest>>>,
    completion_tx: mpsc::UnboundedSender<CompletionEvent>,
}

impl LoopbackRadio {
    /// Create a radio and the receiver its completions arrive on
    pub fn new(config: LoopbackConfig) -> (Self, CompletionReceiver) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let radio = Self {
            config,
            history: Mutex::new(Vec::new()),
            outstanding: Arc::new(Mutex::new(Vec::new())),
            completion_tx,
        };

        (radio, completion_rx)
    }

    /// Radio that records requests and never answers on its own
    pub fn manual() -> (Self, CompletionReceiver) {
        Self::new(LoopbackConfig {
            auto_complete: false,
            ..Default::default()
        })
    }

    /// Every request accepted so far, oldest first
    pub async fn requests(&self) -> Vec<RadioRequest> {
        self.history.lock().await.clone()
    }

    /// Number of accepted requests of `kind`
    pub async fn count(&self, kind: CommandKind) -> usize {
        self.history
            .lock()
            .await
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    async fn submit(&self, kind: CommandKind, session: SessionId) -> Result<()> {
        if self.config.refuse.contains(&kind) {
            return Err(anyhow!("radio refused {} for {}", kind, session));
        }

        let request = RadioRequest { kind, session };
        debug!("[RADIO] accepted {} for {}", kind, session);
        self.history.lock().await.push(request);
        self.outstanding.lock().await.push(request);

        if !self.config.auto_complete || self.config.stall.contains(&kind) {
            return Ok(());
        }

        let delay = if kind.is_scan() {
            self.config.scan_latency
        } else {
            self.config.latency
        };
        let outstanding = self.outstanding.clone();
        let completion_tx = self.completion_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut outstanding = outstanding.lock().await;
                if let Some(pos) = outstanding.iter().position(|r| *r == request) {
                    outstanding.remove(pos);
                }
            }

            let _ = completion_tx.send(CompletionEvent {
                kind,
                session,
                status: CompletionStatus::Success,
            });
        });

        Ok(())
    }
}

#[async_trait]
impl LowerLayer for LoopbackRadio {
    async fn start_scan(&self, session: SessionId, _request: &ScanRequest) -> Result<()> {
        self.submit(CommandKind::Scan, session).await
    }

    async fn connect(&self, session: SessionId, _request: &ConnectRequest) -> Result<()> {
        self.submit(CommandKind::Connect, session).await
    }

    async fn roam(&self, session: SessionId, _request: &RoamRequest) -> Result<()> {
        self.submit(CommandKind::Roam, session).await
    }

    async fn disconnect(&self, session: SessionId, _request: &DisconnectRequest) -> Result<()> {
        self.submit(CommandKind::Disconnect, session).await
    }

    async fn set_key(&self, session: SessionId, _request: &KeyRequest) -> Result<()> {
        self.submit(CommandKind::SetKey, session).await
    }

    async fn add_session(&self, session: SessionId, _request: &AddSessionRequest) -> Result<()> {
        self.submit(CommandKind::AddSession, session).await
    }

    async fn delete_session(&self, session: SessionId) -> Result<()> {
        self.submit(CommandKind::DeleteSession, session).await
    }

    async fn tdls(&self, session: SessionId, _request: &TdlsRequest) -> Result<()> {
        self.submit(CommandKind::TdlsOp, session).await
    }

    async fn set_hw_mode(&self, session: SessionId, _request: &HwModeRequest) -> Result<()> {
        self.submit(CommandKind::HwModeChange, session).await
    }

    async fn pending_requests(&self) -> Vec<String> {
        self.outstanding
            .lock()
            .await
            .iter()
            .map(|r| format!("{} {}", r.kind, r.session))
            .collect()
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_radio_records_without_completing() {
        let (radio, mut rx) = LoopbackRadio::manual();
        radio
            .delete_session(SessionId(1))
            .await
            .unwrap();

        assert_eq!(radio.count(CommandKind::DeleteSession).await, 1);
        assert_eq!(radio.pending_requests().await, vec!["delete-session session#1"]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refused_kind_fails_synchronously() {
        let (radio, _rx) = LoopbackRadio::new(LoopbackConfig {
            refuse: vec![CommandKind::Roam],
            ..Default::default()
        });
        let request = RoamRequest {
            bssid: Default::default(),
            channel: 6,
            secured: false,
        };

        assert!(radio.roam(SessionId(0), &request).await.is_err());
        assert!(radio.requests().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_complete_after_latency() {
        let (radio, mut rx) = LoopbackRadio::new(LoopbackConfig::default());
        radio.delete_session(SessionId(3)).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, CommandKind::DeleteSession);
        assert_eq!(event.session, SessionId(3));
        assert!(event.status.is_success());
        assert!(radio.pending_requests().await.is_empty());
    }
}
