//! Lower-layer trait, one method per command kind

use anyhow::Result;
use async_trait::async_trait;
use wlan_sme_shared::SessionId;

use crate::command::{
    AddSessionRequest, ConnectRequest, DisconnectRequest, HwModeRequest, KeyRequest,
    RoamRequest, ScanRequest, TdlsRequest,
};

/// Asynchronous executor of scheduler commands
///
/// `Ok(())` means the request was handed off and a completion will follow;
/// an error means it never left and no completion will arrive.
#[async_trait]
pub trait LowerLayer: Send + Sync {
    async fn start_scan(&self, session: SessionId, request: &ScanRequest) -> Result<()>;

    async fn connect(&self, session: SessionId, request: &ConnectRequest) -> Result<()>;

    async fn roam(&self, session: SessionId, request: &RoamRequest) -> Result<()>;

    async fn disconnect(&self, session: SessionId, request: &DisconnectRequest) -> Result<()>;

    async fn set_key(&self, session: SessionId, request: &KeyRequest) -> Result<()>;

    async fn add_session(&self, session: SessionId, request: &AddSessionRequest) -> Result<()>;

    async fn delete_session(&self, session: SessionId) -> Result<()>;

    async fn tdls(&self, session: SessionId, request: &TdlsRequest) -> Result<()>;

    async fn set_hw_mode(&self, session: SessionId, request: &HwModeRequest) -> Result<()>;

    /// Requests handed off but not yet completed, for fault diagnostics
    async fn pending_requests(&self) -> Vec<String> {
        Vec::new()
    }

    /// Human-readable name for this lower layer
    fn name(&self) -> &'static str;
}
