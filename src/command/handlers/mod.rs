//! Command handlers for different command kinds

mod hw_mode;
mod key;
mod link;
mod scan;
mod session;
mod tdls;

pub use hw_mode::handle_hw_mode_change;
pub use key::handle_set_key;
pub use link::{handle_connect, handle_disconnect, handle_roam};
pub use scan::handle_scan;
pub use session::{handle_add_session, handle_delete_session};
pub use tdls::handle_tdls;

use wlan_sme_shared::{CompletionStatus, SessionId};

use super::request::{Command, CommandHandle, CommandPayload};
use crate::lower::LowerLayer;
use crate::session::SessionSnapshot;

/// Context passed to command handlers
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub handle: CommandHandle,
    pub session: SessionId,
    /// Session state when the command was dispatched; `None` if unregistered
    pub snapshot: Option<SessionSnapshot>,
}

/// Result of handing a command to its handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResult {
    /// Forwarded to the lower layer; completion arrives later
    Dispatched,
    /// Nothing to do, finished successfully
    Completed { message: String },
    /// Lower layer refused the request
    Failed { message: String },
    /// Request invalid for the session's current state
    Rejected { message: String },
}

impl HandlerResult {
    /// Status to deliver when the handler finished the command itself
    pub fn into_status(self) -> Option<CompletionStatus> {
        match self {
            HandlerResult::Dispatched => None,
            HandlerResult::Completed { .. } => Some(CompletionStatus::Success),
            HandlerResult::Failed { message } => Some(CompletionStatus::Failed { reason: message }),
            HandlerResult::Rejected { message } => {
                Some(CompletionStatus::Rejected { reason: message })
            }
        }
    }
}

/// Route a command to its kind's handler
pub async fn dispatch(
    ctx: &HandlerContext,
    command: &Command,
    lower: &dyn LowerLayer,
) -> HandlerResult {
    match &command.payload {
        CommandPayload::Scan(req) => handle_scan(ctx, req, lower).await,
        CommandPayload::Connect(req) => handle_connect(ctx, req, lower).await,
        CommandPayload::Roam(req) => handle_roam(ctx, req, lower).await,
        CommandPayload::Disconnect(req) => handle_disconnect(ctx, req, lower).await,
        CommandPayload::SetKey(req) => handle_set_key(ctx, req, lower).await,
        CommandPayload::AddSession(req) => handle_add_session(ctx, req, lower).await,
        CommandPayload::DeleteSession => handle_delete_session(ctx, lower).await,
        CommandPayload::TdlsOp(req) => handle_tdls(ctx, req, lower).await,
        CommandPayload::HwModeChange(req) => handle_hw_mode_change(ctx, req, lower).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ConnectRequest, DisconnectRequest, RoamRequest};
    use crate::lower::LoopbackRadio;
    use wlan_sme_shared::{CommandKind, MacAddr, SessionMode, SessionState};

    fn ctx(snapshot: Option<(SessionMode, SessionState)>) -> HandlerContext {
        HandlerContext {
            handle: CommandHandle {
                slot: 0,
                generation: 1,
            },
            session: SessionId(1),
            snapshot: snapshot.map(|(mode, state)| SessionSnapshot {
                id: SessionId(1),
                mode,
                state,
            }),
        }
    }

    #[tokio::test]
    async fn test_connect_forwarded_for_idle_station() {
        let (radio, _rx) = LoopbackRadio::manual();
        let command = Command::new(
            SessionId(1),
            CommandPayload::Connect(ConnectRequest {
                ssid: "corp".into(),
                bssid: None,
                channel: 149,
                secured: true,
            }),
        );

        let result = dispatch(
            &ctx(Some((SessionMode::Station, SessionState::Idle))),
            &command,
            &radio,
        )
        .await;
        assert_eq!(result, HandlerResult::Dispatched);
        assert_eq!(radio.count(CommandKind::Connect).await, 1);
    }

    #[tokio::test]
    async fn test_connect_rejected_on_soft_ap() {
        let (radio, _rx) = LoopbackRadio::manual();
        let command = Command::new(
            SessionId(1),
            CommandPayload::Connect(ConnectRequest {
                ssid: "corp".into(),
                bssid: None,
                channel: 1,
                secured: false,
            }),
        );

        let result = dispatch(
            &ctx(Some((SessionMode::SoftAp, SessionState::Idle))),
            &command,
            &radio,
        )
        .await;
        assert!(matches!(result, HandlerResult::Rejected { .. }));
        assert!(radio.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_roam_requires_connection() {
        let (radio, _rx) = LoopbackRadio::manual();
        let command = Command::new(
            SessionId(1),
            CommandPayload::Roam(RoamRequest {
                bssid: MacAddr([0, 1, 2, 3, 4, 5]),
                channel: 36,
                secured: false,
            }),
        );

        let result = dispatch(
            &ctx(Some((SessionMode::Station, SessionState::Idle))),
            &command,
            &radio,
        )
        .await;
        assert!(matches!(result, HandlerResult::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_when_idle_completes_immediately() {
        let (radio, _rx) = LoopbackRadio::manual();
        let command = Command::new(
            SessionId(1),
            CommandPayload::Disconnect(DisconnectRequest { reason: 3 }),
        );

        let result = dispatch(
            &ctx(Some((SessionMode::Station, SessionState::Idle))),
            &command,
            &radio,
        )
        .await;
        assert!(matches!(result, HandlerResult::Completed { .. }));
        assert_eq!(result.into_status(), Some(CompletionStatus::Success));
        assert!(radio.requests().await.is_empty());
    }

    #[test]
    fn test_into_status() {
        assert_eq!(HandlerResult::Dispatched.into_status(), None);
        assert_eq!(
            HandlerResult::Failed {
                message: "fw busy".into()
            }
            .into_status(),
            Some(CompletionStatus::failed("fw busy"))
        );
    }
}
