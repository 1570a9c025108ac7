//! Link command handlers (connect, roam, disconnect)

use super::{HandlerContext, HandlerResult};
use crate::command::{ConnectRequest, DisconnectRequest, RoamRequest};
use crate::lower::LowerLayer;
use tracing::{debug, info};
use wlan_sme_shared::SessionState;

/// Handle CONNECT command
pub async fn handle_connect(
    ctx: &HandlerContext,
    req: &ConnectRequest,
    lower: &dyn LowerLayer,
) -> HandlerResult {
    let Some(session) = ctx.snapshot else {
        return HandlerResult::Rejected {
            message: format!("Unknown session {}", ctx.session),
        };
    };

    if !session.mode.is_client() {
        return HandlerResult::Rejected {
            message: format!("Connect not supported on {} session", session.mode),
        };
    }

    match session.state {
        SessionState::Idle => {}
        SessionState::WaitingForKey | SessionState::Connected => {
            return HandlerResult::Rejected {
                message: format!("Already associated (state: {})", session.state),
            };
        }
    }

    if req.ssid.is_empty() {
        return HandlerResult::Rejected {
            message: "Missing SSID".into(),
        };
    }

    info!(
        "[CONNECT] {} -> '{}' channel {} secured={}",
        ctx.session, req.ssid, req.channel, req.secured
    );
    if let Some(bssid) = req.bssid {
        debug!("    Pinned BSSID: {}", bssid);
    }

    match lower.connect(ctx.session, req).await {
        Ok(()) => HandlerResult::Dispatched,
        Err(e) => HandlerResult::Failed {
            message: format!("Failed to connect: {}", e),
        },
    }
}

/// Handle ROAM command
pub async fn handle_roam(
    ctx: &HandlerContext,
    req: &RoamRequest,
    lower: &dyn LowerLayer,
) -> HandlerResult {
    let Some(session) = ctx.snapshot else {
        return HandlerResult::Rejected {
            message: format!("Unknown session {}", ctx.session),
        };
    };

    // Roaming only makes sense from a live link
    if session.state != SessionState::Connected {
        return HandlerResult::Rejected {
            message: format!("Not connected (state: {})", session.state),
        };
    }

    if req.bssid.is_zero() {
        return HandlerResult::Rejected {
            message: "Missing roam target BSSID".into(),
        };
    }

    info!(
        "[ROAM] {} -> {} channel {}",
        ctx.session, req.bssid, req.channel
    );

    match lower.roam(ctx.session, req).await {
        Ok(()) => HandlerResult::Dispatched,
        Err(e) => HandlerResult::Failed {
            message: format!("Failed to roam: {}", e),
        },
    }
}

/// Handle DISCONNECT command
///
/// Disconnect is accepted in every state, including key exchange.
pub async fn handle_disconnect(
    ctx: &HandlerContext,
    req: &DisconnectRequest,
    lower: &dyn LowerLayer,
) -> HandlerResult {
    let Some(session) = ctx.snapshot else {
        return HandlerResult::Completed {
            message: format!("{} not registered, nothing to disconnect", ctx.session),
        };
    };

    if session.state == SessionState::Idle {
        return HandlerResult::Completed {
            message: "Already disconnected".into(),
        };
    }

    info!(
        "[DISCONNECT] {} reason={} (state: {})",
        ctx.session, req.reason, session.state
    );

    match lower.disconnect(ctx.session, req).await {
        Ok(()) => HandlerResult::Dispatched,
        Err(e) => HandlerResult::Failed {
            message: format!("Failed to disconnect: {}", e),
        },
    }
}
