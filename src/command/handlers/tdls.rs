//! TDLS command handler

use super::{HandlerContext, HandlerResult};
use crate::command::TdlsRequest;
use crate::lower::LowerLayer;
use tracing::debug;
use wlan_sme_shared::{MacAddr, SessionState};

/// Handle TDLS_OP command
///
/// TDLS links hang off an infrastructure association, so the session must
/// be a connected client.
pub async fn handle_tdls(
    ctx: &HandlerContext,
    req: &TdlsRequest,
    lower: &dyn LowerLayer,
) -> HandlerResult {
    let Some(session) = ctx.snapshot else {
        return HandlerResult::Rejected {
            message: format!("Unknown session {}", ctx.session),
        };
    };

    if !session.mode.is_client() {
        return HandlerResult::Rejected {
            message: format!("TDLS not supported on {} session", session.mode),
        };
    }

    if session.state != SessionState::Connected {
        return HandlerResult::Rejected {
            message: format!("Not connected (state: {})", session.state),
        };
    }

    if req.peer.is_zero() || req.peer == MacAddr::BROADCAST {
        return HandlerResult::Rejected {
            message: format!("Invalid TDLS peer {}", req.peer),
        };
    }

    debug!("[TDLS] {} {:?} peer={}", ctx.session, req.action, req.peer);

    match lower.tdls(ctx.session, req).await {
        Ok(()) => HandlerResult::Dispatched,
        Err(e) => HandlerResult::Failed {
            message: format!("TDLS {:?} failed: {}", req.action, e),
        },
    }
}
