//! Set-key command handler

use super::{HandlerContext, HandlerResult};
use crate::command::KeyRequest;
use crate::lower::LowerLayer;
use tracing::debug;
use wlan_sme_shared::{limits, SessionState};

/// Handle SET_KEY command
pub async fn handle_set_key(
    ctx: &HandlerContext,
    req: &KeyRequest,
    lower: &dyn LowerLayer,
) -> HandlerResult {
    if req.key.is_empty() || req.key.len() > limits::MAX_KEY_LEN {
        return HandlerResult::Rejected {
            message: format!("Invalid key length: {}", req.key.len()),
        };
    }

    let Some(session) = ctx.snapshot else {
        return HandlerResult::Rejected {
            message: format!("Unknown session {}", ctx.session),
        };
    };

    // A station has nobody to share a pairwise key with until it associates.
    // AP roles install keys for their own clients at any time.
    if req.pairwise && session.mode.is_client() && session.state == SessionState::Idle {
        return HandlerResult::Rejected {
            message: "No association for pairwise key".into(),
        };
    }

    debug!(
        "[SET_KEY] {} idx={} pairwise={} peer={} final={}",
        ctx.session, req.key_index, req.pairwise, req.peer, req.completes_handshake
    );

    match lower.set_key(ctx.session, req).await {
        Ok(()) => HandlerResult::Dispatched,
        Err(e) => HandlerResult::Failed {
            message: format!("Failed to install key: {}", e),
        },
    }
}
