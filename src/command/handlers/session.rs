//! Session lifecycle handlers (add, delete)

use super::{HandlerContext, HandlerResult};
use crate::command::AddSessionRequest;
use crate::lower::LowerLayer;
use tracing::info;

/// Handle ADD_SESSION command
pub async fn handle_add_session(
    ctx: &HandlerContext,
    req: &AddSessionRequest,
    lower: &dyn LowerLayer,
) -> HandlerResult {
    if ctx.snapshot.is_some() {
        return HandlerResult::Rejected {
            message: format!("{} already exists", ctx.session),
        };
    }

    if req.mac.is_zero() {
        return HandlerResult::Rejected {
            message: "Missing interface address".into(),
        };
    }

    info!("[ADD_SESSION] {} as {} ({})", ctx.session, req.mode, req.mac);

    match lower.add_session(ctx.session, req).await {
        Ok(()) => HandlerResult::Dispatched,
        Err(e) => HandlerResult::Failed {
            message: format!("Failed to add session: {}", e),
        },
    }
}

/// Handle DELETE_SESSION command
pub async fn handle_delete_session(ctx: &HandlerContext, lower: &dyn LowerLayer) -> HandlerResult {
    if ctx.snapshot.is_none() {
        return HandlerResult::Completed {
            message: format!("{} not registered", ctx.session),
        };
    }

    info!("[DELETE_SESSION] {}", ctx.session);

    match lower.delete_session(ctx.session).await {
        Ok(()) => HandlerResult::Dispatched,
        Err(e) => HandlerResult::Failed {
            message: format!("Failed to delete session: {}", e),
        },
    }
}
