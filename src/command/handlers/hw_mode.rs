//! Hardware mode change handler

use super::{HandlerContext, HandlerResult};
use crate::command::HwModeRequest;
use crate::lower::LowerLayer;
use tracing::info;

/// Handle HW_MODE_CHANGE command
///
/// Affects the whole radio; the session only identifies the requester.
pub async fn handle_hw_mode_change(
    ctx: &HandlerContext,
    req: &HwModeRequest,
    lower: &dyn LowerLayer,
) -> HandlerResult {
    info!("[HW_MODE] {:?} requested by {}", req.mode, ctx.session);

    match lower.set_hw_mode(ctx.session, req).await {
        Ok(()) => HandlerResult::Dispatched,
        Err(e) => HandlerResult::Failed {
            message: format!("Failed to change hardware mode: {}", e),
        },
    }
}
