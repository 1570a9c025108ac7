//! Scan command handler

use super::{HandlerContext, HandlerResult};
use crate::command::ScanRequest;
use crate::lower::LowerLayer;
use tracing::debug;
use wlan_sme_shared::limits;

/// Handle SCAN command
///
/// Scans are accepted for any session, registered or not: the radio can
/// scan on behalf of an interface that is still being brought up.
pub async fn handle_scan(
    ctx: &HandlerContext,
    req: &ScanRequest,
    lower: &dyn LowerLayer,
) -> HandlerResult {
    if req.ssids.len() > limits::MAX_SCAN_SSIDS {
        return HandlerResult::Rejected {
            message: format!(
                "Too many SSIDs: {} (max {})",
                req.ssids.len(),
                limits::MAX_SCAN_SSIDS
            ),
        };
    }

    if req.channels.len() > limits::MAX_SCAN_CHANNELS {
        return HandlerResult::Rejected {
            message: format!(
                "Too many channels: {} (max {})",
                req.channels.len(),
                limits::MAX_SCAN_CHANNELS
            ),
        };
    }

    debug!(
        "[SCAN] {} ssids={} channels={} passive={}",
        ctx.session,
        req.ssids.len(),
        req.channels.len(),
        req.passive
    );

    match lower.start_scan(ctx.session, req).await {
        Ok(()) => HandlerResult::Dispatched,
        Err(e) => HandlerResult::Failed {
            message: format!("Failed to start scan: {}", e),
        },
    }
}
