//! Fault containment
//!
//! Watches the active general command for a wedged lower layer and keeps a
//! short history of dispatched commands for diagnosing it.

mod monitor;
mod recovery;

pub use monitor::{MonitorHandle, RecoveryAction, TimeoutMonitor};
pub use recovery::{ReasonCode, RecoveryEntry, SelfRecoveryLog, SelfRecoveryStats};
