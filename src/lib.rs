//! Management command scheduler for a multi-interface WLAN radio
//!
//! Producers hand commands to a [`Scheduler`], which keeps at most one
//! general command in flight at the lower layer, runs scans on their own
//! lane, and escalates a lower layer that stops answering.

pub mod command;
pub mod config;
pub mod lower;
pub mod safety;
pub mod session;

pub use command::{CommandHandle, CommandOutcome, CommandPayload, Disposition, QueueStatus, Scheduler, Ticket};
pub use config::SchedulerConfig;
pub use lower::{LoopbackConfig, LoopbackRadio, LowerLayer};
pub use safety::{RecoveryAction, TimeoutMonitor};
