//! Command scheduling
//!
//! This module handles:
//! - The fixed command pool and the four queues that borrow its slots
//! - Dispatching general commands one at a time and scans per session
//! - Routing each command kind to its handler
//! - Completion, abort and purge bookkeeping

mod dispatcher;
pub mod handlers;
mod pool;
mod queue;
mod request;
mod scan;
mod state;
mod timeout;

pub use dispatcher::Scheduler;
pub use pool::{CommandEntry, CommandPool, Membership};
pub use queue::{CommandQueue, QueueSet};
pub use request::{
    AddSessionRequest, Command, CommandHandle, CommandOutcome, CommandPayload, ConnectRequest,
    DisconnectRequest, Disposition, HwMode, HwModeRequest, KeyRequest, RoamRequest, ScanRequest,
    TdlsAction, TdlsRequest, Ticket,
};
pub use state::{QueueEntry, QueueStatus, QueueSummary};
pub use timeout::ActiveTimer;
