//! Session tracking for command eligibility
//!
//! This module handles:
//! - Registering and removing logical interfaces (sessions)
//! - Folding command completions into each session's link state
//! - Deciding whether a pending command may be dispatched for its session

mod eligibility;
mod registry;

pub use eligibility::{check as check_eligibility, Eligibility};
pub use registry::{SessionEffect, SessionEntry, SessionRegistry, SessionSnapshot};
