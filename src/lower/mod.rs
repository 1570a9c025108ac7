//! Lower-layer seam
//!
//! The scheduler hands every dispatched command to a `LowerLayer`, which
//! forwards it to firmware and reports the result later through
//! `Scheduler::on_completion`.

mod loopback;
mod traits;

pub use loopback::{CompletionEvent, CompletionReceiver, LoopbackConfig, LoopbackRadio, RadioRequest};
pub use traits::LowerLayer;
