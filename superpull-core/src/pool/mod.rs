//! Bounded-concurrency subprocess pool with a timeout watchdog
//!
//! Tasks are admitted in the order given, never more than `throttle` at a
//! time. A slot frees as soon as any running process exits. Progress is
//! reported at a fixed cadence until the timeout, after which every process
//! still running is killed together with its children.

mod spawn;
mod task;
mod throttle;

pub use task::{RunSummary, SyncTask, TaskOutcome, TerminalState};
pub use throttle::ThrottlePool;
