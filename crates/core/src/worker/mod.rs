//! External inference worker.
//!
//! The worker is an opaque program reached through the [`WorkerRunner`]
//! capability. [`ProcessRunner`] is the production implementation; tests
//! substitute their own.

pub mod invoker;
pub mod runner;
pub mod subprocess;

pub use invoker::{ensure_success, invoke};
pub use runner::{RunnerError, WorkerInvocation, WorkerOutput, WorkerRunner};
pub use subprocess::ProcessRunner;
