//! Generation job orchestrator for the audio-driven avatar video worker.
//!
//! Validates a generation request, plans the worker invocation (single
//! process or distributed), runs the external inference program and
//! resolves the video it produces. The worker itself is opaque and reached
//! only through [`worker::WorkerRunner`].

pub mod acceleration;
pub mod artifact;
pub mod assets;
pub mod config;
pub mod environment;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod request;
pub mod staging;
pub mod validation;
pub mod worker;

pub use acceleration::AccelerationStatus;
pub use config::OrchestratorConfig;
pub use error::GenerationError;
pub use orchestrator::{JobResult, Orchestrator, SUCCESS_MESSAGE};
pub use request::{GenerationRequest, ModelSize};
