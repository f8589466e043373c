//! College Stats — batch driver
//!
//! Runs the single-player fetch once per identifier in an inclusive range,
//! each attempt as its own process with a deadline, retrying per `RetryPolicy`.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod runner;

pub use config::BatchConfig;
pub use error::{BatchError, Result};
pub use orchestrator::{BatchOrchestrator, BatchReport};
pub use policy::{classify_by_kind, AttemptOutcome, Backoff, Disposition, RetryPolicy};
pub use runner::{AttemptRunner, ProcessRunner};
