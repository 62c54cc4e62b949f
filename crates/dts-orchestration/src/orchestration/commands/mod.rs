//! Command types for the orchestration processor.

pub mod types;

pub use types::{CommandResponder, OrchestrationCommand};
