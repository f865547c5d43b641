// Public modules
pub mod accounts;
pub mod error;
pub mod hosts;
pub mod output;
pub mod registry;
pub mod resolve;
pub mod session;
pub mod settings;
pub mod ssh;
pub mod tasks;
pub mod transport;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use output::{Outcome, StepKind, StepRecord, TaskReport};
