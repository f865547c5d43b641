//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Local process execution with error handling
//! - `shell` - Shell escaping and quoting
//! - `suggest` - Similar-name suggestions for unknown hosts and tasks
//! - `template` - String template rendering
//! - `validation` - Input validation helpers

pub mod command;
pub mod shell;
pub mod suggest;
pub mod template;
pub mod validation;
