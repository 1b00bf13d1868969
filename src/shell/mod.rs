//! Shell command execution.
//!
//! [`CommandOperation`] is the built-in [`Operation`](crate::steps::Operation)
//! used for steps declared with a `command` in configuration.

pub mod command;
pub mod operation;

pub use command::{execute, CommandOptions, CommandResult};
pub use operation::CommandOperation;
