//! External tool infrastructure.
//!
//! - `types`: identifiers for the codec tool binaries
//! - `locator`: one-time binary resolution (`ToolBox`)
//! - `runner`: async subprocess execution and output capture

pub mod locator;
pub mod runner;
pub mod types;

pub use locator::ToolBox;
pub use runner::{ConsoleEncoding, Invocation, ProcessRunner, SystemRunner};
pub use types::ToolId;
