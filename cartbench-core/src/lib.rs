//! cartbench Core Library
//!
//! This crate provides the core functionality for cartbench, a workbench
//! for console ROM containers. It drives the external codec tools
//! (`ndstool`, `3dstool`, `ctrtool`, `3dsconv`) and includes:
//!
//! - Tool discovery with per-tool path overrides
//! - Async subprocess execution with configurable console-output decoding
//! - Marker-driven parsers for each tool's diagnostic output
//! - Container models for the single-level DS and nested 3DS formats
//! - A per-container workflow coordinator enforcing stage ordering,
//!   operation readiness, once-only source backups, and the
//!   one-mutating-operation-at-a-time rule
//! - A status event channel for the presentation layer
//!
//! The GUI that consumes this crate subscribes to the event channel and
//! renders readiness flags; nothing here depends on it.

pub mod config;
pub mod error;
pub mod parse;
pub mod rom;
pub mod tools;
pub mod workflow;

// Re-exports for convenience
pub use config::{load_settings, save_settings, settings_path, Settings};
pub use error::{Result, WorkflowError};
pub use rom::{NdsMetadata, NdsRom, Rom, RomFormat, ThreeDsMetadata, ThreeDsRom};
pub use tools::{ConsoleEncoding, Invocation, ProcessRunner, SystemRunner, ToolBox, ToolId};
pub use workflow::{
    event_channel, EventReceiver, EventSender, Operation, OperationReadiness, StageFlags,
    Workflow, WorkflowEvent,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
