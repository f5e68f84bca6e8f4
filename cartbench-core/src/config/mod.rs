//! Configuration module for cartbench.
//!
//! Manages application settings persisted as JSON on disk.

mod settings;

pub use settings::{load_settings, save_settings, settings_path, Settings};
