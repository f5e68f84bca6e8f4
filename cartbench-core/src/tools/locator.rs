//! One-time resolution of external tool binaries.
//!
//! Each tool is looked up once, at startup or first use, and the result is
//! cached for the process lifetime. A tool that cannot be found is not an
//! error here: it surfaces as [`WorkflowError::ToolUnavailable`] from every
//! operation that needs it, and as a permanently-disabled readiness flag.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{Result, WorkflowError};

use super::types::ToolId;

/// Cached locations of the external tool binaries.
#[derive(Debug, Clone)]
pub struct ToolBox {
    paths: HashMap<ToolId, PathBuf>,
}

impl ToolBox {
    /// Resolves every known tool, preferring explicit paths from settings
    /// over a PATH lookup.
    pub fn locate(settings: &Settings) -> Self {
        let mut paths = HashMap::new();
        for &tool in ToolId::all() {
            match resolve(tool, settings) {
                Some(path) => {
                    info!(tool = %tool, path = %path.display(), "located external tool");
                    paths.insert(tool, path);
                }
                None => {
                    warn!(tool = %tool, "external tool not found; dependent operations stay disabled");
                }
            }
        }
        Self { paths }
    }

    /// Returns the resolved binary path for `tool`.
    pub fn path(&self, tool: ToolId) -> Result<&Path> {
        self.paths
            .get(&tool)
            .map(PathBuf::as_path)
            .ok_or(WorkflowError::ToolUnavailable { tool })
    }

    /// True if `tool` was located.
    pub fn is_available(&self, tool: ToolId) -> bool {
        self.paths.contains_key(&tool)
    }

    /// Builds a tool box from fixed paths (for tests).
    #[cfg(test)]
    pub fn with_paths(paths: HashMap<ToolId, PathBuf>) -> Self {
        Self { paths }
    }
}

fn resolve(tool: ToolId, settings: &Settings) -> Option<PathBuf> {
    if let Some(configured) = settings.tool_paths.get(&tool) {
        if configured.is_file() {
            return Some(configured.clone());
        }
        warn!(
            tool = %tool,
            path = %configured.display(),
            "configured tool path does not exist; falling back to PATH lookup"
        );
    }
    which::which(tool.as_str()).ok()
}
