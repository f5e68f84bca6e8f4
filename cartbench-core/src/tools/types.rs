//! Identifiers for the external codec tools.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for each external tool the core drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolId {
    /// ndstool - single-level DS container codec.
    #[serde(rename = "ndstool")]
    Ndstool,
    /// 3dstool - nested 3DS container codec (split/rebuild).
    #[serde(rename = "3dstool")]
    ThreeDsTool,
    /// ctrtool - 3DS container inspector.
    #[serde(rename = "ctrtool")]
    CtrTool,
    /// 3dsconv - 3DS to CIA converter.
    #[serde(rename = "3dsconv")]
    ThreeDsConv,
}

impl ToolId {
    /// Returns all known tool IDs.
    pub fn all() -> &'static [ToolId] {
        &[
            Self::Ndstool,
            Self::ThreeDsTool,
            Self::CtrTool,
            Self::ThreeDsConv,
        ]
    }

    /// Returns the binary name for this tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ndstool => "ndstool",
            Self::ThreeDsTool => "3dstool",
            Self::CtrTool => "ctrtool",
            Self::ThreeDsConv => "3dsconv",
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ndstool" => Ok(Self::Ndstool),
            "3dstool" => Ok(Self::ThreeDsTool),
            "ctrtool" => Ok(Self::CtrTool),
            "3dsconv" => Ok(Self::ThreeDsConv),
            _ => Err(format!("Unknown tool: {}", s)),
        }
    }
}
