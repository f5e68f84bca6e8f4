//! Operation readiness: which operations are currently legal for a model.
//!
//! Readiness is recomputed after every completed operation from the
//! container format, tool availability, current metadata, and the nested
//! stage flags. An operation whose flag is off is rejected before any
//! process is spawned.

use std::collections::HashSet;
use std::fmt;

use crate::rom::{Rom, RomFormat};
use crate::tools::{ToolBox, ToolId};

// ============================================================================
// Operations
// ============================================================================

/// Every operation the coordinator exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Info,
    // Single-level container.
    Extract,
    Rebuild,
    Decrypt,
    EncryptNintendo,
    EncryptOthers,
    FixHeaderCrc,
    // Nested container, extraction chain (outer -> inner -> leaf).
    ExtractOuter,
    ExtractInner,
    ExtractExefs,
    ExtractRomfs,
    ExtractAll,
    // Nested container, rebuild chain (leaf -> inner -> outer).
    RebuildExefs,
    RebuildRomfs,
    RebuildInner,
    RebuildOuter,
    RebuildAll,
    // Whole-container size operations.
    Trim,
    Pad,
    // Format conversion, independent of the stage chain.
    Convert,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Extract => "extract",
            Self::Rebuild => "rebuild",
            Self::Decrypt => "decrypt",
            Self::EncryptNintendo => "encrypt-nintendo",
            Self::EncryptOthers => "encrypt-others",
            Self::FixHeaderCrc => "fix-header-crc",
            Self::ExtractOuter => "extract-outer",
            Self::ExtractInner => "extract-inner",
            Self::ExtractExefs => "extract-exefs",
            Self::ExtractRomfs => "extract-romfs",
            Self::ExtractAll => "extract-all",
            Self::RebuildExefs => "rebuild-exefs",
            Self::RebuildRomfs => "rebuild-romfs",
            Self::RebuildInner => "rebuild-inner",
            Self::RebuildOuter => "rebuild-outer",
            Self::RebuildAll => "rebuild-all",
            Self::Trim => "trim",
            Self::Pad => "pad",
            Self::Convert => "convert",
        }
    }

    /// Status-bar text shown while the operation runs.
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::Info => "Analyzing...",
            Self::Extract
            | Self::ExtractOuter
            | Self::ExtractInner
            | Self::ExtractExefs
            | Self::ExtractRomfs
            | Self::ExtractAll => "Extracting...",
            Self::Rebuild
            | Self::RebuildExefs
            | Self::RebuildRomfs
            | Self::RebuildInner
            | Self::RebuildOuter
            | Self::RebuildAll => "Rebuilding...",
            Self::Decrypt => "Decrypting...",
            Self::EncryptNintendo => "Encrypting (Nintendo)...",
            Self::EncryptOthers => "Encrypting (others)...",
            Self::FixHeaderCrc => "Fixing Header CRC...",
            Self::Trim => "Trimming...",
            Self::Pad => "Padding...",
            Self::Convert => "Converting...",
        }
    }

    /// The tool binary the operation drives for a given format.
    pub fn required_tool(&self, format: RomFormat) -> ToolId {
        match format {
            RomFormat::Nds => ToolId::Ndstool,
            RomFormat::ThreeDs => match self {
                Self::Info => ToolId::CtrTool,
                Self::Convert => ToolId::ThreeDsConv,
                _ => ToolId::ThreeDsTool,
            },
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Nested Stage Flags
// ============================================================================

/// Which extraction stages of the nested format have succeeded in this
/// session, relative to the last change at the enclosing level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageFlags {
    /// Outer container split into sub-container files.
    pub outer: bool,
    /// Primary sub-container split into header/region files.
    pub inner: bool,
    /// ExeFS blob split into header plus entry directory.
    pub exefs: bool,
    /// RomFS blob split into its entry directory.
    pub romfs: bool,
}

impl StageFlags {
    /// An outer-level change invalidates everything extracted beneath it.
    pub fn reset_below_outer(&mut self) {
        self.inner = false;
        self.reset_leaves();
    }

    /// An inner-level change invalidates the leaf stages.
    pub fn reset_leaves(&mut self) {
        self.exefs = false;
        self.romfs = false;
    }
}

// ============================================================================
// Readiness
// ============================================================================

/// The set of operations currently legal for one container model.
#[derive(Debug, Clone, Default)]
pub struct OperationReadiness {
    enabled: HashSet<Operation>,
}

impl OperationReadiness {
    /// Recomputes the full set from the current model state.
    ///
    /// `extracted` is the single-level format's "extraction has completed
    /// this session" flag; `stages` are the nested format's chain flags.
    pub fn recompute(rom: &Rom, extracted: bool, stages: StageFlags, tools: &ToolBox) -> Self {
        let mut enabled = HashSet::new();

        match rom {
            Rom::Nds(nds) => {
                if !tools.is_available(ToolId::Ndstool) {
                    return Self { enabled };
                }
                enabled.insert(Operation::Info);
                if let Some(meta) = &nds.metadata {
                    enabled.insert(Operation::Extract);
                    if extracted {
                        enabled.insert(Operation::Rebuild);
                    }
                    if meta.decrypted {
                        enabled.insert(Operation::EncryptNintendo);
                        enabled.insert(Operation::EncryptOthers);
                    } else {
                        enabled.insert(Operation::Decrypt);
                    }
                    if !meta.header_crc_ok {
                        enabled.insert(Operation::FixHeaderCrc);
                    }
                }
            }
            Rom::ThreeDs(threeds) => {
                if tools.is_available(ToolId::CtrTool) {
                    enabled.insert(Operation::Info);
                }
                if tools.is_available(ToolId::ThreeDsTool) {
                    if threeds.metadata.is_some() {
                        enabled.insert(Operation::ExtractOuter);
                        enabled.insert(Operation::ExtractAll);
                        enabled.insert(Operation::Trim);
                        enabled.insert(Operation::Pad);
                    }
                    if stages.outer {
                        enabled.insert(Operation::ExtractInner);
                        enabled.insert(Operation::RebuildOuter);
                        enabled.insert(Operation::RebuildAll);
                    }
                    if stages.inner {
                        enabled.insert(Operation::ExtractExefs);
                        enabled.insert(Operation::ExtractRomfs);
                        enabled.insert(Operation::RebuildInner);
                    }
                    if stages.exefs {
                        enabled.insert(Operation::RebuildExefs);
                    }
                    if stages.romfs {
                        enabled.insert(Operation::RebuildRomfs);
                    }
                }
                if tools.is_available(ToolId::ThreeDsConv) {
                    enabled.insert(Operation::Convert);
                }
            }
        }

        Self { enabled }
    }

    /// True if `op` may currently be invoked.
    pub fn is_enabled(&self, op: Operation) -> bool {
        self.enabled.contains(&op)
    }

    /// Number of currently enabled operations.
    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}
