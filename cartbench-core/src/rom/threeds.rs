//! Nested 3DS container model.
//!
//! The outer container splits into up to three sub-containers; the primary
//! sub-container splits into header and region files, two of which (ExeFS,
//! RomFS) are filesystem-like blobs that split further into a header plus a
//! directory of entries.

use std::path::PathBuf;

use super::parent_dir;

/// Metadata reported by the 3DS container inspector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreeDsMetadata {
    pub title: String,
    pub product_code: String,
    pub maker_code: String,
    /// Media size in bytes.
    pub content_size: u64,
    pub exheader_size: u64,
    pub plain_size: u64,
    pub logo_size: u64,
    pub exefs_size: u64,
    pub romfs_size: u64,
}

/// An opened `.3ds`/`.cci` container and its derived artifact paths.
#[derive(Debug, Clone)]
pub struct ThreeDsRom {
    pub source_path: PathBuf,
    pub extract_dir: PathBuf,
    pub metadata: Option<ThreeDsMetadata>,
}

impl ThreeDsRom {
    pub fn new(source_path: PathBuf) -> Self {
        let extract_dir = parent_dir(&source_path);
        Self {
            source_path,
            extract_dir,
            metadata: None,
        }
    }

    /// Directory all extracted artifacts live under.
    pub fn content_dir(&self) -> PathBuf {
        self.extract_dir
            .join(self.source_path.file_stem().unwrap_or_default())
    }

    // Outer container artifacts.

    pub fn ncsd_header(&self) -> PathBuf {
        self.content_dir().join("ncsd.header")
    }

    /// Primary sub-container (the game executable image).
    pub fn partition0(&self) -> PathBuf {
        self.content_dir().join("game.cxi")
    }

    pub fn partition1(&self) -> PathBuf {
        self.content_dir().join("manual.cfa")
    }

    pub fn partition2(&self) -> PathBuf {
        self.content_dir().join("download.cfa")
    }

    // Inner (primary sub-container) artifacts.

    pub fn ncch_header(&self) -> PathBuf {
        self.content_dir().join("ncch.header")
    }

    pub fn exheader_bin(&self) -> PathBuf {
        self.content_dir().join("exheader.bin")
    }

    pub fn plain_bin(&self) -> PathBuf {
        self.content_dir().join("plain.bin")
    }

    pub fn logo_bin(&self) -> PathBuf {
        self.content_dir().join("logo.bin")
    }

    pub fn exefs_bin(&self) -> PathBuf {
        self.content_dir().join("exefs.bin")
    }

    pub fn romfs_bin(&self) -> PathBuf {
        self.content_dir().join("romfs.bin")
    }

    // Leaf (filesystem blob) artifacts.

    pub fn exefs_header(&self) -> PathBuf {
        self.content_dir().join("exefs.header")
    }

    pub fn exefs_dir(&self) -> PathBuf {
        self.content_dir().join("exefs")
    }

    pub fn romfs_dir(&self) -> PathBuf {
        self.content_dir().join("romfs")
    }
}
