//! Single-level DS container model.

use std::path::PathBuf;

use super::parent_dir;

/// Metadata reported by the DS tool's header and content queries.
///
/// All fields reflect the most recent successful info pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdsMetadata {
    pub title: String,
    pub game_code: String,
    pub maker_code: String,
    /// Total size of all content entries, in bytes.
    pub content_size: u64,
    pub secure_area_crc_ok: bool,
    pub decrypted: bool,
    pub header_crc_ok: bool,
}

/// An opened `.nds` container and its derived artifact paths.
///
/// Extraction writes every artifact into `<extract_dir>/<stem>/` in one
/// invocation; rebuild consumes them all in one invocation.
#[derive(Debug, Clone)]
pub struct NdsRom {
    pub source_path: PathBuf,
    pub extract_dir: PathBuf,
    pub metadata: Option<NdsMetadata>,
}

impl NdsRom {
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

    pub fn arm9_bin(&self) -> PathBuf {
        self.content_dir().join("arm9.bin")
    }

    pub fn arm7_bin(&self) -> PathBuf {
        self.content_dir().join("arm7.bin")
    }

    pub fn overlay9_bin(&self) -> PathBuf {
        self.content_dir().join("overlay9.bin")
    }

    pub fn overlay7_bin(&self) -> PathBuf {
        self.content_dir().join("overlay7.bin")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.content_dir().join("data")
    }

    pub fn overlay_dir(&self) -> PathBuf {
        self.content_dir().join("overlay")
    }

    pub fn banner_bin(&self) -> PathBuf {
        self.content_dir().join("banner.bin")
    }

    pub fn header_bin(&self) -> PathBuf {
        self.content_dir().join("header.bin")
    }
}
