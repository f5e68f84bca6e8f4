//! In-memory container models.
//!
//! A [`Rom`] is created when the caller opens a file and classifies it by
//! extension. Metadata stays empty until the first successful info query
//! and is refreshed after every mutating operation. Artifact paths are
//! pure functions of the source path, the extract directory, and the
//! format; they are never stored or independently mutated.

mod nds;
mod threeds;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub use nds::{NdsMetadata, NdsRom};
pub use threeds::{ThreeDsMetadata, ThreeDsRom};

/// Container format tag, fixed at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RomFormat {
    /// Single-level DS container.
    Nds,
    /// Multi-level 3DS container.
    ThreeDs,
}

/// An opened ROM container.
#[derive(Debug, Clone)]
pub enum Rom {
    Nds(NdsRom),
    ThreeDs(ThreeDsRom),
}

impl Rom {
    /// Classifies a file by extension and builds its model. Returns `None`
    /// for extensions this core does not manage.
    pub fn open(path: impl Into<PathBuf>) -> Option<Rom> {
        let path = path.into();
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "nds" => Some(Rom::Nds(NdsRom::new(path))),
            "3ds" | "cci" => Some(Rom::ThreeDs(ThreeDsRom::new(path))),
            _ => None,
        }
    }

    pub fn format(&self) -> RomFormat {
        match self {
            Rom::Nds(_) => RomFormat::Nds,
            Rom::ThreeDs(_) => RomFormat::ThreeDs,
        }
    }

    pub fn source_path(&self) -> &Path {
        match self {
            Rom::Nds(rom) => &rom.source_path,
            Rom::ThreeDs(rom) => &rom.source_path,
        }
    }

    pub fn extract_dir(&self) -> &Path {
        match self {
            Rom::Nds(rom) => &rom.extract_dir,
            Rom::ThreeDs(rom) => &rom.extract_dir,
        }
    }

    /// Redirects the directory derived artifacts are written under.
    pub fn set_extract_dir(&mut self, dir: PathBuf) {
        match self {
            Rom::Nds(rom) => rom.extract_dir = dir,
            Rom::ThreeDs(rom) => rom.extract_dir = dir,
        }
    }

    /// True once an info query has populated metadata.
    pub fn info_known(&self) -> bool {
        match self {
            Rom::Nds(rom) => rom.metadata.is_some(),
            Rom::ThreeDs(rom) => rom.metadata.is_some(),
        }
    }

    /// Sibling path the original file is backed up to before in-place
    /// mutation: the full file name plus an `.old` suffix.
    pub fn backup_path(&self) -> PathBuf {
        backup_sibling(self.source_path())
    }
}

/// `<name>.<ext>.old` sibling of a source file.
pub(crate) fn backup_sibling(source: &Path) -> PathBuf {
    let mut name = source
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("rom"));
    name.push(".old");
    source.with_file_name(name)
}

pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
