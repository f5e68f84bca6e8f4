//! Parser for the 3DS container inspector's textual output.
//!
//! Recognized lines carry a fixed field label (`Title:`, `Media size:`,
//! ...); sizes are hexadecimal with an optional `0x` prefix. Region-size
//! markers may be absent entirely (a manual-only sub-container has no
//! ExeFS), in which case the size is zero.

use crate::error::{Result, WorkflowError};
use crate::rom::ThreeDsMetadata;

/// Parses the container info query output into a complete metadata record.
pub fn parse_container_info(lines: &[String]) -> Result<ThreeDsMetadata> {
    let stage = "3DS container info";

    let mut title = None;
    let mut product_code = None;
    let mut maker_code = None;
    let mut content_size = None;
    let mut exheader_size = 0;
    let mut plain_size = 0;
    let mut logo_size = 0;
    let mut exefs_size = 0;
    let mut romfs_size = 0;

    for line in lines {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Title:") {
            title = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Product code:") {
            product_code = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Maker code:") {
            maker_code = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Media size:") {
            content_size = parse_hex(value);
        } else if let Some(value) = line.strip_prefix("Exheader size:") {
            exheader_size = parse_hex(value).unwrap_or(0);
        } else if let Some(value) = line.strip_prefix("Plain region size:") {
            plain_size = parse_hex(value).unwrap_or(0);
        } else if let Some(value) = line.strip_prefix("Logo size:") {
            logo_size = parse_hex(value).unwrap_or(0);
        } else if let Some(value) = line.strip_prefix("ExeFS size:") {
            exefs_size = parse_hex(value).unwrap_or(0);
        } else if let Some(value) = line.strip_prefix("RomFS size:") {
            romfs_size = parse_hex(value).unwrap_or(0);
        }
    }

    Ok(ThreeDsMetadata {
        title: title.ok_or(WorkflowError::ParseFailed { stage })?,
        product_code: product_code.ok_or(WorkflowError::ParseFailed { stage })?,
        maker_code: maker_code.ok_or(WorkflowError::ParseFailed { stage })?,
        content_size: content_size.ok_or(WorkflowError::ParseFailed { stage })?,
        exheader_size,
        plain_size,
        logo_size,
        exefs_size,
        romfs_size,
    })
}

fn parse_hex(value: &str) -> Option<u64> {
    let token = value.split_whitespace().next()?;
    let digits = token.strip_prefix("0x").unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}
