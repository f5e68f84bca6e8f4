//! Parsers for the DS tool's textual output.
//!
//! Recognized lines begin with a fixed header-offset token (`0x00`,
//! `0x0C`, ...); everything else is ignored. Status flags arrive as
//! parenthesized word groups, e.g. `(OK, decrypted)`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, WorkflowError};
use crate::rom::NdsMetadata;

static PAREN_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*)\)").expect("valid paren regex"));

/// Parses the header info query output into a complete metadata record.
///
/// `content_size` is not part of this query; the caller fills it from the
/// content listing before committing the record to the model.
pub fn parse_header_info(lines: &[String]) -> Result<NdsMetadata> {
    let stage = "DS header info";

    let mut title = None;
    let mut game_code = None;
    let mut maker_code = None;
    let mut secure_area = None;
    let mut header_crc = None;

    for line in lines {
        if line.starts_with("0x15E") {
            header_crc = trimmed_last_token(line);
        } else if line.starts_with("0x00") {
            title = last_token(line).map(str::to_string);
        } else if line.starts_with("0x0C") {
            game_code = trimmed_last_token(line);
        } else if line.starts_with("0x10") {
            maker_code = trimmed_last_token(line);
        } else if line.starts_with("0x6C") {
            secure_area = last_paren_group(line);
        }
    }

    let secure_area = secure_area.ok_or(WorkflowError::ParseFailed { stage })?;
    let mut status_words = secure_area.split(", ");
    let (crc_word, decrypt_word) = match (status_words.next(), status_words.next()) {
        (Some(crc), Some(decrypt)) => (crc, decrypt),
        _ => return Err(WorkflowError::ParseFailed { stage }),
    };

    Ok(NdsMetadata {
        title: title.ok_or(WorkflowError::ParseFailed { stage })?,
        game_code: game_code.ok_or(WorkflowError::ParseFailed { stage })?,
        maker_code: maker_code.ok_or(WorkflowError::ParseFailed { stage })?,
        content_size: 0,
        secure_area_crc_ok: crc_word == "OK",
        decrypted: decrypt_word == "decrypted",
        header_crc_ok: header_crc.as_deref() == Some("OK"),
    })
}

/// Sums the size column across the data rows of the content listing.
///
/// Data rows start with a digit; header and footer rows do not and are
/// skipped.
pub fn parse_content_listing(lines: &[String]) -> Result<u64> {
    let mut total: u64 = 0;
    let mut rows = 0usize;

    for line in lines {
        let line = line.trim_start();
        if !line.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        let Some(size) = line
            .split_whitespace()
            .nth(3)
            .and_then(|field| field.parse::<u64>().ok())
        else {
            continue;
        };
        total += size;
        rows += 1;
    }

    if rows == 0 {
        return Err(WorkflowError::ParseFailed {
            stage: "DS content listing",
        });
    }
    Ok(total)
}

fn last_token(line: &str) -> Option<&str> {
    line.split_whitespace().last()
}

/// Last whitespace token with its surrounding delimiter characters
/// stripped, e.g. `(NTR-AXXE)` -> `NTR-AXXE`.
fn trimmed_last_token(line: &str) -> Option<String> {
    let token = last_token(line)?;
    token.get(1..token.len().checked_sub(1)?).map(str::to_string)
}

fn last_paren_group(line: &str) -> Option<String> {
    PAREN_GROUP
        .captures_iter(line)
        .last()
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_fixture(crc_status: &str, decrypt_status: &str, header_status: &str) -> Vec<String> {
        vec![
            "0x00\tGame title\t\tMYGAME".to_string(),
            "0x0C\tGame code\t\tAXXE (NTR-AXXE)".to_string(),
            "0x10\tMaker code\t\tNintendo (01)".to_string(),
            format!(
                "0x6C\tSecure area CRC\t\t0x0D2E ({}, {})",
                crc_status, decrypt_status
            ),
            format!("0x15E\tHeader CRC\t\t0x9C22 ({})", header_status),
            "some unrelated diagnostic line".to_string(),
        ]
    }

    #[test]
    fn test_parse_header_info() {
        let meta = parse_header_info(&info_fixture("OK", "decrypted", "OK")).unwrap();
        assert_eq!(meta.title, "MYGAME");
        assert_eq!(meta.game_code, "NTR-AXXE");
        assert_eq!(meta.maker_code, "01");
        assert!(meta.secure_area_crc_ok);
        assert!(meta.decrypted);
        assert!(meta.header_crc_ok);
    }

    #[test]
    fn test_parse_header_info_bad_statuses() {
        let meta = parse_header_info(&info_fixture("INVALID", "encrypted", "INVALID")).unwrap();
        assert!(!meta.secure_area_crc_ok);
        assert!(!meta.decrypted);
        assert!(!meta.header_crc_ok);
    }

    #[test]
    fn test_parse_header_info_missing_markers_fails() {
        let lines = vec!["nothing useful here".to_string()];
        assert!(matches!(
            parse_header_info(&lines),
            Err(WorkflowError::ParseFailed { .. })
        ));
    }

    #[test]
    fn test_parse_header_info_malformed_status_group_fails() {
        let mut lines = info_fixture("OK", "decrypted", "OK");
        lines[3] = "0x6C\tSecure area CRC\t\t0x0D2E (OK)".to_string();
        assert!(parse_header_info(&lines).is_err());
    }

    #[test]
    fn test_parse_content_listing_sums_data_rows() {
        let lines: Vec<String> = vec![
            "file_id  offset  end  size  name".to_string(),
            "0\t0x8000\t0x9000\t4096\tsound/bgm.sdat".to_string(),
            "1\t0x9000\t0x9800\t2048\tgraphics/ui.ncgr".to_string(),
            "Total 2 entries".to_string(),
        ];
        assert_eq!(parse_content_listing(&lines).unwrap(), 6144);
    }

    #[test]
    fn test_parse_content_listing_without_rows_fails() {
        let lines = vec!["no table here".to_string()];
        assert!(matches!(
            parse_content_listing(&lines),
            Err(WorkflowError::ParseFailed { .. })
        ));
    }
}
