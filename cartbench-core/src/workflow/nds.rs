//! Operations on the single-level DS container.
//!
//! Extraction regenerates all derived artifacts together in one
//! invocation and rebuild consumes them all together in one invocation;
//! there is no intermediate staging. Operations that rewrite the source
//! in place (rebuild, the crypto operations, the header CRC fix) take the
//! once-only backup first and re-query info afterwards.

use std::ffi::OsString;

use crate::error::Result;
use crate::parse;
use crate::rom::{NdsRom, Rom};
use crate::tools::ToolId;

use super::{os, Operation, Workflow};

impl Workflow {
    /// Extracts every derived artifact of the DS container.
    pub async fn extract(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::Extract).await?;
        let result = async {
            let rom = self.nds_snapshot().await?;
            tokio::fs::create_dir_all(rom.content_dir()).await?;
            let mut args = vec![os("-x"), rom.source_path.clone().into_os_string()];
            args.extend(artifact_args(&rom));
            self.run_tool(ToolId::Ndstool, args).await?;
            self.state.lock().await.extracted = true;
            self.refresh_nds_info().await
        }
        .await;
        self.conclude(Operation::Extract, result).await
    }

    /// Rebuilds the DS container in place from the extracted artifacts.
    pub async fn rebuild(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::Rebuild).await?;
        let result = async {
            let rom = self.nds_snapshot().await?;
            self.ensure_backup(&rom.source_path).await?;
            let mut args = vec![os("-c"), rom.source_path.clone().into_os_string()];
            args.extend(artifact_args(&rom));
            self.run_tool(ToolId::Ndstool, args).await?;
            self.refresh_nds_info().await
        }
        .await;
        self.conclude(Operation::Rebuild, result).await
    }

    /// Decrypts the secure area in place.
    pub async fn decrypt(&self) -> Result<()> {
        self.in_place_op(Operation::Decrypt, "-sd").await
    }

    /// Re-encrypts the secure area with the Nintendo key schedule.
    pub async fn encrypt_nintendo(&self) -> Result<()> {
        self.in_place_op(Operation::EncryptNintendo, "-se").await
    }

    /// Re-encrypts the secure area for non-Nintendo loaders.
    pub async fn encrypt_others(&self) -> Result<()> {
        self.in_place_op(Operation::EncryptOthers, "-sE").await
    }

    /// Recomputes and rewrites the header checksum.
    pub async fn fix_header_crc(&self) -> Result<()> {
        self.in_place_op(Operation::FixHeaderCrc, "-f").await
    }

    /// Single-flag in-place rewrite of the source file.
    async fn in_place_op(&self, op: Operation, flag: &str) -> Result<()> {
        let _guard = self.start_mutating(op).await?;
        let result = async {
            let rom = self.nds_snapshot().await?;
            self.ensure_backup(&rom.source_path).await?;
            self.run_tool(
                ToolId::Ndstool,
                vec![os(flag), rom.source_path.clone().into_os_string()],
            )
            .await?;
            self.refresh_nds_info().await
        }
        .await;
        self.conclude(op, result).await
    }

    /// Runs the header query plus the content listing and commits the
    /// combined record. Nothing is committed unless both parses succeed.
    pub(super) async fn refresh_nds_info(&self) -> Result<()> {
        let rom = self.nds_snapshot().await?;
        let source = rom.source_path.clone().into_os_string();

        let header = self
            .run_tool(ToolId::Ndstool, vec![os("-i"), source.clone()])
            .await?;
        let mut meta = parse::nds::parse_header_info(&header.lines)?;

        let listing = self.run_tool(ToolId::Ndstool, vec![os("-l"), source]).await?;
        meta.content_size = parse::nds::parse_content_listing(&listing.lines)?;

        if let Rom::Nds(rom) = &mut self.state.lock().await.rom {
            rom.metadata = Some(meta);
        }
        Ok(())
    }
}

fn artifact_args(rom: &NdsRom) -> Vec<OsString> {
    vec![
        os("-9"),
        rom.arm9_bin().into_os_string(),
        os("-7"),
        rom.arm7_bin().into_os_string(),
        os("-y9"),
        rom.overlay9_bin().into_os_string(),
        os("-y7"),
        rom.overlay7_bin().into_os_string(),
        os("-d"),
        rom.data_dir().into_os_string(),
        os("-y"),
        rom.overlay_dir().into_os_string(),
        os("-t"),
        rom.banner_bin().into_os_string(),
        os("-h"),
        rom.header_bin().into_os_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use super::*;
    use crate::error::WorkflowError;
    use crate::workflow::{event_channel, WorkflowEvent};
    use crate::tools::ToolBox;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_info_populates_metadata() {
        let (_dir, path) = temp_source("nds");
        let runner = FakeRunner::new();
        let (workflow, mut rx) = workflow(&path, runner.clone());

        queue_nds_info(&runner, true, true);
        workflow.info().await.unwrap();

        let Rom::Nds(nds) = workflow.rom().await else {
            panic!("expected a DS model");
        };
        let meta = nds.metadata.unwrap();
        assert_eq!(meta.title, "MYGAME");
        assert_eq!(meta.game_code, "NTR-AXXE");
        assert_eq!(meta.maker_code, "01");
        assert_eq!(meta.content_size, 6144);
        assert!(meta.secure_area_crc_ok);
        assert!(meta.decrypted);
        assert!(meta.header_crc_ok);

        assert_eq!(
            drain(&mut rx),
            vec![
                WorkflowEvent::Busy("Analyzing...".to_string()),
                WorkflowEvent::Ready,
            ]
        );

        let ready = workflow.readiness().await;
        assert!(ready.is_enabled(Operation::Extract));
        assert!(!ready.is_enabled(Operation::Rebuild));
        assert!(!ready.is_enabled(Operation::FixHeaderCrc));
        assert!(!ready.is_enabled(Operation::Decrypt));
        assert!(ready.is_enabled(Operation::EncryptNintendo));
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_previous_metadata() {
        let (_dir, path) = temp_source("nds");
        let runner = FakeRunner::new();
        let (workflow, mut rx) = workflow(&path, runner.clone());

        queue_nds_info(&runner, true, true);
        workflow.info().await.unwrap();

        runner.push_ok(vec!["complete garbage".to_string()]);
        let err = workflow.info().await.unwrap_err();
        assert!(matches!(err, WorkflowError::ParseFailed { .. }));

        let Rom::Nds(nds) = workflow.rom().await else {
            panic!("expected a DS model");
        };
        assert_eq!(nds.metadata.unwrap().title, "MYGAME");

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(WorkflowEvent::Error(_))));
    }

    #[tokio::test]
    async fn test_process_failure_surfaces_exit_code() {
        let (_dir, path) = temp_source("nds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());

        runner.push_exit(2);
        let err = workflow.info().await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ProcessFailed { code: Some(2) }
        ));
        assert!(!workflow.rom().await.info_known());
    }

    #[tokio::test]
    async fn test_extract_enables_rebuild() {
        let (_dir, path) = temp_source("nds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());

        queue_nds_info(&runner, true, true);
        workflow.info().await.unwrap();

        runner.push_ok(Vec::new()); // the split itself
        queue_nds_info(&runner, true, true); // info refresh
        workflow.extract().await.unwrap();

        assert!(workflow.readiness().await.is_enabled(Operation::Rebuild));

        let calls = runner.calls();
        let (_, extract_args) = &calls[2];
        assert_eq!(extract_args[0], os("-x"));
        assert!(extract_args.contains(&os("-9")));
        assert!(extract_args
            .iter()
            .any(|arg| arg.to_string_lossy().ends_with("arm9.bin")));
    }

    #[tokio::test]
    async fn test_rebuild_never_overwrites_existing_backup() {
        let (_dir, path) = temp_source("nds");
        let backup = crate::rom::backup_sibling(&path);
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());

        queue_nds_info(&runner, true, true);
        workflow.info().await.unwrap();
        runner.push_ok(Vec::new());
        queue_nds_info(&runner, true, true);
        workflow.extract().await.unwrap();

        runner.push_ok(Vec::new());
        queue_nds_info(&runner, true, true);
        workflow.rebuild().await.unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"v1");

        // A later rebuild of a modified source keeps the earliest backup.
        std::fs::write(&path, b"v2").unwrap();
        runner.push_ok(Vec::new());
        queue_nds_info(&runner, true, true);
        workflow.rebuild().await.unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_fix_header_crc_scenario() {
        let (_dir, path) = temp_source("nds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());

        queue_nds_info(&runner, false, true);
        workflow.info().await.unwrap();
        assert!(workflow
            .readiness()
            .await
            .is_enabled(Operation::FixHeaderCrc));

        runner.push_ok(Vec::new()); // the fix itself
        queue_nds_info(&runner, true, true); // re-query now reports OK
        workflow.fix_header_crc().await.unwrap();

        let Rom::Nds(nds) = workflow.rom().await else {
            panic!("expected a DS model");
        };
        assert!(nds.metadata.unwrap().header_crc_ok);
        assert!(!workflow
            .readiness()
            .await
            .is_enabled(Operation::FixHeaderCrc));
    }

    #[tokio::test]
    async fn test_second_mutating_operation_is_rejected() {
        let (_dir, path) = temp_source("nds");
        let runner = FakeRunner::with_delay(Duration::from_millis(100));
        let (workflow, _rx) = workflow(&path, runner.clone());

        queue_nds_info(&runner, true, true);
        workflow.info().await.unwrap();

        runner.push_ok(Vec::new());
        queue_nds_info(&runner, true, true);
        let background = {
            let workflow = Arc::clone(&workflow);
            tokio::spawn(async move { workflow.extract().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = workflow.extract().await.unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));

        // The in-flight extraction is unaffected by the rejection.
        background.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_info_is_rejected_while_mutating() {
        let (_dir, path) = temp_source("nds");
        let runner = FakeRunner::with_delay(Duration::from_millis(100));
        let (workflow, _rx) = workflow(&path, runner.clone());

        queue_nds_info(&runner, true, true);
        workflow.info().await.unwrap();

        runner.push_ok(Vec::new());
        queue_nds_info(&runner, true, true);
        let background = {
            let workflow = Arc::clone(&workflow);
            tokio::spawn(async move { workflow.extract().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = workflow.info().await.unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));
        background.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_missing_tool_reports_unavailable_without_spawning() {
        let (_dir, path) = temp_source("nds");
        let runner = FakeRunner::new();
        let (tx, _rx) = event_channel();
        let tools = Arc::new(ToolBox::with_paths(HashMap::new()));
        let workflow = crate::workflow::Workflow::open(&path, tools, runner.clone(), tx).unwrap();

        let err = workflow.info().await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ToolUnavailable {
                tool: ToolId::Ndstool
            }
        ));
        assert_eq!(runner.call_count(), 0);
    }
}
