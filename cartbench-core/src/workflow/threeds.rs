//! Operations on the nested 3DS container.
//!
//! Extraction runs outer -> inner -> leaf and each stage is gated on its
//! prerequisite having succeeded since the last change at the enclosing
//! level. Rebuild runs the mirror image, leaf -> inner -> outer. Trim and
//! pad re-split the outer container and rebuild it with or without media
//! padding. All stage invocations are idempotent per artifact: fixed
//! output paths, overwrite semantics.

use std::ffi::OsString;
use std::path::Path;

use crate::error::Result;
use crate::parse;
use crate::rom::{Rom, ThreeDsRom};
use crate::tools::ToolId;

use super::{os, Operation, Workflow};

/// Whether an outer rebuild pads the container back to its full media size
/// or leaves it trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OuterPadding {
    Pad,
    Trim,
}

impl Workflow {
    /// Splits the outer container into its sub-container files.
    pub async fn extract_outer(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::ExtractOuter).await?;
        let result = async {
            self.extract_outer_stage().await?;
            self.refresh_threeds_info().await
        }
        .await;
        self.conclude(Operation::ExtractOuter, result).await
    }

    /// Splits the primary sub-container into its header and region files.
    pub async fn extract_inner(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::ExtractInner).await?;
        let result = async {
            self.extract_inner_stage().await?;
            self.refresh_threeds_info().await
        }
        .await;
        self.conclude(Operation::ExtractInner, result).await
    }

    /// Splits the ExeFS blob into its header plus entry directory.
    pub async fn extract_exefs(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::ExtractExefs).await?;
        let result = async {
            self.extract_exefs_stage().await?;
            self.refresh_threeds_info().await
        }
        .await;
        self.conclude(Operation::ExtractExefs, result).await
    }

    /// Splits the RomFS blob into its entry directory.
    pub async fn extract_romfs(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::ExtractRomfs).await?;
        let result = async {
            self.extract_romfs_stage().await?;
            self.refresh_threeds_info().await
        }
        .await;
        self.conclude(Operation::ExtractRomfs, result).await
    }

    /// Runs the whole extraction chain, aborting on the first failure.
    pub async fn extract_all(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::ExtractAll).await?;
        let result = async {
            self.extract_outer_stage().await?;
            self.extract_inner_stage().await?;
            self.extract_exefs_stage().await?;
            self.extract_romfs_stage().await?;
            self.refresh_threeds_info().await
        }
        .await;
        self.conclude(Operation::ExtractAll, result).await
    }

    /// Rebuilds the ExeFS blob from its extracted entries.
    pub async fn rebuild_exefs(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::RebuildExefs).await?;
        let result = async {
            self.rebuild_exefs_stage().await?;
            self.refresh_threeds_info().await
        }
        .await;
        self.conclude(Operation::RebuildExefs, result).await
    }

    /// Rebuilds the RomFS blob from its extracted entries.
    pub async fn rebuild_romfs(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::RebuildRomfs).await?;
        let result = async {
            self.rebuild_romfs_stage().await?;
            self.refresh_threeds_info().await
        }
        .await;
        self.conclude(Operation::RebuildRomfs, result).await
    }

    /// Rebuilds the primary sub-container from its region files.
    pub async fn rebuild_inner(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::RebuildInner).await?;
        let result = async {
            self.rebuild_inner_stage().await?;
            self.refresh_threeds_info().await
        }
        .await;
        self.conclude(Operation::RebuildInner, result).await
    }

    /// Rebuilds the outer container in place from the sub-container files.
    pub async fn rebuild_outer(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::RebuildOuter).await?;
        let result = async {
            self.rebuild_outer_stage(OuterPadding::Pad).await?;
            self.refresh_threeds_info().await
        }
        .await;
        self.conclude(Operation::RebuildOuter, result).await
    }

    /// Rebuilds every currently-extracted stage, leaf to outer, aborting
    /// the remaining chain on the first failure.
    pub async fn rebuild_all(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::RebuildAll).await?;
        let result = async {
            let stages = self.state.lock().await.stages;
            if stages.exefs {
                self.rebuild_exefs_stage().await?;
            }
            if stages.romfs {
                self.rebuild_romfs_stage().await?;
            }
            if stages.inner {
                self.rebuild_inner_stage().await?;
            }
            self.rebuild_outer_stage(OuterPadding::Pad).await?;
            self.refresh_threeds_info().await
        }
        .await;
        self.conclude(Operation::RebuildAll, result).await
    }

    /// Strips the media padding from the outer container.
    pub async fn trim(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::Trim).await?;
        let result = self.resize(OuterPadding::Trim).await;
        self.conclude(Operation::Trim, result).await
    }

    /// Pads the outer container back to its full media size.
    pub async fn pad(&self) -> Result<()> {
        let _guard = self.start_mutating(Operation::Pad).await?;
        let result = self.resize(OuterPadding::Pad).await;
        self.conclude(Operation::Pad, result).await
    }

    /// Re-splits and rebuilds the outer container with the requested
    /// padding, then re-queries info so displayed metadata matches the new
    /// on-disk size.
    async fn resize(&self, padding: OuterPadding) -> Result<()> {
        let rom = self.threeds_snapshot().await?;
        self.ensure_backup(&rom.source_path).await?;
        self.extract_outer_stage().await?;
        self.rebuild_outer_stage(padding).await?;
        self.refresh_threeds_info().await
    }

    /// Converts the container to the installable format, writing the result
    /// into `target_dir`. Independent of the extraction/rebuild chain.
    pub async fn convert(&self, target_dir: &Path) -> Result<()> {
        let _guard = self.start_mutating(Operation::Convert).await?;
        let result = async {
            let rom = self.threeds_snapshot().await?;
            tokio::fs::create_dir_all(target_dir).await?;
            self.run_tool(
                ToolId::ThreeDsConv,
                vec![
                    os("--output"),
                    target_dir.as_os_str().to_os_string(),
                    rom.source_path.clone().into_os_string(),
                ],
            )
            .await?;
            Ok(())
        }
        .await;
        self.conclude(Operation::Convert, result).await
    }

    // ========================================================================
    // Stages
    // ========================================================================

    async fn extract_outer_stage(&self) -> Result<()> {
        let rom = self.threeds_snapshot().await?;
        tokio::fs::create_dir_all(rom.content_dir()).await?;
        self.run_tool(ToolId::ThreeDsTool, outer_args("-x", &rom)).await?;
        let mut state = self.state.lock().await;
        state.stages.outer = true;
        state.stages.reset_below_outer();
        Ok(())
    }

    async fn extract_inner_stage(&self) -> Result<()> {
        let rom = self.threeds_snapshot().await?;
        self.run_tool(ToolId::ThreeDsTool, inner_args("-x", &rom)).await?;
        let mut state = self.state.lock().await;
        state.stages.inner = true;
        state.stages.reset_leaves();
        Ok(())
    }

    async fn extract_exefs_stage(&self) -> Result<()> {
        let rom = self.threeds_snapshot().await?;
        tokio::fs::create_dir_all(rom.exefs_dir()).await?;
        self.run_tool(ToolId::ThreeDsTool, exefs_args("-x", &rom)).await?;
        self.state.lock().await.stages.exefs = true;
        Ok(())
    }

    async fn extract_romfs_stage(&self) -> Result<()> {
        let rom = self.threeds_snapshot().await?;
        tokio::fs::create_dir_all(rom.romfs_dir()).await?;
        self.run_tool(ToolId::ThreeDsTool, romfs_args("-x", &rom)).await?;
        self.state.lock().await.stages.romfs = true;
        Ok(())
    }

    async fn rebuild_exefs_stage(&self) -> Result<()> {
        let rom = self.threeds_snapshot().await?;
        match self.run_tool(ToolId::ThreeDsTool, exefs_args("-c", &rom)).await {
            Ok(_) => Ok(()),
            Err(err) => {
                // A half-written ExeFS blob must not feed an inner rebuild.
                self.state.lock().await.stages.inner = false;
                Err(err)
            }
        }
    }

    async fn rebuild_romfs_stage(&self) -> Result<()> {
        let rom = self.threeds_snapshot().await?;
        match self.run_tool(ToolId::ThreeDsTool, romfs_args("-c", &rom)).await {
            Ok(_) => Ok(()),
            Err(err) => {
                self.state.lock().await.stages.inner = false;
                Err(err)
            }
        }
    }

    async fn rebuild_inner_stage(&self) -> Result<()> {
        let rom = self.threeds_snapshot().await?;
        match self.run_tool(ToolId::ThreeDsTool, inner_args("-c", &rom)).await {
            Ok(_) => Ok(()),
            Err(err) => {
                // A half-written sub-container must not feed the outer rebuild.
                self.state.lock().await.stages.outer = false;
                Err(err)
            }
        }
    }

    async fn rebuild_outer_stage(&self, padding: OuterPadding) -> Result<()> {
        let rom = self.threeds_snapshot().await?;
        self.ensure_backup(&rom.source_path).await?;
        let mut args = outer_args("-c", &rom);
        if padding == OuterPadding::Trim {
            args.push(os("--not-pad"));
        }
        self.run_tool(ToolId::ThreeDsTool, args).await?;
        // The outer container changed; inner and leaf extractions no
        // longer correspond to it. The sub-container files themselves are
        // intact, so the outer stage stays valid.
        self.state.lock().await.stages.reset_below_outer();
        Ok(())
    }

    pub(super) async fn refresh_threeds_info(&self) -> Result<()> {
        let rom = self.threeds_snapshot().await?;
        let invocation = self
            .run_tool(
                ToolId::CtrTool,
                vec![rom.source_path.clone().into_os_string()],
            )
            .await?;
        let meta = parse::threeds::parse_container_info(&invocation.lines)?;
        if let Rom::ThreeDs(rom) = &mut self.state.lock().await.rom {
            rom.metadata = Some(meta);
        }
        Ok(())
    }
}

fn outer_args(mode: &str, rom: &ThreeDsRom) -> Vec<OsString> {
    vec![
        os(mode),
        os("-t"),
        os("cci"),
        os("-f"),
        rom.source_path.clone().into_os_string(),
        os("--header"),
        rom.ncsd_header().into_os_string(),
        os("-0"),
        rom.partition0().into_os_string(),
        os("-1"),
        rom.partition1().into_os_string(),
        os("-2"),
        rom.partition2().into_os_string(),
    ]
}

fn inner_args(mode: &str, rom: &ThreeDsRom) -> Vec<OsString> {
    vec![
        os(mode),
        os("-t"),
        os("cxi"),
        os("-f"),
        rom.partition0().into_os_string(),
        os("--header"),
        rom.ncch_header().into_os_string(),
        os("--exh"),
        rom.exheader_bin().into_os_string(),
        os("--plain"),
        rom.plain_bin().into_os_string(),
        os("--logo"),
        rom.logo_bin().into_os_string(),
        os("--exefs"),
        rom.exefs_bin().into_os_string(),
        os("--romfs"),
        rom.romfs_bin().into_os_string(),
    ]
}

fn exefs_args(mode: &str, rom: &ThreeDsRom) -> Vec<OsString> {
    vec![
        os(mode),
        os("-t"),
        os("exefs"),
        os("-f"),
        rom.exefs_bin().into_os_string(),
        os("--header"),
        rom.exefs_header().into_os_string(),
        os("--exefs-dir"),
        rom.exefs_dir().into_os_string(),
    ]
}

fn romfs_args(mode: &str, rom: &ThreeDsRom) -> Vec<OsString> {
    vec![
        os(mode),
        os("-t"),
        os("romfs"),
        os("-f"),
        rom.romfs_bin().into_os_string(),
        os("--romfs-dir"),
        rom.romfs_dir().into_os_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use super::*;
    use crate::error::WorkflowError;
    use crate::rom::backup_sibling;
    use std::path::PathBuf;
    use std::sync::Arc;

    /// Runs info plus the full extraction chain against canned responses.
    async fn extract_chain(workflow: &Arc<crate::workflow::Workflow>, runner: &FakeRunner) {
        queue_ctr_info(runner);
        workflow.info().await.unwrap();
        for _ in 0..4 {
            runner.push_ok(Vec::new()); // the split itself
            queue_ctr_info(runner); // info refresh
        }
        workflow.extract_outer().await.unwrap();
        workflow.extract_inner().await.unwrap();
        workflow.extract_exefs().await.unwrap();
        workflow.extract_romfs().await.unwrap();
    }

    fn stage_type(args: &[std::ffi::OsString]) -> String {
        args[2].to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_info_populates_metadata() {
        let (_dir, path) = temp_source("3ds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());

        queue_ctr_info(&runner);
        workflow.info().await.unwrap();

        let Rom::ThreeDs(threeds) = workflow.rom().await else {
            panic!("expected a 3DS model");
        };
        let meta = threeds.metadata.unwrap();
        assert_eq!(meta.title, "MYGAME");
        assert_eq!(meta.product_code, "CTR-P-AXXE");
        assert_eq!(meta.content_size, 0x4000_0000);
        assert_eq!(meta.exefs_size, 0x18_0000);
    }

    #[tokio::test]
    async fn test_inner_extraction_before_outer_is_rejected() {
        let (_dir, path) = temp_source("3ds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());

        queue_ctr_info(&runner);
        workflow.info().await.unwrap();

        let err = workflow.extract_inner().await.unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));
        // Only the info query ever reached a process.
        assert_eq!(runner.call_count(), 1);

        // Leaf extraction is equally out of order.
        let err = workflow.extract_exefs().await.unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_extraction_chain_progression() {
        let (_dir, path) = temp_source("3ds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());

        extract_chain(&workflow, &runner).await;

        let stages = workflow.stages().await;
        assert!(stages.outer && stages.inner && stages.exefs && stages.romfs);

        let ready = workflow.readiness().await;
        assert!(ready.is_enabled(Operation::RebuildExefs));
        assert!(ready.is_enabled(Operation::RebuildRomfs));
        assert!(ready.is_enabled(Operation::RebuildInner));
        assert!(ready.is_enabled(Operation::RebuildOuter));
        assert!(ready.is_enabled(Operation::RebuildAll));

        // The split invocations name the container level they operate on.
        let calls = runner.calls();
        assert_eq!(stage_type(&calls[1].1), "cci");
        assert_eq!(stage_type(&calls[3].1), "cxi");
        assert_eq!(stage_type(&calls[5].1), "exefs");
        assert_eq!(stage_type(&calls[7].1), "romfs");
    }

    #[tokio::test]
    async fn test_rebuild_all_runs_leaf_to_outer() {
        let (_dir, path) = temp_source("3ds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());
        extract_chain(&workflow, &runner).await;

        let before = runner.call_count();
        for _ in 0..4 {
            runner.push_ok(Vec::new());
        }
        queue_ctr_info(&runner);
        workflow.rebuild_all().await.unwrap();

        let calls = runner.calls();
        let rebuilds: Vec<String> = calls[before..before + 4]
            .iter()
            .map(|(_, args)| stage_type(args))
            .collect();
        assert_eq!(rebuilds, vec!["exefs", "romfs", "cxi", "cci"]);
        for (_, args) in &calls[before..before + 4] {
            assert_eq!(args[0], os("-c"));
        }
    }

    #[tokio::test]
    async fn test_rebuild_all_aborts_on_first_failure() {
        let (_dir, path) = temp_source("3ds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());
        extract_chain(&workflow, &runner).await;

        let before = runner.call_count();
        runner.push_ok(Vec::new()); // exefs rebuild succeeds
        runner.push_exit(1); // romfs rebuild fails
        let err = workflow.rebuild_all().await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ProcessFailed { code: Some(1) }
        ));

        // The chain stopped: no inner or outer rebuild, no info re-query.
        assert_eq!(runner.call_count(), before + 2);

        // Downstream work is disabled until a successful retry path.
        let ready = workflow.readiness().await;
        assert!(!ready.is_enabled(Operation::RebuildInner));
        assert!(!ready.is_enabled(Operation::ExtractExefs));
    }

    #[tokio::test]
    async fn test_outer_rebuild_resets_inner_progress() {
        let (_dir, path) = temp_source("3ds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());
        extract_chain(&workflow, &runner).await;

        runner.push_ok(Vec::new());
        queue_ctr_info(&runner);
        workflow.rebuild_outer().await.unwrap();

        let stages = workflow.stages().await;
        assert!(stages.outer);
        assert!(!stages.inner && !stages.exefs && !stages.romfs);

        let ready = workflow.readiness().await;
        assert!(ready.is_enabled(Operation::ExtractInner));
        assert!(!ready.is_enabled(Operation::RebuildInner));
    }

    #[tokio::test]
    async fn test_trim_pad_rebuild_create_backup_once() {
        let (_dir, path) = temp_source("3ds");
        let backup = backup_sibling(&path);
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());

        queue_ctr_info(&runner);
        workflow.info().await.unwrap();

        // trim: split, rebuild without padding, re-query.
        runner.push_ok(Vec::new());
        runner.push_ok(Vec::new());
        queue_ctr_info(&runner);
        workflow.trim().await.unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"v1");

        let calls = runner.calls();
        let (_, trim_rebuild_args) = &calls[2];
        assert!(trim_rebuild_args.contains(&os("--not-pad")));

        // pad on the modified source keeps the earliest backup.
        std::fs::write(&path, b"v2").unwrap();
        runner.push_ok(Vec::new());
        runner.push_ok(Vec::new());
        queue_ctr_info(&runner);
        workflow.pad().await.unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"v1");

        let calls = runner.calls();
        let (_, pad_rebuild_args) = &calls[5];
        assert!(!pad_rebuild_args.contains(&os("--not-pad")));

        // and so does a plain outer rebuild.
        runner.push_ok(Vec::new());
        queue_ctr_info(&runner);
        workflow.rebuild_outer().await.unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_convert_is_independent_and_reports_failure() {
        let (dir, path) = temp_source("3ds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());
        let target = dir.path().join("cia");

        // No info query, no extraction: convert is legal regardless.
        assert!(workflow.readiness().await.is_enabled(Operation::Convert));
        runner.push_ok(Vec::new());
        workflow.convert(&target).await.unwrap();

        let calls = runner.calls();
        let (program, args) = &calls[0];
        assert_eq!(program, &PathBuf::from("/fake/3dsconv"));
        assert_eq!(args[0], os("--output"));

        runner.push_exit(1);
        let err = workflow.convert(&target).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ProcessFailed { code: Some(1) }));
    }

    #[tokio::test]
    async fn test_extract_all_runs_the_whole_chain() {
        let (_dir, path) = temp_source("3ds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());

        queue_ctr_info(&runner);
        workflow.info().await.unwrap();

        for _ in 0..4 {
            runner.push_ok(Vec::new());
        }
        queue_ctr_info(&runner);
        workflow.extract_all().await.unwrap();

        let stages = workflow.stages().await;
        assert!(stages.outer && stages.inner && stages.exefs && stages.romfs);

        let calls = runner.calls();
        let splits: Vec<String> = calls[1..5]
            .iter()
            .map(|(_, args)| stage_type(args))
            .collect();
        assert_eq!(splits, vec!["cci", "cxi", "exefs", "romfs"]);
    }
}
