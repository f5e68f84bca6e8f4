//! Workflow coordination.
//!
//! One [`Workflow`] per opened container. It checks readiness and ordering
//! preconditions, builds tool invocations from model-derived paths, runs
//! them through the [`ProcessRunner`], commits parsed metadata back to the
//! model, recomputes readiness, and reports progress over the event
//! channel. Every operation resolves to `Ok` with refreshed state or to a
//! tagged [`WorkflowError`] — failures never cross this boundary as panics.
//!
//! Concurrency contract: at most one mutating operation per model is in
//! flight at a time; a second request fails fast with `PreconditionNotMet`
//! instead of interleaving. Info queries may overlap each other but not a
//! mutating operation.

pub mod events;
pub mod readiness;

mod nds;
mod threeds;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, WorkflowError};
use crate::rom::{backup_sibling, NdsRom, Rom, RomFormat, ThreeDsRom};
use crate::tools::{Invocation, ProcessRunner, ToolBox, ToolId};

pub use events::{event_channel, EventReceiver, EventSender, WorkflowEvent};
pub use readiness::{Operation, OperationReadiness, StageFlags};

struct State {
    rom: Rom,
    stages: StageFlags,
    /// Single-level extraction completed this session.
    extracted: bool,
    readiness: OperationReadiness,
}

/// Coordinates all operations for one opened container.
pub struct Workflow {
    tools: Arc<ToolBox>,
    runner: Arc<dyn ProcessRunner>,
    events: EventSender,
    state: Mutex<State>,
    mutating: AtomicBool,
}

/// Clears the in-flight flag when a mutating operation ends, however it
/// ends.
struct MutationGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Workflow {
    pub fn new(
        rom: Rom,
        tools: Arc<ToolBox>,
        runner: Arc<dyn ProcessRunner>,
        events: EventSender,
    ) -> Self {
        let readiness =
            OperationReadiness::recompute(&rom, false, StageFlags::default(), &tools);
        info!(source = %rom.source_path().display(), format = ?rom.format(), "opened container");
        Self {
            tools,
            runner,
            events,
            state: Mutex::new(State {
                rom,
                stages: StageFlags::default(),
                extracted: false,
                readiness,
            }),
            mutating: AtomicBool::new(false),
        }
    }

    /// Opens `path`, classifying it by extension. Returns `None` for
    /// unmanaged extensions.
    pub fn open(
        path: impl Into<PathBuf>,
        tools: Arc<ToolBox>,
        runner: Arc<dyn ProcessRunner>,
        events: EventSender,
    ) -> Option<Self> {
        Rom::open(path).map(|rom| Self::new(rom, tools, runner, events))
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Current model snapshot.
    pub async fn rom(&self) -> Rom {
        self.state.lock().await.rom.clone()
    }

    /// Current readiness set.
    pub async fn readiness(&self) -> OperationReadiness {
        self.state.lock().await.readiness.clone()
    }

    /// Current nested stage flags.
    pub async fn stages(&self) -> StageFlags {
        self.state.lock().await.stages
    }

    /// Redirects the directory derived artifacts are written under.
    ///
    /// Previously extracted artifacts now live elsewhere, so the stage
    /// flags and the single-level extraction flag are reset.
    pub async fn set_extract_dir(&self, dir: PathBuf) -> Result<()> {
        if self.mutating.load(Ordering::SeqCst) {
            return Err(WorkflowError::precondition(
                "cannot redirect the extract directory while an operation is in flight",
            ));
        }
        let mut state = self.state.lock().await;
        state.rom.set_extract_dir(dir);
        state.stages = StageFlags::default();
        state.extracted = false;
        state.readiness = OperationReadiness::recompute(
            &state.rom,
            state.extracted,
            state.stages,
            &self.tools,
        );
        Ok(())
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Runs the format's info query and commits the parsed metadata.
    pub async fn info(&self) -> Result<()> {
        let op = Operation::Info;
        if self.mutating.load(Ordering::SeqCst) {
            let err = WorkflowError::precondition("a mutating operation is in flight");
            self.emit(WorkflowEvent::Error(err.to_string()));
            return Err(err);
        }
        if let Err(err) = self.require_enabled(op).await {
            self.emit(WorkflowEvent::Error(err.to_string()));
            return Err(err);
        }
        self.emit(WorkflowEvent::Busy(op.status_text().to_string()));
        let result = self.refresh_info().await;
        self.conclude(op, result).await
    }

    pub(super) async fn refresh_info(&self) -> Result<()> {
        let format = self.state.lock().await.rom.format();
        match format {
            RomFormat::Nds => self.refresh_nds_info().await,
            RomFormat::ThreeDs => self.refresh_threeds_info().await,
        }
    }

    // ========================================================================
    // Operation Plumbing
    // ========================================================================

    /// Entry gate for every mutating operation: claims the in-flight slot,
    /// checks readiness, and announces the operation. Rejections are
    /// reported on the event channel before returning.
    async fn start_mutating(&self, op: Operation) -> Result<MutationGuard<'_>> {
        let guard = if self
            .mutating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            MutationGuard {
                flag: &self.mutating,
            }
        } else {
            let err = WorkflowError::precondition(format!(
                "cannot start {} while another operation is in flight",
                op
            ));
            self.emit(WorkflowEvent::Error(err.to_string()));
            return Err(err);
        };

        if let Err(err) = self.require_enabled(op).await {
            self.emit(WorkflowEvent::Error(err.to_string()));
            return Err(err);
        }

        debug!(%op, "starting operation");
        self.emit(WorkflowEvent::Busy(op.status_text().to_string()));
        Ok(guard)
    }

    async fn require_enabled(&self, op: Operation) -> Result<()> {
        let state = self.state.lock().await;
        if state.readiness.is_enabled(op) {
            return Ok(());
        }
        let tool = op.required_tool(state.rom.format());
        if !self.tools.is_available(tool) {
            return Err(WorkflowError::ToolUnavailable { tool });
        }
        Err(WorkflowError::precondition(format!(
            "{} is not enabled in the current state",
            op
        )))
    }

    /// Recomputes readiness and closes out the event sequence.
    async fn conclude(&self, op: Operation, result: Result<()>) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.readiness = OperationReadiness::recompute(
                &state.rom,
                state.extracted,
                state.stages,
                &self.tools,
            );
        }
        match &result {
            Ok(()) => {
                info!(%op, "operation completed");
                self.emit(WorkflowEvent::Ready);
            }
            Err(err) => {
                warn!(%op, error = %err, "operation failed");
                self.emit(WorkflowEvent::Error(err.to_string()));
            }
        }
        result
    }

    fn emit(&self, event: WorkflowEvent) {
        // A dropped receiver only means nobody is watching the status line.
        let _ = self.events.send(event);
    }

    /// Runs one tool invocation and maps a non-zero exit to `ProcessFailed`.
    async fn run_tool(&self, tool: ToolId, args: Vec<OsString>) -> Result<Invocation> {
        let path = self.tools.path(tool)?.to_path_buf();
        let invocation = self.runner.run(&path, &args).await?;
        if invocation.success() {
            Ok(invocation)
        } else {
            Err(WorkflowError::ProcessFailed {
                code: invocation.code,
            })
        }
    }

    /// Copies the source to its `.old` sibling unless one already exists; a
    /// pre-existing backup is the earliest known-good copy and is never
    /// overwritten.
    async fn ensure_backup(&self, source: &Path) -> Result<()> {
        let backup = backup_sibling(source);
        if tokio::fs::try_exists(&backup).await? {
            debug!(backup = %backup.display(), "backup already exists, keeping earliest copy");
            return Ok(());
        }
        tokio::fs::copy(source, &backup).await?;
        info!(backup = %backup.display(), "created backup copy");
        Ok(())
    }

    async fn nds_snapshot(&self) -> Result<NdsRom> {
        match &self.state.lock().await.rom {
            Rom::Nds(rom) => Ok(rom.clone()),
            Rom::ThreeDs(_) => Err(WorkflowError::precondition(
                "operation applies to single-level DS containers",
            )),
        }
    }

    async fn threeds_snapshot(&self) -> Result<ThreeDsRom> {
        match &self.state.lock().await.rom {
            Rom::ThreeDs(rom) => Ok(rom.clone()),
            Rom::Nds(_) => Err(WorkflowError::precondition(
                "operation applies to nested 3DS containers",
            )),
        }
    }
}

pub(super) fn os(s: &str) -> OsString {
    OsString::from(s)
}

// ============================================================================
// Test Harness
// ============================================================================


#[cfg(test)]
mod tests {
    use super::harness::*;
    use super::*;

    #[tokio::test]
    async fn test_open_rejects_unknown_extensions() {
        let (tx, _rx) = event_channel();
        let runner = FakeRunner::new();
        assert!(Workflow::open("/roms/game.iso", all_tools(), runner, tx).is_none());
    }

    #[tokio::test]
    async fn test_set_extract_dir_resets_session_state() {
        let (_dir, path) = temp_source("3ds");
        let runner = FakeRunner::new();
        let (workflow, _rx) = workflow(&path, runner.clone());

        queue_ctr_info(&runner);
        workflow.info().await.unwrap();
        runner.push_ok(Vec::new()); // outer split
        queue_ctr_info(&runner); // info refresh
        workflow.extract_outer().await.unwrap();
        assert!(workflow.stages().await.outer);

        workflow
            .set_extract_dir(PathBuf::from("/elsewhere"))
            .await
            .unwrap();
        assert_eq!(workflow.stages().await, StageFlags::default());
        assert!(!workflow
            .readiness()
            .await
            .is_enabled(Operation::ExtractInner));
        assert_eq!(workflow.rom().await.extract_dir(), Path::new("/elsewhere"));
    }
}
