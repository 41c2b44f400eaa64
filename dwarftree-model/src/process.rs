//! Build orchestration
//!
//! One build = for each compile unit, a pass-1 type scan followed by the
//! pass-2 tree assembly, all collected under a root "File" element. The
//! same work is exposed three ways: a plain synchronous `build`, a
//! resumable `BuildSession` that advances one unit per `step`, and a
//! `BuildController` that runs a build on a background thread with
//! cooperative cancellation and channel handoff of the finished tree.

use crate::builder::PresentationTreeBuilder;
use crate::core::{Element, ModelError, Result};
use crate::data::TypeTable;
use crate::source::DebugInfoSource;
use anyhow::anyhow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Synchronous build over a complete source: root "File" element with one
/// child per compile unit.
pub fn build(source: &DebugInfoSource) -> Result<Element> {
    let mut session = BuildSession::new(source);
    loop {
        match session.step()? {
            BuildStep::UnitCompleted { .. } => continue,
            BuildStep::Finished(root) => return Ok(root),
        }
    }
}

/// Progress report from one resumption of a [`BuildSession`].
#[derive(Debug)]
pub enum BuildStep {
    UnitCompleted { index: usize, total: usize },
    Finished(Element),
}

/// Resumable build: an explicit state machine that performs one compile
/// unit's pass-1 + pass-2 work per `step` and yields the finished tree
/// once all units are processed. Output is identical to [`build`].
#[derive(Debug)]
pub struct BuildSession<'a> {
    source: &'a DebugInfoSource,
    table: TypeTable,
    root: Option<Element>,
    next_unit: usize,
}

impl<'a> BuildSession<'a> {
    pub fn new(source: &'a DebugInfoSource) -> Self {
        Self {
            source,
            table: TypeTable::new(),
            root: Some(Element::root("File")),
            next_unit: 0,
        }
    }

    /// Process the next compile unit, or yield the finished tree.
    pub fn step(&mut self) -> Result<BuildStep> {
        let total = self.source.unit_count();
        if self.next_unit >= total {
            let root = self
                .root
                .take()
                .ok_or_else(|| anyhow!("build session already finished"))?;
            info!("built presentation tree: {} compile units", total);
            return Ok(BuildStep::Finished(root));
        }

        let unit = self
            .source
            .unit_at(self.next_unit)
            .ok_or_else(|| anyhow!("unit index {} out of range", self.next_unit))?;
        let top = self.source.unit_root(unit);
        debug!("building unit {}/{}", self.next_unit + 1, total);

        // pass 1: index every type declaration in the unit
        self.table.register_types(self.source, top)?;
        // pass 2: assemble the grouped element, resolving through the table
        let unit_elem = PresentationTreeBuilder::new(self.source, &self.table).build_unit(top)?;

        if let Some(root) = self.root.as_mut() {
            root.add_child(None, unit_elem);
        }
        let index = self.next_unit;
        self.next_unit += 1;
        Ok(BuildStep::UnitCompleted { index, total })
    }
}

/// Terminal outcome of a background build, delivered over the channel.
/// A cancelled build delivers nothing at all.
#[derive(Debug)]
pub enum BuildOutcome {
    Completed(Element),
    NoDebugInfo { path: PathBuf },
    Failed(String),
}

struct BuildHandle {
    cancel: Arc<AtomicBool>,
    _thread: JoinHandle<()>,
}

/// Owns at most one in-flight background build. Starting a new build
/// requests cancellation of the previous one: its shared flag is set, and
/// the flag is checked exactly once immediately before the outcome would
/// be published, so a superseded build never delivers a stale tree.
pub struct BuildController {
    tx: mpsc::Sender<BuildOutcome>,
    current: Option<BuildHandle>,
}

impl std::fmt::Debug for BuildController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BuildController{..}")
    }
}

impl BuildController {
    /// Create a controller and the receiving end the consumer drains on
    /// its own thread of control.
    pub fn new() -> (Self, mpsc::Receiver<BuildOutcome>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx, current: None }, rx)
    }

    /// Cancel any in-flight build and start a new one. The closure
    /// produces the decoded source on the build thread, which then owns
    /// it for the duration of the build.
    pub fn start<F>(&mut self, load: F)
    where
        F: FnOnce() -> Result<DebugInfoSource> + Send + 'static,
    {
        self.cancel_current();

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let tx = self.tx.clone();

        let handle = thread::Builder::new()
            .name("dwarftree-build".to_string())
            .spawn(move || {
                let outcome = match load().and_then(|source| build(&source)) {
                    Ok(root) => BuildOutcome::Completed(root),
                    Err(err) => match err.downcast_ref::<ModelError>() {
                        Some(ModelError::NoDebugInfo { path }) => BuildOutcome::NoDebugInfo {
                            path: path.clone(),
                        },
                        _ => BuildOutcome::Failed(format!("{err:#}")),
                    },
                };
                // single publish-point check: a superseded build stays silent
                if flag.load(Ordering::SeqCst) {
                    debug!("build cancelled before publication");
                    return;
                }
                let _ = tx.send(outcome);
            });

        match handle {
            Ok(thread) => {
                self.current = Some(BuildHandle {
                    cancel,
                    _thread: thread,
                });
            }
            Err(err) => error!("Failed to spawn build thread: {}", err),
        }
    }

    /// Request cancellation of the in-flight build, if any. The build
    /// thread is never terminated; it just loses the right to publish.
    pub fn cancel_current(&mut self) {
        if let Some(handle) = self.current.take() {
            debug!("requesting cancellation of in-flight build");
            handle.cancel.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChildrenGroup;
    use crate::source::SourceBuilder;
    use gimli::constants::*;
    use std::time::Duration;

    fn two_unit_source() -> DebugInfoSource {
        let mut builder = SourceBuilder::new();

        let (_, first) = builder.add_unit(0, DW_TAG_compile_unit, 0xb);
        builder.set_name(first, "a.c");
        // forward reference: the typedef precedes the base type it aliases
        let td = builder.add_die(first, DW_TAG_typedef, 0x20);
        builder.set_name(td, "myint");
        builder.set_type_ref(td, 0x30);
        let int_die = builder.add_die(first, DW_TAG_base_type, 0x30);
        builder.set_name(int_die, "int");

        let (_, second) = builder.add_unit(0x100, DW_TAG_compile_unit, 0x10b);
        builder.set_name(second, "b.c");
        let ch = builder.add_die(second, DW_TAG_base_type, 0x120);
        builder.set_name(ch, "char");

        builder.finish()
    }

    #[test]
    fn test_build_produces_one_child_per_unit() {
        let source = two_unit_source();
        let root = build(&source).unwrap();

        assert_eq!(root.name(), "File");
        assert!(root.die().is_none());
        let units = root.group(None);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].name(), "a.c");
        assert_eq!(units[1].name(), "b.c");
        assert_eq!(
            units[0].group(Some(ChildrenGroup::Typedef))[0].name(),
            "myint"
        );
    }

    #[test]
    fn test_session_yields_one_unit_per_step_and_matches_build() {
        let source = two_unit_source();
        let mut session = BuildSession::new(&source);

        assert!(matches!(
            session.step().unwrap(),
            BuildStep::UnitCompleted { index: 0, total: 2 }
        ));
        assert!(matches!(
            session.step().unwrap(),
            BuildStep::UnitCompleted { index: 1, total: 2 }
        ));
        let stepped = match session.step().unwrap() {
            BuildStep::Finished(root) => root,
            other => panic!("expected Finished, got {other:?}"),
        };

        assert_eq!(stepped, build(&source).unwrap());
        assert!(session.step().is_err());
    }

    #[test]
    fn test_build_is_idempotent() {
        let source = two_unit_source();
        assert_eq!(build(&source).unwrap(), build(&source).unwrap());
    }

    #[test]
    fn test_controller_publishes_completed_tree() {
        let (mut controller, rx) = BuildController::new();
        controller.start(|| Ok(two_unit_source()));

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            BuildOutcome::Completed(root) => assert_eq!(root.group(None).len(), 2),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn test_controller_reports_missing_debug_info_distinctly() {
        let (mut controller, rx) = BuildController::new();
        controller.start(|| {
            Err(ModelError::NoDebugInfo {
                path: PathBuf::from("/tmp/stripped"),
            }
            .into())
        });

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            BuildOutcome::NoDebugInfo { path } => {
                assert_eq!(path, PathBuf::from("/tmp/stripped"))
            }
            other => panic!("expected NoDebugInfo, got {other:?}"),
        }
    }

    #[test]
    fn test_superseded_build_never_publishes() {
        let (mut controller, rx) = BuildController::new();

        // first build blocks in its loader until released, and is only
        // released after the second build has superseded it
        let (release_tx, release_rx) = mpsc::channel::<()>();
        controller.start(move || {
            release_rx
                .recv()
                .map_err(|e| anyhow!("release channel closed: {e}"))?;
            let mut builder = SourceBuilder::new();
            let (_, root) = builder.add_unit(0, DW_TAG_compile_unit, 0xb);
            builder.set_name(root, "old.c");
            Ok(builder.finish())
        });

        controller.start(|| {
            let mut builder = SourceBuilder::new();
            let (_, root) = builder.add_unit(0, DW_TAG_compile_unit, 0xb);
            builder.set_name(root, "new.c");
            Ok(builder.finish())
        });
        release_tx.send(()).unwrap();

        // exactly one outcome arrives and it is the newer build's
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            BuildOutcome::Completed(root) => {
                assert_eq!(root.group(None)[0].name(), "new.c")
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }
}
