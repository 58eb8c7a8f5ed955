pub mod context;
pub mod events;
pub mod executor;
pub mod outcome;
pub mod state;

use anyhow::{Context, Result};
use colored::Colorize;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub use events::*;
pub use state::*;

use self::context::TestContext;
use self::executor::WorkflowExecutor;
use crate::driver::traits::SessionFactory;
use crate::driver::web::WebSessionFactory;
use crate::error::CaseError;
use crate::parser::loader::load_test_cases;
use crate::parser::types::{TestCaseRecord, Workflow};
use crate::report::{self, types::TestResults};
use crate::utils::config::HarnessConfig;

const INTERRUPTED: &str = "run interrupted";

/// Set once the run should stop. Cases already running are abandoned, cases
/// not yet started are skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Safe to call from a signal handler thread
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is set
    pub async fn cancelled(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        // Register before checking so a concurrent cancel is not missed
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Force a workflow instead of detecting it from each CSV header
    pub workflow: Option<Workflow>,
    pub output: PathBuf,
    /// Write `test-results.json` and `junit.xml` into `output`
    pub report: bool,
    /// Restrict the run to these test ids
    pub only: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct RunResult {
    pub session: TestSessionState,
    /// Files that could not be loaded, with the reason
    pub load_failures: Vec<(PathBuf, String)>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.load_failures.is_empty() && !self.session.has_failures()
    }
}

/// Collect test-case CSV files under `path`, sorted for a stable run order
pub fn collect_case_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Test path not found: {}", path.display());
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    Ok(files)
}

/// Run test cases from a CSV file or a directory of them
pub async fn run_tests(
    path: &Path,
    config: HarnessConfig,
    options: &RunOptions,
    cancel: CancelFlag,
) -> Result<RunResult> {
    let mut session = TestSessionState::new(&uuid::Uuid::new_v4().to_string());
    let mut load_failures = Vec::new();

    // 1. Load every file; a bad file fails on its own
    let mut planned = Vec::new();
    for file in collect_case_files(path)? {
        match load_test_cases(&file, options.workflow) {
            Ok(loaded) => {
                let source = file.display().to_string();
                for record in loaded.records {
                    if let Some(only) = &options.only {
                        if !only.iter().any(|id| id == &record.test_id) {
                            continue;
                        }
                    }
                    let case = CaseState::new(
                        &record.test_id,
                        &record.test_name,
                        loaded.workflow,
                        &source,
                    );
                    planned.push((record, case));
                }
            }
            Err(e) => {
                log::error!("{:#}", e);
                println!("{} {:#}", "✗".red(), e);
                load_failures.push((file, format!("{:#}", e)));
            }
        }
    }

    if planned.is_empty() {
        println!("{} No test cases to run.", "ℹ".blue());
        return Ok(RunResult {
            session,
            load_failures,
        });
    }

    // 2. Browser and reporting plumbing
    let context = TestContext::new(&options.output, &config.screenshot_dir)?;
    let factory = WebSessionFactory::launch(config.web_driver_config())
        .await
        .context("Failed to launch browser")?;

    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let workers = config.workers;
    let executor = WorkflowExecutor::new(Arc::new(config), context, emitter.clone());

    emitter.emit(TestEvent::SessionStarted {
        session_id: session.session_id.clone(),
        case_count: planned.len(),
    });
    session.start();

    // 3. Execute
    let cases = run_cases(&executor, &factory, planned, workers, &cancel).await;

    if let Err(e) = factory.shutdown().await {
        log::warn!("Browser shutdown failed: {:#}", e);
    }

    session.add_cases(cases);
    session.finish();
    emitter.emit(TestEvent::SessionFinished {
        summary: session.summary(),
    });

    drop(executor);
    drop(emitter);
    let _ = listener.await;

    // 4. Reports
    if options.report {
        let results = TestResults::from_session(&session);
        let json_path = report::json::write_report(&results, &options.output)?;
        let junit_path = report::junit::write_report(&results, &options.output)?;
        println!(
            "{} Reports: {}, {}",
            "📄".cyan(),
            json_path.display(),
            junit_path.display()
        );
    }

    Ok(RunResult {
        session,
        load_failures,
    })
}

/// Run cases with at most `workers` in flight. Results keep input order.
pub async fn run_cases<S>(
    executor: &WorkflowExecutor,
    factory: &S,
    cases: Vec<(TestCaseRecord, CaseState)>,
    workers: usize,
    cancel: &CancelFlag,
) -> Vec<CaseState>
where
    S: SessionFactory + ?Sized,
{
    stream::iter(cases)
        .map(|(record, case)| run_case(executor, factory, record, case, cancel))
        .buffered(workers.max(1))
        .collect()
        .await
}

/// Run one case on a fresh session. Never fails: the outcome lands in the
/// returned state.
async fn run_case<S>(
    executor: &WorkflowExecutor,
    factory: &S,
    record: TestCaseRecord,
    mut case: CaseState,
    cancel: &CancelFlag,
) -> CaseState
where
    S: SessionFactory + ?Sized,
{
    let emitter = executor.emitter();

    if cancel.is_cancelled() {
        case.skip(INTERRUPTED);
        emit_finished(emitter, &case);
        return case;
    }

    case.start();
    emitter.emit(TestEvent::CaseStarted {
        test_id: case.test_id.clone(),
        name: case.display_name(),
        workflow: case.workflow,
    });

    let result = match factory.open_session().await {
        Err(e) => Err(CaseError::Driver(e.context("Failed to open browser session"))),
        Ok(driver) => {
            let result = {
                let case_ms = executor.config().timeouts.case_ms;
                let run = executor.execute(driver.as_ref(), &record, &mut case);
                let bounded = async {
                    match case_ms {
                        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), run)
                            .await
                            .unwrap_or_else(|_| {
                                Err(CaseError::Cancelled {
                                    reason: format!("timed out after {}ms", ms),
                                })
                            }),
                        None => run.await,
                    }
                };

                tokio::select! {
                    result = bounded => result,
                    _ = cancel.cancelled() => Err(CaseError::Cancelled {
                        reason: INTERRUPTED.to_string(),
                    }),
                }
            };

            if let Err(e) = driver.close().await {
                log::warn!("{}: closing session failed: {:#}", case.test_id, e);
            }
            result
        }
    };

    match result {
        Ok(outcome) => {
            if case.screenshot_path.is_none() {
                case.screenshot_path = outcome.screenshot.map(|p| p.display().to_string());
            }
            case.pass();
        }
        Err(e) => {
            log::error!("{}: {}", case.test_id, e);
            case.fail(e.to_string(), e.category());
        }
    }

    emit_finished(emitter, &case);
    case
}

fn emit_finished(emitter: &EventEmitter, case: &CaseState) {
    emitter.emit(TestEvent::CaseFinished {
        test_id: case.test_id.clone(),
        name: case.display_name(),
        status: case.status.clone(),
        error: case.error.clone(),
        duration_ms: case.total_duration_ms,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{DriverCall, MockSessionFactory, RecordingDriver};

    fn executor(case_ms: Option<u64>, settle_ms: u64) -> WorkflowExecutor {
        let mut config = HarnessConfig::default();
        config.timeouts.message_ms = 10;
        config.timeouts.settle_ms = settle_ms;
        config.timeouts.case_ms = case_ms;
        let context = TestContext {
            output_dir: PathBuf::from("out"),
            screenshot_dir: PathBuf::from("shots"),
        };
        WorkflowExecutor::new(Arc::new(config), context, EventEmitter::default())
    }

    fn case(id: &str, expected: &str) -> (TestCaseRecord, CaseState) {
        let mut fields = Workflow::Registration.empty_fields();
        fields.set("first_name", "Jane");
        let record = TestCaseRecord::new(id, "register", "", fields, expected);
        let state = CaseState::new(id, "register", Workflow::Registration, "reg.csv");
        (record, state)
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_siblings() {
        let factory = MockSessionFactory::new(RecordingDriver::new());
        let cases = vec![
            case("CR_01", "Form is submitted"),
            case("CR_02", "Error: City is required."),
            case("CR_03", "Form is submitted"),
        ];

        let results = run_cases(&executor(None, 0), &factory, cases, 2, &CancelFlag::new()).await;

        let ids: Vec<&str> = results.iter().map(|c| c.test_id.as_str()).collect();
        assert_eq!(ids, vec!["CR_01", "CR_02", "CR_03"]);
        assert_eq!(results[0].status, CaseStatus::Passed);
        assert_eq!(results[1].status, CaseStatus::Failed);
        assert_eq!(results[1].error_category.as_deref(), Some("AssertionFailure"));
        assert_eq!(results[2].status, CaseStatus::Passed);

        // One session per case, each closed
        let opened = factory.opened();
        assert_eq!(opened.len(), 3);
        for driver in opened {
            assert_eq!(driver.calls().last(), Some(&DriverCall::Close));
        }
    }

    #[tokio::test]
    async fn test_session_open_failure_fails_only_that_case() {
        let factory = MockSessionFactory::new(RecordingDriver::new()).fail_session(0);
        let cases = vec![case("CR_01", "Form is submitted"), case("CR_02", "Form is submitted")];

        let results = run_cases(&executor(None, 0), &factory, cases, 1, &CancelFlag::new()).await;

        assert_eq!(results[0].status, CaseStatus::Failed);
        assert!(results[0]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("Failed to open browser session"));
        assert_eq!(results[1].status, CaseStatus::Passed);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_pending_cases() {
        let factory = MockSessionFactory::new(RecordingDriver::new());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let results = run_cases(
            &executor(None, 0),
            &factory,
            vec![case("CR_01", "Form is submitted")],
            1,
            &cancel,
        )
        .await;

        assert!(matches!(results[0].status, CaseStatus::Skipped { .. }));
        assert!(factory.opened().is_empty());
    }

    #[tokio::test]
    async fn test_case_timeout_fails_and_closes_session() {
        let factory = MockSessionFactory::new(RecordingDriver::new());

        let results = run_cases(
            &executor(Some(20), 2000),
            &factory,
            vec![case("CR_01", "Form is submitted")],
            1,
            &CancelFlag::new(),
        )
        .await;

        assert_eq!(results[0].status, CaseStatus::Failed);
        assert_eq!(results[0].error_category.as_deref(), Some("Cancelled"));
        assert!(results[0].stages.iter().all(|s| s.status.is_terminal()));
        assert_eq!(factory.opened()[0].calls().last(), Some(&DriverCall::Close));
    }

    #[tokio::test]
    async fn test_case_events_bracket_stages() {
        let factory = MockSessionFactory::new(RecordingDriver::new());
        let executor = executor(None, 0);
        let mut receiver = executor.emitter().subscribe();

        run_cases(
            &executor,
            &factory,
            vec![case("CR_01", "Form is submitted")],
            1,
            &CancelFlag::new(),
        )
        .await;

        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(TestEvent::CaseStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(TestEvent::CaseFinished {
                status: CaseStatus::Passed,
                ..
            })
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, TestEvent::StagePassed { .. })));
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let cancel = CancelFlag::new();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { cancel.cancelled().await })
        };
        tokio::task::yield_now().await;

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter was not woken")
            .unwrap();

        // Already cancelled: resolves immediately
        tokio::time::timeout(Duration::from_millis(10), cancel.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn test_collect_case_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.csv"), "").unwrap();
        std::fs::write(dir.path().join("nested/a.CSV"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = collect_case_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("b.csv"), dir.path().join("nested/a.CSV")]
        );
        assert!(collect_case_files(&dir.path().join("missing")).is_err());
    }
}
