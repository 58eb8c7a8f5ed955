use super::state::{CaseStatus, TestSummary};
use crate::parser::types::Workflow;
use tokio::sync::broadcast;

/// Test execution events for real-time updates
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Session events
    SessionStarted {
        session_id: String,
        case_count: usize,
    },
    SessionFinished {
        summary: TestSummary,
    },

    // Case events
    CaseStarted {
        test_id: String,
        name: String,
        workflow: Workflow,
    },
    CaseFinished {
        test_id: String,
        name: String,
        status: CaseStatus,
        error: Option<String>,
        duration_ms: Option<u64>,
    },

    // Stage events
    StageStarted {
        test_id: String,
        index: usize,
        stage: String,
    },
    StagePassed {
        test_id: String,
        index: usize,
        duration_ms: u64,
    },
    StageFailed {
        test_id: String,
        index: usize,
        error: String,
        duration_ms: u64,
    },

    // Log event for coordinated output
    Log {
        message: String,
    },
}

/// Event emitter for broadcasting test events
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: TestEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates.
///
/// Cases may run concurrently, so one spinner is kept per test id.
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            // Piped output: no terminal escape codes
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinners: HashMap<String, ProgressBar> = HashMap::new();
        let mut stage_names: HashMap<(String, usize), String> = HashMap::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::SessionStarted {
                    session_id,
                    case_count,
                } => {
                    multi
                        .println(format!(
                            "\n{} Test session started: {} ({} cases)",
                            "▶".green().bold(),
                            session_id.cyan(),
                            case_count
                        ))
                        .ok();
                }

                TestEvent::SessionFinished { summary } => {
                    for (_, pb) in spinners.drain() {
                        pb.finish_and_clear();
                    }

                    println!("\n{} Test session finished", "■".blue().bold());
                    println!("  Total cases: {}", summary.total_cases);
                    println!(
                        "  {} passed, {} failed, {} skipped",
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red(),
                        summary.skipped.to_string().yellow()
                    );
                    if let Some(duration) = summary.total_duration_ms {
                        println!("  Duration: {}ms", duration);
                    }
                }

                TestEvent::CaseStarted {
                    test_id,
                    name,
                    workflow,
                } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    let style = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("  {spinner} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner());
                    pb.set_style(style);
                    pb.set_message(format!("{} [{}]", name.white().bold(), workflow));
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinners.insert(test_id, pb);
                }

                TestEvent::StageStarted {
                    test_id,
                    index,
                    stage,
                } => {
                    if let Some(pb) = spinners.get(&test_id) {
                        pb.set_message(format!("{} {}...", test_id.white().bold(), stage.dimmed()));
                    }
                    stage_names.insert((test_id, index), stage);
                }

                TestEvent::StagePassed {
                    test_id,
                    index,
                    duration_ms,
                } => {
                    if let Some(stage) = stage_names.get(&(test_id.clone(), index)) {
                        multi
                            .println(format!(
                                "    {} {} {} ({}ms)",
                                "✓".green(),
                                test_id.dimmed(),
                                stage,
                                duration_ms
                            ))
                            .ok();
                    }
                }

                TestEvent::StageFailed {
                    test_id,
                    index,
                    error,
                    duration_ms,
                } => {
                    if let Some(stage) = stage_names.get(&(test_id.clone(), index)) {
                        multi
                            .println(format!(
                                "    {} {} {} ({}ms)\n        {}",
                                "✗".red(),
                                test_id.dimmed(),
                                stage,
                                duration_ms,
                                error.red()
                            ))
                            .ok();
                    }
                }

                TestEvent::CaseFinished {
                    test_id,
                    name,
                    status,
                    error,
                    duration_ms,
                } => {
                    if let Some(pb) = spinners.remove(&test_id) {
                        pb.finish_and_clear();
                    }
                    stage_names.retain(|(id, _), _| id != &test_id);

                    let status_str = match &status {
                        CaseStatus::Passed => "PASSED".green().bold(),
                        CaseStatus::Failed => "FAILED".red().bold(),
                        CaseStatus::Skipped { .. } => "SKIPPED".yellow().bold(),
                        _ => "UNKNOWN".white().bold(),
                    };
                    let duration = duration_ms
                        .map(|d| format!(" ({}ms)", d))
                        .unwrap_or_default();
                    multi
                        .println(format!("  {} {} [{}]{}", "←".blue(), name, status_str, duration))
                        .ok();

                    match (&status, error) {
                        (CaseStatus::Skipped { reason }, _) => {
                            multi.println(format!("      {}", reason.dimmed())).ok();
                        }
                        (_, Some(error)) => {
                            multi.println(format!("      {}", error.red())).ok();
                        }
                        _ => {}
                    }
                }

                TestEvent::Log { message } => {
                    multi.println(format!("      {}", message)).ok();
                }
            }
        }
    }
}
