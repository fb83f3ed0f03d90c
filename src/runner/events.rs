use super::state::{AttemptStatus, RunSummary};
use tokio::sync::broadcast;

/// Workflow execution events for real-time console output
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Run events
    RunStarted {
        run_id: String,
        workflow_count: usize,
    },
    RunFinished {
        summary: RunSummary,
    },

    // Attempt events
    AttemptStarted {
        test_name: String,
        attempt: u32,
        max_attempts: u32,
    },
    AttemptFinished {
        test_name: String,
        attempt: u32,
        status: AttemptStatus,
        duration_seconds: f64,
        error: Option<String>,
    },
    RetryScheduled {
        test_name: String,
        next_attempt: u32,
        delay_seconds: f64,
    },

    // Step events
    StepStarted {
        index: usize,
        step: String,
    },
    StepPassed {
        index: usize,
        duration_ms: u64,
    },
    StepFailed {
        index: usize,
        error: String,
        duration_ms: u64,
    },

    Log {
        message: String,
    },
}

/// Event emitter for broadcasting workflow events
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    /// No-op when nobody is listening
    pub fn emit(&self, event: TestEvent) {
        let _ = self.sender.send(event);
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(TestEvent::Log {
            message: message.into(),
        });
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener printing colored progress lines
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        let interactive = std::io::stdout().is_terminal();
        let mut spinner: Option<ProgressBar> = None;
        let mut step_text = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("Console listener skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::RunStarted {
                    run_id,
                    workflow_count,
                } => {
                    println!(
                        "\n{} Run {} started ({} workflows)",
                        "▶".green().bold(),
                        run_id.cyan(),
                        workflow_count
                    );
                }

                TestEvent::RunFinished { summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("\n{} Run finished", "■".blue().bold());
                    println!("  Workflows: {}", summary.total);
                    println!(
                        "  {} passed, {} failed",
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red()
                    );
                    println!("  Attempts: {}", summary.total_attempts);
                    println!("  Duration: {:.2}s", summary.duration_seconds);
                }

                TestEvent::AttemptStarted {
                    test_name,
                    attempt,
                    max_attempts,
                } => {
                    println!(
                        "\n  {} {} (attempt {}/{})",
                        "→".blue(),
                        test_name.white().bold(),
                        attempt,
                        max_attempts
                    );
                }

                TestEvent::AttemptFinished {
                    test_name,
                    attempt,
                    status,
                    duration_seconds,
                    error,
                } => {
                    let status_str = match status {
                        AttemptStatus::Passed => "PASSED".green().bold(),
                        AttemptStatus::Failed => "FAILED".red().bold(),
                        AttemptStatus::Running => "RUNNING".yellow().bold(),
                    };
                    println!(
                        "  {} {} attempt {} [{}] {:.2}s",
                        "←".blue(),
                        test_name,
                        attempt,
                        status_str,
                        duration_seconds
                    );
                    if let Some(error) = error {
                        println!("      {}", error.red());
                    }
                }

                TestEvent::RetryScheduled {
                    test_name,
                    next_attempt,
                    delay_seconds,
                } => {
                    println!(
                        "  {} {}",
                        "↻".yellow(),
                        format!(
                            "retrying {} as attempt {} in {:.1}s",
                            test_name, next_attempt, delay_seconds
                        )
                        .yellow()
                    );
                }

                TestEvent::StepStarted { index, step } => {
                    step_text = format!("[{}] {}... ", index + 1, step.dimmed());
                    if interactive {
                        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout());
                        if let Ok(style) = ProgressStyle::default_spinner()
                            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                            .template("    {spinner} {msg}")
                        {
                            pb.set_style(style);
                        }
                        pb.set_message(step_text.clone());
                        pb.enable_steady_tick(StdDuration::from_millis(100));
                        spinner = Some(pb);
                    }
                }

                TestEvent::StepPassed { duration_ms, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✓".green(), step_text, duration_ms);
                }

                TestEvent::StepFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✗".red(), step_text, duration_ms);
                    println!("        {}", error.dimmed());
                }

                TestEvent::Log { message } => match spinner {
                    Some(ref pb) => pb.println(format!("      {}", message)),
                    None => println!("      {}", message),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_noop() {
        let emitter = EventEmitter::default();
        emitter.log("nobody listens");
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let (emitter, mut rx) = EventEmitter::new();
        emitter.emit(TestEvent::StepStarted {
            index: 0,
            step: "Open login".into(),
        });
        emitter.emit(TestEvent::StepPassed {
            index: 0,
            duration_ms: 12,
        });

        assert!(matches!(rx.recv().await.unwrap(), TestEvent::StepStarted { index: 0, .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            TestEvent::StepPassed { duration_ms: 12, .. }
        ));
    }
}
