//! Interactive and batch front ends over a [`DecisionPipeline`].

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use gate_pipeline::{
    ArbitrationFailure, DecisionPipeline, DecisionReport, InputText, Label, RequestFailure,
    Resolution,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::terminal::Console;

const BANNER: &str = "Sentiment classification with backup fallback (type 'quit' to exit)";
const LATE_ANSWER: &str = "That answer came too late and was ignored.";

/// Result of one input line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed(DecisionReport),
    Failed(RequestFailure),
}

impl Outcome {
    pub async fn run(
        pipeline: &DecisionPipeline,
        input: InputText,
        cancel: &CancellationToken,
    ) -> Self {
        match pipeline.run_with_cancel(input.clone(), cancel).await {
            Ok(state) => Self::Completed(DecisionReport::from(&state)),
            Err(e) => Self::Failed(RequestFailure::new(&input, &e)),
        }
    }

    /// Why a clarification was asked for but never arrived
    fn unanswered(&self) -> Option<ArbitrationFailure> {
        let Self::Completed(report) = self else {
            return None;
        };
        match report.resolution {
            Resolution::SafeDefault {
                reason: reason @ (ArbitrationFailure::TimedOut | ArbitrationFailure::Cancelled),
            } => Some(reason),
            _ => None,
        }
    }

    pub fn render(&self, json: bool) -> String {
        if json {
            return serde_json::to_string(self).unwrap_or_else(|e| {
                format!(r#"{{"status":"render_error","message":"{e}"}}"#)
            });
        }
        match self {
            Self::Completed(report) => report.to_string(),
            Self::Failed(failure) => format!("Request failed: {failure}"),
        }
    }
}

/// Tallies printed when a session ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub completed: usize,
    /// Completed requests where the two models disagreed
    pub arbitrated: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SessionStats {
    fn count(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Completed(report) => {
                self.completed += 1;
                if report.resolution.arbitration_requested() {
                    self.arbitrated += 1;
                }
            }
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Prompt-driven loop: one review per line until `quit` or end of input.
pub struct InteractiveSession {
    pipeline: DecisionPipeline,
    console: Arc<Console>,
    json: bool,
    shutdown: CancellationToken,
}

impl InteractiveSession {
    pub fn new(pipeline: DecisionPipeline, console: Arc<Console>) -> Self {
        Self {
            pipeline,
            console,
            json: false,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Cancelling this token aborts a pending arbitration and ends the loop.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub async fn run(&self) -> std::io::Result<SessionStats> {
        let mut stats = SessionStats::default();
        // Set after a clarification timed out; the next line may be that answer.
        let mut late_answer_possible = false;
        self.console.write_line(BANNER).await?;

        loop {
            self.console.write("\nEnter a review: ").await?;
            let line = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                line = self.console.read_line() => line?,
            };
            let Some(line) = line else { break };

            if line.trim().eq_ignore_ascii_case("quit") {
                break;
            }
            if std::mem::take(&mut late_answer_possible) && Label::parse_answer(&line).is_some() {
                stats.skipped += 1;
                self.console.write_line(LATE_ANSWER).await?;
                continue;
            }
            let Ok(input) = InputText::new(line) else {
                stats.skipped += 1;
                self.console.write_line("Empty review, skipped.").await?;
                continue;
            };

            let outcome = Outcome::run(&self.pipeline, input, &self.shutdown.child_token()).await;
            stats.count(&outcome);
            match outcome.unanswered() {
                Some(ArbitrationFailure::TimedOut) => {
                    late_answer_possible = true;
                    self.console
                        .write_line("No answer in time. Keeping backup model prediction.")
                        .await?;
                }
                Some(_) => {
                    self.console
                        .write_line("Clarification cancelled. Keeping backup model prediction.")
                        .await?;
                }
                None => {}
            }
            self.console.write_line(&outcome.render(self.json)).await?;

            if self.shutdown.is_cancelled() {
                break;
            }
        }

        self.console.write_line("Exiting.").await?;
        info!(
            completed = stats.completed,
            arbitrated = stats.arbitrated,
            failed = stats.failed,
            skipped = stats.skipped,
            "Interactive session ended"
        );
        Ok(stats)
    }
}

/// Classify every non-empty line with at most `concurrency` requests in
/// flight. Outcomes come back in input order.
pub async fn run_batch<I>(
    pipeline: &DecisionPipeline,
    lines: I,
    concurrency: usize,
) -> Vec<Outcome>
where
    I: IntoIterator<Item = String>,
{
    let inputs: Vec<InputText> = lines
        .into_iter()
        .filter_map(|line| InputText::new(line).ok())
        .collect();
    info!(count = inputs.len(), concurrency, "Starting batch");

    let cancel = CancellationToken::new();
    let outcomes: Vec<Outcome> = stream::iter(inputs)
        .map(|input| {
            let cancel = &cancel;
            async move { Outcome::run(pipeline, input, cancel).await }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, Outcome::Failed(_)))
        .count();
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "Batch finished with failures");
    } else {
        info!(total = outcomes.len(), "Batch finished");
    }
    outcomes
}
