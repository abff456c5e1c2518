//! Run orchestration: owns the session lifecycle, sequences stages, applies
//! the bounded retry loop and reports progress.
//!
//! Failures inside a stage never cross the attempt boundary as errors; the
//! orchestrator converts them into retry decisions. Only "all attempts
//! exhausted" and configuration problems (handled before this type is even
//! built) reach the caller.

use crate::backend::Backend;
use crate::classify::Outcome;
use crate::config::Config;
use crate::report::{Reporter, RunSummary};
use crate::stage::{Attempt, Stage, StageExecutor, StageResult, Timeouts};

/// Hard cap on stage transitions inside one attempt. The stage graph is
/// tiny; anything beyond this is a cycle.
const MAX_TRANSITIONS_PER_ATTEMPT: u32 = 16;

/// Final result of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: Outcome,
    pub attempts: u32,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        if self.outcome.is_terminal_success() { 0 } else { 1 }
    }
}

enum AttemptEnd {
    Classified(Outcome),
    /// Non-retryable stage failure; the run stops here.
    Aborted(String),
}

pub struct Orchestrator<'a, B: Backend + ?Sized> {
    backend: &'a mut B,
    config: &'a Config,
    reporter: &'a dyn Reporter,
    timeouts: Timeouts,
}

impl<'a, B: Backend + ?Sized> Orchestrator<'a, B> {
    pub fn new(backend: &'a mut B, config: &'a Config, reporter: &'a dyn Reporter) -> Self {
        Self {
            backend,
            config,
            reporter,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Run to completion. The browser session is torn down exactly once on
    /// every exit path, launch failure included.
    pub async fn run(mut self) -> RunReport {
        self.reporter
            .notify(
                &format!("renewal run starting for {}", self.config.redacted_email()),
                true,
            )
            .await;

        let report = self.run_inner().await;

        if let Err(e) = self.backend.close().await {
            tracing::warn!("session teardown failed: {}", e);
        }

        let summary = RunSummary {
            outcome: report.outcome,
            attempts: report.attempts,
            account: self.config.redacted_email(),
        };
        if let Some(url) = self.reporter.publish(&summary).await {
            tracing::info!("run report published at {}", url);
        }
        self.reporter
            .notify(&summary.message(), report.outcome.is_terminal_success())
            .await;
        tracing::info!(
            "run finished: {} after {} attempt(s)",
            report.outcome,
            report.attempts
        );
        report
    }

    async fn run_inner(&mut self) -> RunReport {
        if let Err(e) = self.backend.launch().await {
            tracing::error!("failed to launch browser session: {}", e);
            return RunReport {
                outcome: Outcome::IndeterminateFailure,
                attempts: 0,
            };
        }

        let mut last = Outcome::IndeterminateFailure;
        for index in 1..=self.config.max_attempts {
            tracing::info!("=== attempt {}/{} ===", index, self.config.max_attempts);
            let end = self.run_attempt(index).await;
            self.record_attempt_artifact(index).await;

            match end {
                AttemptEnd::Classified(outcome) => {
                    tracing::info!("attempt {} ended with {}", index, outcome);
                    last = outcome;
                    if outcome.is_terminal_success() {
                        return RunReport {
                            outcome,
                            attempts: index,
                        };
                    }
                }
                AttemptEnd::Aborted(reason) => {
                    tracing::error!("run aborted: {}", reason);
                    return RunReport {
                        outcome: Outcome::IndeterminateFailure,
                        attempts: index,
                    };
                }
            }
        }

        RunReport {
            outcome: last,
            attempts: self.config.max_attempts,
        }
    }

    /// One attempt: a fresh `Attempt` value and a full page reset via
    /// re-navigation. A failed challenge interaction routinely corrupts the
    /// page's client-side state, so nothing in-page is reused across
    /// attempts.
    async fn run_attempt(&mut self, index: u32) -> AttemptEnd {
        let mut attempt = Attempt::new(index);
        let mut stage = if index == 1 {
            Stage::Init
        } else {
            Stage::NavigateToTarget
        };
        let mut executor = StageExecutor::new(&mut *self.backend, self.config, &self.timeouts);

        for _ in 0..MAX_TRANSITIONS_PER_ATTEMPT {
            match executor.run(stage, &mut attempt).await {
                Ok(StageResult::Advance(next)) => stage = next,
                Ok(StageResult::Finished(outcome)) => return AttemptEnd::Classified(outcome),
                Ok(StageResult::Retry(reason)) => {
                    tracing::warn!("attempt {}: stage {} retries run: {}", index, stage, reason);
                    return AttemptEnd::Classified(Outcome::IndeterminateFailure);
                }
                Ok(StageResult::Fail(reason)) => return AttemptEnd::Aborted(reason),
                Err(e) => {
                    tracing::warn!("attempt {}: stage {} errored: {}", index, stage, e);
                    return AttemptEnd::Classified(Outcome::IndeterminateFailure);
                }
            }
        }
        tracing::warn!("attempt {}: stage cycle detected, ending attempt", index);
        AttemptEnd::Classified(Outcome::IndeterminateFailure)
    }

    async fn record_attempt_artifact(&mut self, index: u32) {
        match self.backend.screenshot().await {
            Ok(bytes) => {
                self.reporter
                    .record_artifact(&format!("attempt-{}", index), &bytes)
                    .await;
            }
            Err(e) => tracing::debug!("screenshot for attempt {} failed: {}", index, e),
        }
    }
}
