//! Post-action outcome classification.
//!
//! Maps page state after the confirmation step to one of a closed set of
//! outcomes, in fixed priority order. The default is failure: success is
//! only ever concluded from positive evidence, never from the absence of
//! errors.

use crate::backend::{Backend, BackendError};
use crate::poll::{PollBudget, Poller};
use crate::targets;

/// Terminal result of a run (and, for the retryable variants, of a single
/// attempt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The renewal went through.
    Success,
    /// The dashboard refused because the renewal window isn't open yet.
    /// An expected business state, not a failure.
    SuccessPreconditionNotMet,
    /// The challenge verification was rejected.
    ChallengeRejected,
    /// Negative or missing evidence with no recognizable marker.
    IndeterminateFailure,
    /// A bounded wait (challenge resolution) ran out.
    Timeout,
}

impl Outcome {
    /// Outcomes that end the run with a zero exit code.
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::SuccessPreconditionNotMet)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Success => "success",
            Outcome::SuccessPreconditionNotMet => "precondition-not-met",
            Outcome::ChallengeRejected => "challenge-rejected",
            Outcome::IndeterminateFailure => "indeterminate-failure",
            Outcome::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text.contains(marker))
}

/// One inspection round. `None` means no indicator said anything yet.
async fn classify_once<B: Backend + ?Sized>(
    backend: &mut B,
) -> Result<Option<Outcome>, BackendError> {
    // Negative indicators outrank positive ones: dashboards happily render a
    // stale success banner next to a fresh error. Marker priority is fixed
    // across all indicators, not first-indicator-wins.
    let negatives = backend.query_all(&targets::negative_indicators()).await?;
    let negative_texts: Vec<String> = negatives
        .iter()
        .filter(|info| info.is_displayed())
        .map(|info| info.text.trim().to_lowercase())
        .filter(|text| !text.is_empty())
        .collect();

    if let Some(text) = negative_texts
        .iter()
        .find(|text| contains_any(text, targets::NOT_YET_MARKERS))
    {
        tracing::info!("negative indicator says not yet eligible: {:?}", text);
        return Ok(Some(Outcome::SuccessPreconditionNotMet));
    }
    if let Some(text) = negative_texts
        .iter()
        .find(|text| contains_any(text, targets::CHALLENGE_REJECTED_MARKERS))
    {
        tracing::warn!("negative indicator says challenge failed: {:?}", text);
        return Ok(Some(Outcome::ChallengeRejected));
    }
    if let Some(text) = negative_texts.first() {
        tracing::warn!("unrecognized negative indicator: {:?}", text);
        return Ok(Some(Outcome::IndeterminateFailure));
    }

    let positives = backend.query_all(&targets::positive_indicators()).await?;
    if positives.iter().any(|info| info.is_displayed()) {
        return Ok(Some(Outcome::Success));
    }

    // Whole-page fallback, only once no structured indicator exists at all.
    if negatives.is_empty() && positives.is_empty() {
        let html = backend.html().await?.to_lowercase();
        if contains_any(&html, targets::SUCCESS_MARKERS) {
            return Ok(Some(Outcome::Success));
        }
    }

    Ok(None)
}

/// Classify the current page within a short inspection budget.
///
/// Priority, checked every round: not-yet-eligible marker, then
/// challenge-failure marker, then any other negative indicator, then a
/// positive indicator. If nothing conclusive appears before the deadline the
/// outcome is `IndeterminateFailure`.
pub async fn classify<B: Backend + ?Sized>(
    backend: &mut B,
    budget: PollBudget,
) -> Result<Outcome, BackendError> {
    let mut poller = Poller::start(budget);
    loop {
        if let Some(outcome) = classify_once(backend).await? {
            return Ok(outcome);
        }
        if !poller.tick().await {
            tracing::warn!("no status indicator appeared within {:?}", budget.timeout);
            return Ok(Outcome::IndeterminateFailure);
        }
    }
}
