//! Anti-automation challenge detection and resolution.
//!
//! The engine never solves a challenge itself. Passive mitigations loaded
//! into the browser do the real work; this module only detects whether a
//! scope is gated, gives those mitigations a bounded window to act, and
//! optionally nudges the widget once before waiting for the positive
//! resolution signal.

use crate::backend::{Backend, BackendError};
use crate::poll::{PollBudget, Poller};
use crate::targets;
use std::time::Duration;

/// Observed state of a challenge within one scope. Only this module
/// transitions it; it is reset for every attempt that re-enters the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Absent,
    PresentUnresolved,
    PresentNudged,
    Resolved,
    TimedOut,
}

/// What part of the page a challenge gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeScope {
    /// The whole document is an interstitial.
    Page,
    /// A named container (CSS selector), e.g. the confirmation dialog.
    Container(String),
}

impl ChallengeScope {
    pub fn container(css: impl Into<String>) -> Self {
        ChallengeScope::Container(css.into())
    }

    fn container_css(&self) -> Option<&str> {
        match self {
            ChallengeScope::Page => None,
            ChallengeScope::Container(css) => Some(css.as_str()),
        }
    }
}

impl std::fmt::Display for ChallengeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengeScope::Page => f.write_str("page"),
            ChallengeScope::Container(css) => write!(f, "container {}", css),
        }
    }
}

/// Wait budget for one `await_clear` call. Passive slices come first so a
/// concurrently-acting mitigation is never fought; the single nudge only
/// happens after every passive round has gone by unresolved.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeBudget {
    /// Passive re-check rounds before the nudge.
    pub passive_rounds: u32,
    /// Length of one passive wait slice.
    pub passive_slice: Duration,
    /// Poll interval while waiting for the positive signal.
    pub poll_interval: Duration,
    /// Total wait for the positive signal after the passive phase.
    pub resolution_timeout: Duration,
}

impl Default for ChallengeBudget {
    fn default() -> Self {
        Self {
            passive_rounds: 3,
            passive_slice: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
            resolution_timeout: Duration::from_secs(60),
        }
    }
}

impl ChallengeBudget {
    /// The modal widget historically takes longest to verify.
    pub fn for_modal() -> Self {
        Self {
            resolution_timeout: Duration::from_secs(90),
            ..Self::default()
        }
    }
}

/// One observation of the scope, no waiting involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observation {
    Gated,
    Cleared,
    /// The dashboard rendered an explicit verification-failure message.
    Failed,
}

async fn observe<B: Backend + ?Sized>(
    backend: &mut B,
    scope: &ChallengeScope,
) -> Result<Observation, BackendError> {
    let html = backend.html().await?.to_lowercase();
    if html.contains(targets::CHALLENGE_ERROR_MARKER) {
        return Ok(Observation::Failed);
    }

    match scope {
        ChallengeScope::Page => {
            let title = backend.title().await?.to_lowercase();
            let gated = targets::PAGE_CHALLENGE_TITLE_MARKERS
                .iter()
                .any(|marker| title.contains(marker));
            Ok(if gated {
                Observation::Gated
            } else {
                Observation::Cleared
            })
        }
        ChallengeScope::Container(css) => {
            let frame = backend.query(&targets::challenge_frame(Some(css))).await?;
            let frame_present = frame.map(|info| info.is_displayed()).unwrap_or(false);
            if !frame_present {
                return Ok(Observation::Cleared);
            }
            if token_present(backend, Some(css)).await? {
                return Ok(Observation::Cleared);
            }
            Ok(Observation::Gated)
        }
    }
}

/// The widget writes a token into a hidden input once verification passes.
async fn token_present<B: Backend + ?Sized>(
    backend: &mut B,
    scope: Option<&str>,
) -> Result<bool, BackendError> {
    let input = backend.query(&targets::challenge_response(scope)).await?;
    Ok(input
        .and_then(|info| info.value)
        .map(|value| value.len() > targets::CHALLENGE_TOKEN_MIN_LEN)
        .unwrap_or(false))
}

/// Single best-effort nudge: a trusted click near the widget checkbox.
///
/// Advisory only. The checkbox sits at the left edge of the widget frame, so
/// the click lands a fixed offset in from the frame's left border at its
/// vertical center. Any failure here is a missed optimization, not an error.
async fn nudge<B: Backend + ?Sized>(backend: &mut B, scope: &ChallengeScope) -> bool {
    let frame_query = targets::challenge_frame(scope.container_css());
    let frame = match backend.query(&frame_query).await {
        Ok(Some(info)) if info.is_displayed() => info,
        Ok(_) => {
            tracing::debug!("no visible challenge frame to nudge in {}", scope);
            return false;
        }
        Err(e) => {
            tracing::debug!("challenge frame lookup failed during nudge: {}", e);
            return false;
        }
    };

    let x = frame.rect.x + 30.0;
    let y = frame.rect.y + frame.rect.height / 2.0;
    match backend.click_at(x, y).await {
        Ok(()) => {
            tracing::info!("nudged challenge widget in {} at ({:.0}, {:.0})", scope, x, y);
            true
        }
        Err(e) => {
            tracing::debug!("challenge nudge failed (continuing without): {}", e);
            false
        }
    }
}

/// Wait until the given scope is no longer gated by a challenge.
///
/// Returns `Resolved` or `TimedOut`; "still blocked" is an expected terminal
/// value, never an `Err`. Idempotent on a clear scope: one cheap check, no
/// sleeping.
pub async fn await_clear<B: Backend + ?Sized>(
    backend: &mut B,
    scope: &ChallengeScope,
    budget: &ChallengeBudget,
) -> Result<ChallengeState, BackendError> {
    match observe(backend, scope).await? {
        Observation::Cleared => return Ok(ChallengeState::Resolved),
        Observation::Failed => {
            tracing::warn!("challenge verification error reported in {}", scope);
            return Ok(ChallengeState::TimedOut);
        }
        Observation::Gated => {}
    }

    let mut state = ChallengeState::PresentUnresolved;
    tracing::info!("challenge gating {}; waiting for passive mitigation", scope);

    // Passive phase: let externally-loaded mitigations act undisturbed.
    for round in 1..=budget.passive_rounds {
        tokio::time::sleep(budget.passive_slice).await;
        match observe(backend, scope).await? {
            Observation::Cleared => {
                tracing::info!("challenge in {} cleared passively (round {})", scope, round);
                return Ok(ChallengeState::Resolved);
            }
            Observation::Failed => return Ok(ChallengeState::TimedOut),
            Observation::Gated => {}
        }
    }

    // Active phase: at most one nudge per await_clear call.
    if nudge(backend, scope).await {
        state = ChallengeState::PresentNudged;
    }
    tracing::debug!("challenge state after nudge phase: {:?}", state);

    // Final wait for the positive signal.
    let mut poller = Poller::start(PollBudget::new(
        budget.poll_interval,
        budget.resolution_timeout,
    ));
    loop {
        match observe(backend, scope).await? {
            Observation::Cleared => return Ok(ChallengeState::Resolved),
            Observation::Failed => return Ok(ChallengeState::TimedOut),
            Observation::Gated => {}
        }
        if !poller.tick().await {
            tracing::warn!(
                "challenge in {} unresolved after {:?}",
                scope,
                budget.resolution_timeout
            );
            return Ok(ChallengeState::TimedOut);
        }
    }
}
