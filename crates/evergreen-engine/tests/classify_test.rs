mod support;

use evergreen_engine::classify::{self, Outcome};
use evergreen_engine::poll::PollBudget;
use evergreen_engine::targets;
use std::time::Duration;
use support::{ScriptedBackend, View, displayed, hidden};
use tokio::time::Instant;

fn budget() -> PollBudget {
    PollBudget::new(Duration::from_millis(500), Duration::from_secs(5))
}

#[tokio::test(start_paused = true)]
async fn not_yet_eligible_beats_any_positive_banner() {
    // Priority is fixed: a "too early" negative wins even when a stale
    // success banner is also on the page.
    let view = View::new("https://x.test/renew", "Dashboard")
        .with_element(
            &targets::negative_indicators(),
            displayed("Too early: you can't renew, available in 3 days"),
        )
        .with_element(&targets::positive_indicators(), displayed("Renewed!"));
    let mut backend = ScriptedBackend::new(view);

    let outcome = classify::classify(&mut backend, budget()).await.unwrap();
    assert_eq!(outcome, Outcome::SuccessPreconditionNotMet);
    assert!(outcome.is_terminal_success());
}

#[tokio::test(start_paused = true)]
async fn challenge_failure_marker_is_recognized() {
    let view = View::new("https://x.test/renew", "Dashboard").with_element(
        &targets::negative_indicators(),
        displayed("Error verifying Turnstile response"),
    );
    let mut backend = ScriptedBackend::new(view);

    let outcome = classify::classify(&mut backend, budget()).await.unwrap();
    assert_eq!(outcome, Outcome::ChallengeRejected);
}

#[tokio::test(start_paused = true)]
async fn unrecognized_negative_text_is_indeterminate() {
    let view = View::new("https://x.test/renew", "Dashboard").with_element(
        &targets::negative_indicators(),
        displayed("Something went wrong"),
    );
    let mut backend = ScriptedBackend::new(view);

    let outcome = classify::classify(&mut backend, budget()).await.unwrap();
    assert_eq!(outcome, Outcome::IndeterminateFailure);
}

#[tokio::test(start_paused = true)]
async fn positive_indicator_is_success() {
    let view = View::new("https://x.test/renew", "Dashboard")
        .with_element(&targets::positive_indicators(), displayed("Server renewed"));
    let mut backend = ScriptedBackend::new(view);

    let outcome = classify::classify(&mut backend, budget()).await.unwrap();
    assert_eq!(outcome, Outcome::Success);
}

#[tokio::test(start_paused = true)]
async fn hidden_indicators_are_ignored() {
    let view = View::new("https://x.test/renew", "Dashboard")
        .with_element(&targets::negative_indicators(), hidden("old error"))
        .with_element(&targets::positive_indicators(), displayed("Renewed"));
    let mut backend = ScriptedBackend::new(view);

    let outcome = classify::classify(&mut backend, budget()).await.unwrap();
    assert_eq!(outcome, Outcome::Success);
}

#[tokio::test(start_paused = true)]
async fn html_fallback_only_applies_without_indicators() {
    let view = View::new("https://x.test/renew", "Dashboard")
        .with_html("<p>Your server was successfully renewed.</p>");
    let mut backend = ScriptedBackend::new(view);

    let outcome = classify::classify(&mut backend, budget()).await.unwrap();
    assert_eq!(outcome, Outcome::Success);
}

#[tokio::test(start_paused = true)]
async fn silence_is_never_success() {
    let mut backend = ScriptedBackend::new(View::new("https://x.test/renew", "Dashboard"));
    let start = Instant::now();

    let outcome = classify::classify(&mut backend, budget()).await.unwrap();
    assert_eq!(outcome, Outcome::IndeterminateFailure);
    // The inspection budget was exhausted before concluding.
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}
