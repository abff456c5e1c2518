mod support;

use evergreen_engine::challenge::{self, ChallengeBudget, ChallengeScope, ChallengeState};
use evergreen_engine::targets;
use std::time::Duration;
use support::{ScriptedBackend, View, displayed, displayed_with_value};
use tokio::time::Instant;

const MODAL: &str = "#renew-modal";

#[tokio::test(start_paused = true)]
async fn clear_scope_resolves_without_sleeping() {
    let mut backend = ScriptedBackend::new(View::new("https://x.test/", "Dashboard"));
    let start = Instant::now();

    let state = challenge::await_clear(
        &mut backend,
        &ChallengeScope::Page,
        &ChallengeBudget::default(),
    )
    .await
    .unwrap();

    assert_eq!(state, ChallengeState::Resolved);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(backend.click_at_calls, 0);

    // Idempotent: a second call is just as cheap.
    let state = challenge::await_clear(
        &mut backend,
        &ChallengeScope::Page,
        &ChallengeBudget::default(),
    )
    .await
    .unwrap();
    assert_eq!(state, ChallengeState::Resolved);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn page_challenge_clearing_passively_skips_the_nudge() {
    let mut backend = ScriptedBackend::new(View::new("https://x.test/login", "Sign in"));
    // Gated on the first two observations, clear on the third.
    backend.title_queue = vec![
        "Just a moment...".into(),
        "Just a moment...".into(),
        "Sign in".into(),
    ];

    let budget = ChallengeBudget::default();
    let start = Instant::now();
    let state = challenge::await_clear(&mut backend, &ChallengeScope::Page, &budget)
        .await
        .unwrap();

    assert_eq!(state, ChallengeState::Resolved);
    // Two passive slices were waited out, nothing more.
    assert_eq!(start.elapsed(), budget.passive_slice * 2);
    assert_eq!(backend.click_at_calls, 0, "passive resolution must not nudge");
}

#[tokio::test(start_paused = true)]
async fn unresolved_modal_challenge_nudges_once_then_times_out() {
    let view = View::new("https://x.test/renew", "Dashboard")
        .with_element(&targets::challenge_frame(Some(MODAL)), displayed(""));
    let mut backend = ScriptedBackend::new(view);

    let budget = ChallengeBudget::for_modal();
    let start = Instant::now();
    let state = challenge::await_clear(
        &mut backend,
        &ChallengeScope::container(MODAL),
        &budget,
    )
    .await
    .unwrap();

    assert_eq!(state, ChallengeState::TimedOut);
    assert_eq!(backend.click_at_calls, 1, "exactly one best-effort nudge");
    let expected =
        budget.passive_slice * budget.passive_rounds + budget.resolution_timeout;
    assert_eq!(start.elapsed(), expected);
}

#[tokio::test(start_paused = true)]
async fn token_in_scope_counts_as_cleared() {
    let token = "t".repeat(40);
    let view = View::new("https://x.test/renew", "Dashboard")
        .with_element(&targets::challenge_frame(Some(MODAL)), displayed(""))
        .with_element(
            &targets::challenge_response(Some(MODAL)),
            displayed_with_value(&token),
        );
    let mut backend = ScriptedBackend::new(view);
    let start = Instant::now();

    let state = challenge::await_clear(
        &mut backend,
        &ChallengeScope::container(MODAL),
        &ChallengeBudget::for_modal(),
    )
    .await
    .unwrap();

    assert_eq!(state, ChallengeState::Resolved);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn short_placeholder_token_does_not_count() {
    let view = View::new("https://x.test/renew", "Dashboard")
        .with_element(&targets::challenge_frame(Some(MODAL)), displayed(""))
        .with_element(
            &targets::challenge_response(Some(MODAL)),
            displayed_with_value("stub"),
        );
    let mut backend = ScriptedBackend::new(view);

    let state = challenge::await_clear(
        &mut backend,
        &ChallengeScope::container(MODAL),
        &ChallengeBudget::for_modal(),
    )
    .await
    .unwrap();
    assert_eq!(state, ChallengeState::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn explicit_verification_error_ends_the_wait() {
    let view = View::new("https://x.test/renew", "Dashboard")
        .with_html("<div>Error verifying Turnstile response</div>")
        .with_element(&targets::challenge_frame(Some(MODAL)), displayed(""));
    let mut backend = ScriptedBackend::new(view);
    let start = Instant::now();

    let state = challenge::await_clear(
        &mut backend,
        &ChallengeScope::container(MODAL),
        &ChallengeBudget::for_modal(),
    )
    .await
    .unwrap();

    assert_eq!(state, ChallengeState::TimedOut);
    assert_eq!(start.elapsed(), Duration::ZERO, "no point waiting after a hard error");
}
