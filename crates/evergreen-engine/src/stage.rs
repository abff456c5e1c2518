//! Workflow stages.
//!
//! Each stage is one bounded transition: given the session and the current
//! page, perform side effects and say what happens next. Stages never
//! propagate element-not-found as an error; everything transient becomes a
//! `Retry`, everything business-terminal becomes `Finished(outcome)`.

use crate::backend::{Backend, BackendError, click_with_fallback};
use crate::challenge::{self, ChallengeBudget, ChallengeScope, ChallengeState};
use crate::classify::{self, Outcome};
use crate::config::{Config, redact};
use crate::locator::{self, LocatorSpec};
use crate::poll::{PollBudget, Poller};
use crate::targets;
use evergreen_common::protocol::Query;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Login,
    NavigateToTarget,
    TriggerAction,
    ModalChallenge,
    Confirm,
    Classify,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Login => "login",
            Stage::NavigateToTarget => "navigate-to-target",
            Stage::TriggerAction => "trigger-action",
            Stage::ModalChallenge => "modal-challenge",
            Stage::Confirm => "confirm",
            Stage::Classify => "classify",
        };
        f.write_str(s)
    }
}

/// What a stage decided.
#[derive(Debug)]
pub enum StageResult {
    /// Continue the attempt at the given stage.
    Advance(Stage),
    /// The attempt produced an outcome (terminal-success ends the run,
    /// everything else ends just this attempt).
    Finished(Outcome),
    /// Transient failure; end the attempt and let the retry controller
    /// decide.
    Retry(String),
    /// Non-retryable failure; abort the run.
    Fail(String),
}

/// One pass through the trigger-confirm-classify subsequence. Attempt-local
/// state never leaks across attempts; a new value is built per loop
/// iteration.
#[derive(Debug)]
pub struct Attempt {
    pub index: u32,
    /// Re-login bounces consumed this attempt (cap 1).
    relogins: u32,
    /// Times Confirm routed back through ModalChallenge (cap 1).
    modal_revisits: u32,
    /// Which container selector the confirmation dialog matched.
    modal_scope: Option<String>,
}

impl Attempt {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            relogins: 0,
            modal_revisits: 0,
            modal_scope: None,
        }
    }
}

/// Per-stage wait budgets. One place, all explicit; an unbounded wait is a
/// design defect.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Primary action control lookup.
    pub locate: Duration,
    /// Sign-in form field lookup.
    pub form_locate: Duration,
    /// Post-submit wait for the URL to leave the sign-in path.
    pub login_redirect: Duration,
    /// Confirmation dialog appearance.
    pub modal_appear: Duration,
    /// Outcome inspection after confirm.
    pub classify: Duration,
    /// Quick re-classification when the action control is missing.
    pub early_classify: Duration,
    pub page_challenge: ChallengeBudget,
    pub modal_challenge: ChallengeBudget,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            locate: Duration::from_secs(10),
            form_locate: Duration::from_secs(5),
            login_redirect: Duration::from_secs(20),
            modal_appear: Duration::from_secs(10),
            classify: Duration::from_secs(10),
            early_classify: Duration::from_secs(3),
            page_challenge: ChallengeBudget::default(),
            modal_challenge: ChallengeBudget::for_modal(),
        }
    }
}

/// Runs one stage against the live session.
pub struct StageExecutor<'a, B: Backend + ?Sized> {
    backend: &'a mut B,
    config: &'a Config,
    timeouts: &'a Timeouts,
}

impl<'a, B: Backend + ?Sized> StageExecutor<'a, B> {
    pub fn new(backend: &'a mut B, config: &'a Config, timeouts: &'a Timeouts) -> Self {
        Self {
            backend,
            config,
            timeouts,
        }
    }

    pub async fn run(
        &mut self,
        stage: Stage,
        attempt: &mut Attempt,
    ) -> Result<StageResult, BackendError> {
        tracing::info!("attempt {}: stage {}", attempt.index, stage);
        match stage {
            Stage::Init => self.init().await,
            Stage::Login => self.login(attempt).await,
            Stage::NavigateToTarget => self.navigate_to_target(attempt).await,
            Stage::TriggerAction => self.trigger_action(attempt).await,
            Stage::ModalChallenge => self.modal_challenge(attempt).await,
            Stage::Confirm => self.confirm(attempt).await,
            Stage::Classify => self.classify_outcome().await,
        }
    }

    async fn init(&mut self) -> Result<StageResult, BackendError> {
        if !self.backend.is_ready().await {
            return Ok(StageResult::Fail("backend is not ready".into()));
        }
        tracing::info!(
            "session ready for account {} targeting {}",
            redact(&self.config.email),
            self.config.renew_url
        );
        Ok(StageResult::Advance(Stage::Login))
    }

    /// Sign in. Idempotent: when no credential form is present the session
    /// is already authenticated and the stage just moves on.
    async fn login(&mut self, _attempt: &mut Attempt) -> Result<StageResult, BackendError> {
        self.backend.navigate(self.config.login_url.as_str()).await?;

        let state = challenge::await_clear(
            self.backend,
            &ChallengeScope::Page,
            &self.timeouts.page_challenge,
        )
        .await?;
        if state == ChallengeState::TimedOut {
            return Ok(StageResult::Finished(Outcome::Timeout));
        }

        let form_budget = PollBudget::with_timeout(self.timeouts.form_locate);
        let email = match locator::resolve(self.backend, &targets::email_field(), None, form_budget)
            .await?
        {
            Some(target) => target,
            None => {
                tracing::info!("no credential form; already authenticated");
                return Ok(StageResult::Advance(Stage::NavigateToTarget));
            }
        };
        let password =
            locator::resolve(self.backend, &targets::password_field(), None, form_budget).await?;
        let submit =
            locator::resolve(self.backend, &targets::login_submit(), None, form_budget).await?;
        let (Some(password), Some(submit)) = (password, submit) else {
            return Ok(StageResult::Retry("sign-in form incomplete".into()));
        };

        self.backend.set_value(&email.query, &self.config.email).await?;
        self.backend
            .set_value(&password.query, &self.config.password)
            .await?;
        tracing::info!("credentials entered for {}", redact(&self.config.email));

        // The sign-in form can carry its own embedded challenge widget.
        let widget = self
            .backend
            .query(&targets::challenge_frame(Some("body")))
            .await?;
        if widget.map(|info| info.is_displayed()).unwrap_or(false) {
            let state = challenge::await_clear(
                self.backend,
                &ChallengeScope::container("body"),
                &self.timeouts.page_challenge,
            )
            .await?;
            if state == ChallengeState::TimedOut {
                // Submit anyway; some deployments accept the form regardless.
                tracing::warn!("sign-in challenge unresolved, submitting anyway");
            }
        }

        click_with_fallback(self.backend, &submit.query).await?;

        // Wait for the URL to move off the sign-in path.
        let mut poller = Poller::start(PollBudget::with_timeout(self.timeouts.login_redirect));
        loop {
            let url = self.backend.current_url().await?;
            if !url.contains(targets::LOGIN_PATH) {
                tracing::info!("signed in, now at {}", url);
                return Ok(StageResult::Advance(Stage::NavigateToTarget));
            }
            if !poller.tick().await {
                return Ok(StageResult::Retry("still on sign-in page after submit".into()));
            }
        }
    }

    async fn navigate_to_target(
        &mut self,
        attempt: &mut Attempt,
    ) -> Result<StageResult, BackendError> {
        self.backend.navigate(self.config.renew_url.as_str()).await?;

        let state = challenge::await_clear(
            self.backend,
            &ChallengeScope::Page,
            &self.timeouts.page_challenge,
        )
        .await?;
        if state == ChallengeState::TimedOut {
            return Ok(StageResult::Finished(Outcome::Timeout));
        }

        let url = self.backend.current_url().await?;
        if url.contains(targets::LOGIN_PATH) {
            if attempt.relogins == 0 {
                attempt.relogins += 1;
                tracing::info!("redirected to sign-in; authenticating");
                return Ok(StageResult::Advance(Stage::Login));
            }
            return Ok(StageResult::Retry("bounced back to sign-in page".into()));
        }

        Ok(StageResult::Advance(Stage::TriggerAction))
    }

    /// Click the primary action control. When it is missing, classify first:
    /// the dashboard replaces the control with a status banner once the
    /// action is unavailable, and that is a terminal business state rather
    /// than a locate failure.
    async fn trigger_action(&mut self, _attempt: &mut Attempt) -> Result<StageResult, BackendError> {
        let budget = PollBudget::with_timeout(self.timeouts.locate);
        let Some(target) =
            locator::resolve(self.backend, &targets::renew_control(), None, budget).await?
        else {
            let outcome = classify::classify(
                self.backend,
                PollBudget::with_timeout(self.timeouts.early_classify),
            )
            .await?;
            if outcome.is_terminal_success() {
                tracing::info!("action control absent; page already reports {}", outcome);
                return Ok(StageResult::Finished(outcome));
            }
            return Ok(StageResult::Retry("renew control not found".into()));
        };

        if let Err(e) = self.backend.scroll_into_view(&target.query).await {
            tracing::debug!("scroll-into-view failed (continuing): {}", e);
        }
        click_with_fallback(self.backend, &target.query).await?;
        Ok(StageResult::Advance(Stage::ModalChallenge))
    }

    async fn modal_challenge(&mut self, attempt: &mut Attempt) -> Result<StageResult, BackendError> {
        let Some(scope) = self.wait_for_modal().await? else {
            return Ok(StageResult::Retry("confirmation dialog never appeared".into()));
        };
        attempt.modal_scope = Some(scope.clone());

        match challenge::await_clear(
            self.backend,
            &ChallengeScope::Container(scope),
            &self.timeouts.modal_challenge,
        )
        .await?
        {
            ChallengeState::TimedOut => Ok(StageResult::Finished(Outcome::Timeout)),
            _ => Ok(StageResult::Advance(Stage::Confirm)),
        }
    }

    async fn wait_for_modal(&mut self) -> Result<Option<String>, BackendError> {
        let mut poller = Poller::start(PollBudget::with_timeout(self.timeouts.modal_appear));
        loop {
            for css in [targets::RENEW_MODAL, targets::ANY_OPEN_MODAL] {
                let hit = self.backend.query(&Query::css(css)).await?;
                if hit.map(|info| info.is_displayed()).unwrap_or(false) {
                    return Ok(Some(css.to_string()));
                }
            }
            if !poller.tick().await {
                return Ok(None);
            }
        }
    }

    /// Click the confirmation control. A control that exists but stays
    /// disabled means the challenge was not actually cleared; route back
    /// through ModalChallenge once before giving up on the attempt.
    async fn confirm(&mut self, attempt: &mut Attempt) -> Result<StageResult, BackendError> {
        let spec = match attempt.modal_scope.as_deref() {
            Some(scope) => targets::confirm_control_in(scope),
            None => targets::confirm_control(),
        };
        let budget = PollBudget::with_timeout(self.timeouts.form_locate);
        if let Some(target) = locator::resolve(self.backend, &spec, None, budget).await? {
            click_with_fallback(self.backend, &target.query).await?;
            return Ok(StageResult::Advance(Stage::Classify));
        }

        let any_state = disabled_ok(match attempt.modal_scope.as_deref() {
            Some(scope) => targets::confirm_control_in(scope),
            None => targets::confirm_control(),
        });
        let present = locator::resolve(self.backend, &any_state, None, PollBudget::immediate())
            .await?
            .is_some();
        if present {
            if attempt.modal_revisits == 0 {
                attempt.modal_revisits += 1;
                tracing::info!("confirmation control disabled; re-checking modal challenge");
                return Ok(StageResult::Advance(Stage::ModalChallenge));
            }
            return Ok(StageResult::Retry("confirmation control stayed disabled".into()));
        }
        Ok(StageResult::Retry("confirmation control not found".into()))
    }

    async fn classify_outcome(&mut self) -> Result<StageResult, BackendError> {
        let outcome = classify::classify(
            self.backend,
            PollBudget::with_timeout(self.timeouts.classify),
        )
        .await?;
        Ok(StageResult::Finished(outcome))
    }
}

fn disabled_ok(spec: LocatorSpec) -> LocatorSpec {
    LocatorSpec {
        require_enabled: false,
        ..spec
    }
}
