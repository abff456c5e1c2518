//! The logical UI targets of the renewal dashboard, each as an ordered
//! strategy list, plus the page markers the challenge resolver and outcome
//! classifier key on.

use crate::locator::{LocatorSpec, Strategy};
use evergreen_common::protocol::Query;

/// CSS selector of the renewal confirmation dialog.
pub const RENEW_MODAL: &str = "#renew-modal";
/// Fallback container when the dialog id drifts.
pub const ANY_OPEN_MODAL: &str = ".modal.show";

/// Substring identifying the challenge provider's widget frame.
pub const CHALLENGE_FRAME_MARKER: &str = "challenges.cloudflare.com";
/// Hidden input the widget fills with a token once verification passes.
pub const CHALLENGE_RESPONSE_INPUT: &str = "input[name=\"cf-turnstile-response\"]";
/// A token shorter than this is a placeholder, not a pass.
pub const CHALLENGE_TOKEN_MIN_LEN: usize = 20;
/// Interstitial page titles while the whole document is gated.
pub const PAGE_CHALLENGE_TITLE_MARKERS: &[&str] = &["just a moment", "please wait"];
/// Explicit verification-failure text the dashboard renders.
pub const CHALLENGE_ERROR_MARKER: &str = "error verifying turnstile";

/// Negative-status text meaning the renewal window simply isn't open yet.
pub const NOT_YET_MARKERS: &[&str] = &["too early", "can't renew", "cannot renew", "available in"];
/// Negative-status text meaning the challenge itself was rejected.
pub const CHALLENGE_REJECTED_MARKERS: &[&str] = &["turnstile", "captcha", "verification"];
/// Positive-status text meaning the renewal went through.
pub const SUCCESS_MARKERS: &[&str] = &["success", "renewed"];

/// Path fragment of the sign-in page; used both to derive the default login
/// URL and to detect being bounced back to it.
pub const LOGIN_PATH: &str = "/auth/login";

pub fn email_field() -> LocatorSpec {
    LocatorSpec::new(
        "email field",
        vec![
            Strategy::css("input[name=\"email\"]"),
            Strategy::css("input#email"),
            Strategy::css("input[type=\"email\"]"),
        ],
    )
}

pub fn password_field() -> LocatorSpec {
    LocatorSpec::new(
        "password field",
        vec![
            Strategy::css("input[name=\"password\"]"),
            Strategy::css("input#password"),
            Strategy::css("input[type=\"password\"]"),
        ],
    )
}

pub fn login_submit() -> LocatorSpec {
    LocatorSpec::new(
        "sign-in submit",
        vec![
            Strategy::css("button[type=\"submit\"]"),
            Strategy::css("button#submit"),
        ],
    )
}

/// The primary action control. The data attributes that open the renewal
/// dialog are the most trustworthy signal; bare text match is last.
pub fn renew_control() -> LocatorSpec {
    LocatorSpec::new(
        "renew control",
        vec![
            Strategy::css("button[data-bs-toggle=\"modal\"][data-bs-target=\"#renew-modal\"]"),
            Strategy::XPath("//button[contains(., \"Renew\")]".into()),
            Strategy::text("Renew"),
        ],
    )
}

/// Confirmation control inside the dialog. Fully-qualified raw queries so
/// each carries its own container scope.
pub fn confirm_control() -> LocatorSpec {
    LocatorSpec::new(
        "confirm control",
        vec![
            Strategy::Raw(Query::css("button[type=\"submit\"]").within(RENEW_MODAL)),
            Strategy::Raw(Query::css("button[type=\"submit\"]").within(ANY_OPEN_MODAL)),
        ],
    )
    .enabled_only()
}

/// Confirmation control when the dialog container is already known.
pub fn confirm_control_in(scope: &str) -> LocatorSpec {
    LocatorSpec::new(
        "confirm control",
        vec![Strategy::Raw(Query::css("button[type=\"submit\"]").within(scope))],
    )
    .enabled_only()
}

/// The challenge widget frame, optionally inside a container.
pub fn challenge_frame(scope: Option<&str>) -> Query {
    let query = Query::css(format!("iframe[src*=\"{}\"]", CHALLENGE_FRAME_MARKER));
    match scope {
        Some(scope) => query.within(scope),
        None => query,
    }
}

/// The widget's response token input, optionally inside a container.
pub fn challenge_response(scope: Option<&str>) -> Query {
    let query = Query::css(CHALLENGE_RESPONSE_INPUT);
    match scope {
        Some(scope) => query.within(scope),
        None => query,
    }
}

/// Dashboard status indicators, in the polarity the classifier reads them.
pub fn negative_indicators() -> Query {
    Query::css(".alert-danger, .alert-warning, [role=\"alert\"]")
}

pub fn positive_indicators() -> Query {
    Query::css(".alert-success")
}
