//! Multi-strategy element locator.
//!
//! A logical UI target ("the renew control", "the confirmation button") is
//! described once as an ordered strategy list; the resolver walks the list
//! on every poll round and the first strategy that yields a displayed match
//! wins. Order encodes confidence: the most specific selector first, generic
//! text matching last, since text is the most likely to false-positive
//! across locales and layout changes.

use crate::backend::{Backend, BackendError};
use crate::poll::{PollBudget, Poller};
use evergreen_common::protocol::{ElementInfo, Query};

/// One way of finding a target element.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// CSS selector.
    Css(String),
    /// Visible-text match over interactive elements.
    Text(String),
    /// Hierarchical XPath predicate.
    XPath(String),
    /// Raw passthrough for an already-fully-qualified query (e.g. one that
    /// carries its own scope).
    Raw(Query),
}

impl Strategy {
    pub fn css(selector: impl Into<String>) -> Self {
        Strategy::Css(selector.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Strategy::Text(text.into())
    }

    fn to_query(&self, scope: Option<&str>) -> Query {
        let query = match self {
            Strategy::Css(selector) => Query::css(selector.clone()),
            Strategy::Text(text) => Query::text(text.clone()),
            Strategy::XPath(path) => Query::xpath(path.clone()),
            Strategy::Raw(query) => return query.clone(),
        };
        match scope {
            Some(scope) => query.within(scope),
            None => query,
        }
    }
}

/// Immutable description of one logical target.
#[derive(Debug, Clone)]
pub struct LocatorSpec {
    /// Logical name, for logs only.
    pub name: &'static str,
    /// Strategies in descending confidence order.
    pub strategies: Vec<Strategy>,
    /// Whether a match must also be enabled (confirmation controls), on top
    /// of the baseline displayed-with-nonzero-size requirement.
    pub require_enabled: bool,
}

impl LocatorSpec {
    pub fn new(name: &'static str, strategies: Vec<Strategy>) -> Self {
        Self {
            name,
            strategies,
            require_enabled: false,
        }
    }

    pub fn enabled_only(mut self) -> Self {
        self.require_enabled = true;
        self
    }

    fn accepts(&self, info: &ElementInfo) -> bool {
        info.is_displayed() && (!self.require_enabled || info.enabled)
    }
}

/// A resolved target: the query that won plus the element snapshot it
/// produced. The query is kept so callers can act (click, fill) on the same
/// element the locator saw.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub query: Query,
    pub info: ElementInfo,
}

/// Try every strategy once, in order. `Ok(None)` means no strategy produced
/// an acceptable match right now.
async fn resolve_once<B: Backend + ?Sized>(
    backend: &mut B,
    spec: &LocatorSpec,
    scope: Option<&str>,
) -> Result<Option<ResolvedTarget>, BackendError> {
    for strategy in &spec.strategies {
        let query = strategy.to_query(scope);
        if let Some(info) = backend.query(&query).await? {
            if spec.accepts(&info) {
                return Ok(Some(ResolvedTarget { query, info }));
            }
            tracing::trace!(
                "{}: {} matched but was rejected (visible={}, enabled={})",
                spec.name,
                query,
                info.visible,
                info.enabled
            );
        }
    }
    Ok(None)
}

/// Resolve a target within the timeout budget, polling at the budget's
/// interval. Returns `Ok(None)` on timeout — not finding the element is a
/// normal result the caller interprets, not an error.
pub async fn resolve<B: Backend + ?Sized>(
    backend: &mut B,
    spec: &LocatorSpec,
    scope: Option<&str>,
    budget: PollBudget,
) -> Result<Option<ResolvedTarget>, BackendError> {
    let mut poller = Poller::start(budget);
    loop {
        if let Some(target) = resolve_once(backend, spec, scope).await? {
            tracing::debug!("{}: resolved via {}", spec.name, target.query);
            return Ok(Some(target));
        }
        if !poller.tick().await {
            tracing::debug!(
                "{}: no strategy matched within {:?}",
                spec.name,
                budget.timeout
            );
            return Ok(None);
        }
    }
}
