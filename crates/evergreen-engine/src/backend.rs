use async_trait::async_trait;
pub use evergreen_common::error::BackendError;
use evergreen_common::protocol::{ClickMode, ElementInfo, Query};

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
}

/// The unified browser interface the engine runs against.
///
/// Implementations own the browser process (or a test double). Element
/// queries return `None`/empty on no-match rather than erroring; errors are
/// reserved for transport-level failures.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Launch the backend (start browser, load extensions, etc.)
    async fn launch(&mut self) -> Result<(), BackendError>;

    /// Close the backend and clean up resources. Must be safe to call on a
    /// backend that never launched or already closed.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Check if the backend is ready to accept commands.
    async fn is_ready(&self) -> bool;

    /// Navigate to a specific URL and wait for the load to settle.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError>;

    async fn current_url(&mut self) -> Result<String, BackendError>;

    async fn title(&mut self) -> Result<String, BackendError>;

    /// Full HTML snapshot of the current document.
    async fn html(&mut self) -> Result<String, BackendError>;

    /// First element matching the query, or `None`.
    async fn query(&mut self, query: &Query) -> Result<Option<ElementInfo>, BackendError>;

    /// All elements matching the query.
    async fn query_all(&mut self, query: &Query) -> Result<Vec<ElementInfo>, BackendError>;

    /// Click the first element matching the query.
    async fn click(&mut self, query: &Query, mode: ClickMode) -> Result<(), BackendError>;

    /// Dispatch a trusted click at viewport coordinates. Used to nudge
    /// widgets that live in cross-origin frames and cannot be queried.
    async fn click_at(&mut self, _x: f64, _y: f64) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("click_at".into()))
    }

    /// Replace the value of the first matching input and fire input events.
    async fn set_value(&mut self, query: &Query, text: &str) -> Result<(), BackendError>;

    /// Scroll the first matching element into view. Advisory; backends
    /// without scrolling support may ignore it.
    async fn scroll_into_view(&mut self, _query: &Query) -> Result<(), BackendError> {
        Ok(())
    }

    /// Capture a screenshot of the current viewport as PNG bytes.
    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError>;
}

/// Click with `Normal` mode first, then fall back to `Forced`.
///
/// The fallback is an explicit second dispatch mode, not an exception-driven
/// retry: a trusted event can miss (overlays, partially covered targets)
/// where a synthetic DOM click still lands.
pub async fn click_with_fallback<B: Backend + ?Sized>(
    backend: &mut B,
    query: &Query,
) -> Result<(), BackendError> {
    match backend.click(query, ClickMode::Normal).await {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::debug!("normal click on {} failed ({}), forcing", query, first);
            backend.click(query, ClickMode::Forced).await
        }
    }
}
