use thiserror::Error;

/// Errors surfaced by a browser backend.
///
/// These describe transport-level trouble (the browser is gone, a CDP call
/// failed). "Element not found" is never an error at this layer; queries
/// return `Option`/`Vec` and callers decide what absence means.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend not ready. Call launch() first.")]
    NotReady,

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation not supported by this backend: {0}")]
    NotSupported(String),

    #[error("Backend error: {0}")]
    Other(String),
}
