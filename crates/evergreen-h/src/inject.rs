//! Probe injection and evaluation plumbing.
//!
//! All element work goes through a small script injected into the page
//! (`probe.js`, exposed as `window.__evergreen`). Evaluations race a timeout
//! so a JS dialog can't hang the run, and context errors during navigation
//! are retried a bounded number of times.

use chromiumoxide::Page;
use std::error::Error;
use std::time::Duration;

const PROBE_JS: &str = include_str!("probe.js");

/// Timeout for one JavaScript evaluation. Prevents hanging when a dialog
/// (alert/confirm/prompt) blocks the JS thread.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when the context is not found (page navigating).
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

type BoxError = Box<dyn Error + Send + Sync>;

/// Check if an error indicates the page context is unavailable (e.g. during
/// navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

async fn ensure_probe(page: &Page) -> Result<(), BoxError> {
    let is_loaded: bool = page
        .evaluate("typeof window.__evergreen !== 'undefined'")
        .await
        .map_err(|e| format!("Failed to check probe status: {}", e))?
        .into_value()
        .map_err(|e| format!("Failed to get bool value: {}", e))?;

    if !is_loaded {
        page.evaluate(PROBE_JS)
            .await
            .map_err(|e| format!("Failed to inject probe.js: {}", e))?;
    }

    Ok(())
}

/// Call a `window.__evergreen` method with JSON arguments and return the
/// JSON result.
pub async fn call(
    page: &Page,
    method: &str,
    args: &[serde_json::Value],
) -> Result<serde_json::Value, BoxError> {
    let rendered: Vec<String> = args
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<_, _>>()?;
    let expression = format!("window.__evergreen.{}({})", method, rendered.join(", "));
    tracing::trace!("evaluating: {}", expression);

    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        if let Err(e) = ensure_probe(page).await {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
                continue;
            }
            return Err(e);
        }

        match evaluate_with_timeout(page, &expression).await {
            Ok(value) => return Ok(value),
            Err(EvalError::Timeout) => {
                return Err(
                    "Probe call timed out - possibly blocked by a dialog (alert/confirm/prompt)"
                        .into(),
                );
            }
            Err(EvalError::Context(err_str)) => {
                tracing::debug!(
                    "context error during probe call (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Other(err_str)) => {
                return Err(format!("Evaluation failed: {}", err_str).into());
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| "Failed to execute probe call after retries".to_string())
        .into())
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

async fn evaluate_with_timeout(
    page: &Page,
    expression: &str,
) -> Result<serde_json::Value, EvalError> {
    let eval_result = tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await;

    match eval_result {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                Err(EvalError::Context(err_str))
            } else {
                Err(EvalError::Other(err_str))
            }
        }
        Ok(Ok(remote_object)) => remote_object
            .into_value::<serde_json::Value>()
            .map_err(|e| EvalError::Other(format!("Failed to get result: {}", e))),
    }
}
