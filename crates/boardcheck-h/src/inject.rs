use boardcheck_engine::backend::BackendError;
use boardcheck_probe::{PROBE_JS, PROBE_LOADED_CHECK};
use chromiumoxide::Page;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// Default timeout for JavaScript evaluation (10 seconds).
/// This prevents hanging when dialogs (alert/confirm/prompt) block the JS thread.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when context is not found (page navigating).
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// What the probe answered: a value, or an error code with a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeReply {
    Ok(serde_json::Value),
    Failed { code: String, message: String },
}

#[derive(Deserialize)]
struct RawReply {
    #[serde(default)]
    ok: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RawError>,
}

#[derive(Deserialize)]
struct RawError {
    code: String,
    #[serde(default)]
    message: String,
}

impl ProbeReply {
    fn parse(value: serde_json::Value) -> Result<Self, BackendError> {
        let raw: RawReply = serde_json::from_value(value)?;
        match (raw.error, raw.ok) {
            (Some(err), _) => Ok(ProbeReply::Failed {
                code: err.code,
                message: err.message,
            }),
            // `{ok: null}` deserializes as a missing field.
            (None, ok) => Ok(ProbeReply::Ok(ok.unwrap_or(serde_json::Value::Null))),
        }
    }
}

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Retry an async operation that may fail due to context errors during page navigation.
/// Returns immediately on success or non-context errors; retries only on context errors.
async fn retry_on_context_error<T, E, F, Fut>(
    operation_name: &str,
    mut operation: F,
) -> Result<T, BackendError>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let err_str = e.to_string();
                if is_context_error(&err_str) {
                    tracing::debug!(
                        "{} context error (attempt {}/{}), retrying...",
                        operation_name,
                        attempt + 1,
                        MAX_CONTEXT_RETRIES
                    );
                    last_error = Some(err_str);
                    tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
                    continue;
                }
                return Err(BackendError::ScriptError(err_str));
            }
        }
    }

    Err(BackendError::ScriptError(last_error.unwrap_or_else(|| {
        format!("{} failed after retries", operation_name)
    })))
}

pub async fn inject_probe(page: &Page) -> Result<(), BackendError> {
    retry_on_context_error("Probe injection", || try_inject_probe(page)).await
}

async fn try_inject_probe(page: &Page) -> Result<(), String> {
    let is_loaded: bool = page
        .evaluate(PROBE_LOADED_CHECK)
        .await
        .map_err(|e| format!("Failed to check probe status: {}", e))?
        .into_value()
        .map_err(|e| format!("Failed to get bool value: {}", e))?;

    if !is_loaded {
        page.evaluate(PROBE_JS)
            .await
            .map_err(|e| format!("Failed to inject probe: {}", e))?;
    }

    Ok(())
}

/// Evaluate `window.__boardcheck.<call>` in the current document, installing
/// the probe first. Navigations re-create the document, so injection runs on
/// every call.
pub async fn call_probe(page: &Page, call: &str) -> Result<ProbeReply, BackendError> {
    let expression = format!("window.__boardcheck.{}", call);
    tracing::trace!("Evaluating probe call: {}", expression);

    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        inject_probe(page).await?;

        match evaluate_with_timeout(page, &expression).await {
            Ok(value) => return ProbeReply::parse(value),
            Err(EvalError::Timeout) => {
                return Err(BackendError::Timeout {
                    operation: "probe call, possibly blocked by a dialog".into(),
                });
            }
            Err(EvalError::Context(err_str)) => {
                tracing::debug!(
                    "Context error during probe call (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Other(err_str)) => {
                return Err(BackendError::ScriptError(format!(
                    "Evaluation failed: {}",
                    err_str
                )));
            }
        }
    }

    Err(BackendError::ScriptError(last_error.unwrap_or_else(|| {
        "Failed to call probe after retries".to_string()
    })))
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ok_reply() {
        let reply = ProbeReply::parse(json!({"ok": [{"handle": 1}]})).unwrap();
        assert_eq!(reply, ProbeReply::Ok(json!([{"handle": 1}])));
    }

    #[test]
    fn test_parse_null_reply() {
        let reply = ProbeReply::parse(json!({"ok": null})).unwrap();
        assert_eq!(reply, ProbeReply::Ok(serde_json::Value::Null));
    }

    #[test]
    fn test_parse_error_reply() {
        let reply =
            ProbeReply::parse(json!({"error": {"code": "ELEMENT_STALE", "message": "gone"}}))
                .unwrap();
        assert_eq!(
            reply,
            ProbeReply::Failed {
                code: "ELEMENT_STALE".into(),
                message: "gone".into()
            }
        );
    }

    #[test]
    fn test_context_errors() {
        assert!(is_context_error("Execution context was destroyed."));
        assert!(!is_context_error("ReferenceError: x is not defined"));
    }
}
