use crate::protocol::ElementHandle;

/// Errors raised by a [`Backend`](crate::backend::Backend) implementation.
#[derive(thiserror::Error, Debug, Clone)]
pub enum BackendError {
    // ============================================================
    // Lifecycle Errors
    // ============================================================
    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("Not ready")]
    NotReady,

    // ============================================================
    // Navigation Errors
    // ============================================================
    #[error("Navigation failed: {0}")]
    Navigation(String),

    // ============================================================
    // Element Errors
    // ============================================================
    #[error("Element {handle} is stale (removed from DOM)")]
    ElementStale { handle: ElementHandle },

    #[error("Element {handle} is not interactable: {reason}")]
    ElementNotInteractable {
        handle: ElementHandle,
        reason: String,
    },

    #[error("Invalid selector: {selector}")]
    SelectorInvalid { selector: String },

    // ============================================================
    // Execution Errors
    // ============================================================
    #[error("Script execution error: {0}")]
    ScriptError(String),

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    // ============================================================
    // System Errors
    // ============================================================
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other: {0}")]
    Other(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

impl BackendError {
    /// Short machine-readable code for logs and diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Launch(_) => "LAUNCH_ERROR",
            BackendError::NotReady => "NOT_READY",
            BackendError::Navigation(_) => "NAVIGATION_ERROR",
            BackendError::ElementStale { .. } => "ELEMENT_STALE",
            BackendError::ElementNotInteractable { .. } => "ELEMENT_NOT_INTERACTABLE",
            BackendError::SelectorInvalid { .. } => "SELECTOR_INVALID",
            BackendError::ScriptError(_) => "SCRIPT_ERROR",
            BackendError::Timeout { .. } => "TIMEOUT",
            BackendError::Screenshot(_) => "SCREENSHOT_ERROR",
            BackendError::Io(_) => "IO_ERROR",
            BackendError::Serialization(_) => "SERIALIZATION_ERROR",
            BackendError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

/// Maps a probe error code (from the page script) to a [`BackendError`].
pub fn map_probe_error(code: &str, message: &str) -> BackendError {
    match code {
        "SELECTOR_INVALID" => BackendError::SelectorInvalid {
            selector: message.to_string(),
        },
        "SCRIPT_ERROR" => BackendError::ScriptError(message.to_string()),
        _ => BackendError::Other(format!("{}: {}", code, message)),
    }
}
