use crate::protocol::ElementInfo;
use thiserror::Error;

/// Successful outcome of a chain lookup.
#[derive(Debug, Clone)]
pub struct Located {
    pub element: ElementInfo,
    /// Position of the winning strategy in the chain.
    pub strategy_index: usize,
    /// Human-readable form of the winning strategy.
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    /// No strategy produced a visible element.
    #[error("No strategy located '{target}' (tried: {})", attempted.join("; "))]
    Exhausted {
        target: String,
        attempted: Vec<String>, // Strategies tried
    },

    /// At least one strategy found a visible element, but every interaction failed.
    #[error("'{target}' was found but could not be used: {reason}")]
    NotInteractable {
        target: String,
        reason: String,
        attempted: Vec<String>,
    },
}

impl LocatorError {
    pub fn target(&self) -> &str {
        match self {
            LocatorError::Exhausted { target, .. } | LocatorError::NotInteractable { target, .. } => {
                target
            }
        }
    }

    pub fn attempted(&self) -> &[String] {
        match self {
            LocatorError::Exhausted { attempted, .. }
            | LocatorError::NotInteractable { attempted, .. } => attempted,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, LocatorError::Exhausted { .. })
    }
}
