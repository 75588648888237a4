//! Run inputs: who logs in and what to look for.

use crate::protocol::MatchMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Login identity and secret. Immutable once built.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    identity: String,
    secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"[redacted]")
            .finish()
    }
}

/// What to look for and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub project: String,
    pub section: String,
    pub title: String,
    #[serde(default)]
    pub match_mode: MatchMode,
}

impl SearchCriteria {
    pub fn new(
        project: impl Into<String>,
        section: impl Into<String>,
        title: impl Into<String>,
        match_mode: MatchMode,
    ) -> Self {
        Self {
            project: project.into(),
            section: section.into(),
            title: title.into(),
            match_mode,
        }
    }

    /// Substitute `{project}`, `{section}` and `{title}` in a selector template.
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{project}", &self.project)
            .replace("{section}", &self.section)
            .replace("{title}", &self.title)
    }
}
