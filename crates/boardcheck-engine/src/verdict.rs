//! The single value a run produces, plus its JSON report form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A full-page capture taken at a lifecycle stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceArtifact {
    pub stage: String,
    pub path: PathBuf,
    /// Milliseconds since the Unix epoch.
    pub captured_at: u64,
}

/// Anything worth telling the caller beyond found / not found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Diagnostic {
    Evidence(EvidenceArtifact),
    /// The section container was never resolved; the whole page was searched.
    DegradedScope { section: String },
    /// Text matched the title but lay outside the section.
    RejectedOutsideSection { text: String },
    /// Accepted only by the structure-agnostic text scan.
    LowConfidenceMatch { text: String },
    /// No signed-in indicator appeared after submitting credentials.
    UnverifiedLogin,
    /// A navigation hop's ready marker never rendered.
    UnconfirmedHop { hop: String },
    LocatorExhausted {
        target: String,
        attempted: Vec<String>,
    },
    StageFailed { stage: String, detail: String },
}

impl Diagnostic {
    pub fn code(&self) -> &'static str {
        match self {
            Diagnostic::Evidence(_) => "Evidence",
            Diagnostic::DegradedScope { .. } => "DegradedScope",
            Diagnostic::RejectedOutsideSection { .. } => "RejectedOutsideSection",
            Diagnostic::LowConfidenceMatch { .. } => "LowConfidenceMatch",
            Diagnostic::UnverifiedLogin => "UnverifiedLogin",
            Diagnostic::UnconfirmedHop { .. } => "UnconfirmedHop",
            Diagnostic::LocatorExhausted { .. } => "LocatorExhausted",
            Diagnostic::StageFailed { .. } => "StageFailed",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Evidence(a) => write!(f, "evidence [{}] {}", a.stage, a.path.display()),
            Diagnostic::DegradedScope { section } => {
                write!(f, "section '{}' not located, searched whole page", section)
            }
            Diagnostic::RejectedOutsideSection { text } => {
                write!(f, "'{}' rejected: outside section", text)
            }
            Diagnostic::LowConfidenceMatch { text } => {
                write!(f, "'{}' matched by text scan only", text)
            }
            Diagnostic::UnverifiedLogin => f.write_str("login not verified"),
            Diagnostic::UnconfirmedHop { hop } => write!(f, "{} not confirmed rendered", hop),
            Diagnostic::LocatorExhausted { target, attempted } => {
                write!(f, "'{}' not located after {} strategies", target, attempted.len())
            }
            Diagnostic::StageFailed { stage, detail } => write!(f, "{} failed: {}", stage, detail),
        }
    }
}

/// Terminal result of a run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_text: Option<String>,
    diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Verdict {
    pub fn found(matched_text: impl Into<String>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            found: true,
            matched_text: Some(matched_text.into()),
            diagnostics,
            error: None,
        }
    }

    pub fn not_found(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            found: false,
            matched_text: None,
            diagnostics,
            error: None,
        }
    }

    /// A run that could not finish. Never carries a match.
    pub fn failed(error: impl Into<String>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            found: false,
            matched_text: None,
            diagnostics,
            error: Some(error.into()),
        }
    }

    pub fn is_found(&self) -> bool {
        self.found
    }

    pub fn matched_text(&self) -> Option<&str> {
        self.matched_text.as_deref()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_diagnostic(&self, code: &str) -> bool {
        self.diagnostics.iter().any(|d| d.code() == code)
    }

    /// Evidence captures in the order they were taken.
    pub fn evidence(&self) -> impl Iterator<Item = &EvidenceArtifact> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::Evidence(a) => Some(a),
            _ => None,
        })
    }

    pub fn report(&self) -> RunReport {
        RunReport::from(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    Yes,
    No,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Yes => f.write_str("Yes"),
            Answer::No => f.write_str("No"),
        }
    }
}

/// What callers receive: `{ success, found, answer, matchedText?, diagnostics, error? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub success: bool,
    pub found: bool,
    pub answer: Answer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Verdict> for RunReport {
    fn from(verdict: &Verdict) -> Self {
        Self {
            success: verdict.error.is_none(),
            found: verdict.found,
            answer: if verdict.found { Answer::Yes } else { Answer::No },
            matched_text: verdict.matched_text.clone(),
            diagnostics: verdict.diagnostics.clone(),
            error: verdict.error.clone(),
        }
    }
}

impl RunReport {
    /// 0 when found, 1 otherwise. With `strict`, failed runs exit 2.
    pub fn exit_code(&self, strict: bool) -> i32 {
        match (self.found, self.success) {
            (true, _) => 0,
            (false, false) if strict => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_found_report_shape() {
        let verdict = Verdict::found("Testing Ticket", vec![]);
        let value = serde_json::to_value(verdict.report()).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "found": true,
                "answer": "Yes",
                "matchedText": "Testing Ticket",
                "diagnostics": []
            })
        );
    }

    #[test]
    fn test_failed_report_shape() {
        let verdict = Verdict::failed(
            "stage aborted: authentication",
            vec![Diagnostic::StageFailed {
                stage: "authentication".into(),
                detail: "no login trigger".into(),
            }],
        );
        let report = verdict.report();
        assert!(!report.success);
        assert!(!report.found);
        assert_eq!(report.answer, Answer::No);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["error"], "stage aborted: authentication");
        assert_eq!(value["diagnostics"][0]["kind"], "StageFailed");
        assert!(value.get("matchedText").is_none());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Verdict::found("x", vec![]).report().exit_code(false), 0);
        assert_eq!(Verdict::not_found(vec![]).report().exit_code(true), 1);
        let failed = Verdict::failed("stage aborted: navigation", vec![]).report();
        assert_eq!(failed.exit_code(false), 1);
        assert_eq!(failed.exit_code(true), 2);
    }

    #[test]
    fn test_diagnostic_codes_and_evidence_filter() {
        let verdict = Verdict::not_found(vec![
            Diagnostic::Evidence(EvidenceArtifact {
                stage: "after_login".into(),
                path: PathBuf::from("evidence/screenshot_after_login_1.png"),
                captured_at: 1,
            }),
            Diagnostic::DegradedScope {
                section: "Resolved".into(),
            },
        ]);
        assert!(verdict.has_diagnostic("DegradedScope"));
        assert!(!verdict.has_diagnostic("UnverifiedLogin"));
        assert_eq!(verdict.evidence().count(), 1);
    }
}
