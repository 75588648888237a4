//! Wire types shared between the engine and the page-side probe.
//!
//! Every query the engine issues is a [`ElementQuery`]; backends answer with
//! a list of [`ElementInfo`] in DOM order. Elements are addressed afterwards
//! by the opaque [`ElementHandle`] the probe assigned to them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to an element tagged by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub u32);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a piece of text is compared against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Whitespace-normalized, case-insensitive equality.
    Exact,
    /// Case-insensitive substring.
    #[default]
    Partial,
}

impl MatchMode {
    /// Compare `text` against `target` under this mode.
    pub fn matches(self, text: &str, target: &str) -> bool {
        let text = normalize(text);
        let target = normalize(target);
        if target.is_empty() {
            return false;
        }
        match self {
            MatchMode::Exact => text == target,
            MatchMode::Partial => text.contains(&target),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::Partial => write!(f, "partial"),
        }
    }
}

/// Collapse whitespace runs and case-fold. Mirrors `norm()` in the probe.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One way of describing an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// Plain CSS selector.
    Css { css: String },
    /// CSS selector filtered by rendered text, like Playwright's `:has-text()`
    /// when `mode` is partial.
    CssText {
        css: String,
        text: String,
        #[serde(default)]
        mode: MatchMode,
    },
    /// Deepest elements whose rendered text matches `text`.
    Text { text: String, mode: MatchMode },
    /// Elements whose own text nodes match `text`, case-folded. Ignores all
    /// structure; the last-resort scan.
    OwnText { text: String, mode: MatchMode },
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css { css: css.into() }
    }

    pub fn css_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Selector::CssText {
            css: css.into(),
            text: text.into(),
            mode: MatchMode::Partial,
        }
    }

    pub fn text(text: impl Into<String>, mode: MatchMode) -> Self {
        Selector::Text {
            text: text.into(),
            mode,
        }
    }

    pub fn own_text(text: impl Into<String>, mode: MatchMode) -> Self {
        Selector::OwnText {
            text: text.into(),
            mode,
        }
    }

    /// Replace the match mode of a text-bearing selector. No-op for plain CSS.
    pub fn with_mode(mut self, new_mode: MatchMode) -> Self {
        match &mut self {
            Selector::Css { .. } => {}
            Selector::CssText { mode, .. }
            | Selector::Text { mode, .. }
            | Selector::OwnText { mode, .. } => *mode = new_mode,
        }
        self
    }

    /// Apply `f` to every free-text field (CSS included).
    pub fn map_text(self, f: impl Fn(&str) -> String) -> Self {
        match self {
            Selector::Css { css } => Selector::Css { css: f(&css) },
            Selector::CssText { css, text, mode } => Selector::CssText {
                css: f(&css),
                text: f(&text),
                mode,
            },
            Selector::Text { text, mode } => Selector::Text {
                text: f(&text),
                mode,
            },
            Selector::OwnText { text, mode } => Selector::OwnText {
                text: f(&text),
                mode,
            },
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css { css } => write!(f, "{}", css),
            Selector::CssText {
                css,
                text,
                mode: MatchMode::Partial,
            } => write!(f, "{}:has-text({:?})", css, text),
            Selector::CssText { css, text, mode } => {
                write!(f, "{}:has-text({:?}, {})", css, text, mode)
            }
            Selector::Text { text, mode } => write!(f, "text={:?} ({})", text, mode),
            Selector::OwnText { text, mode } => write!(f, "own-text={:?} ({})", text, mode),
        }
    }
}

/// A selector, optionally confined to the subtree of an already located element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementQuery {
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ElementHandle>,
}

impl ElementQuery {
    pub fn page(selector: Selector) -> Self {
        Self {
            selector,
            scope: None,
        }
    }

    pub fn within(selector: Selector, scope: ElementHandle) -> Self {
        Self {
            selector,
            scope: Some(scope),
        }
    }
}

/// Snapshot of one matched element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub handle: ElementHandle,
    #[serde(default)]
    pub tag: String,
    /// Rendered text, whitespace-collapsed.
    #[serde(default)]
    pub text: String,
    pub visible: bool,
}
