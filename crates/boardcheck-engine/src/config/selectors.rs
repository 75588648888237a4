//! Default selector chains for the target board.
//!
//! Text fields may contain `{project}`, `{section}` and `{title}`; they are
//! substituted from the run's search criteria when the chains are built.

use crate::protocol::{MatchMode, Selector};
use serde::{Deserialize, Serialize};

/// One alternative for locating a logical control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub selector: Selector,
    /// When set, the located element is replaced by its nearest ancestor
    /// matching this CSS selector (a column heading resolves to its column).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclose: Option<String>,
}

impl StrategySpec {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            enclose: None,
        }
    }

    pub fn enclosed_by(selector: Selector, enclose: impl Into<String>) -> Self {
        Self {
            selector,
            enclose: Some(enclose.into()),
        }
    }
}

fn css_chain(selectors: &[&str]) -> Vec<StrategySpec> {
    selectors
        .iter()
        .map(|css| StrategySpec::new(Selector::css(*css)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorCatalog {
    #[serde(default = "default_login_trigger")]
    pub login_trigger: Vec<StrategySpec>,
    #[serde(default = "default_email_field")]
    pub email_field: Vec<StrategySpec>,
    #[serde(default = "default_password_field")]
    pub password_field: Vec<StrategySpec>,
    #[serde(default = "default_submit_button")]
    pub submit_button: Vec<StrategySpec>,
    /// Anything only rendered for a signed-in user.
    #[serde(default = "default_login_indicator")]
    pub login_indicator: Vec<StrategySpec>,
    #[serde(default = "default_app_menu")]
    pub app_menu: Vec<StrategySpec>,
    #[serde(default = "default_projects_entry")]
    pub projects_entry: Vec<StrategySpec>,
    #[serde(default = "default_project_tile")]
    pub project_tile: Vec<StrategySpec>,
    /// Marker that the project's board has rendered.
    #[serde(default = "default_board_ready")]
    pub board_ready: Vec<StrategySpec>,
    #[serde(default = "default_section")]
    pub section: Vec<StrategySpec>,
    /// CSS patterns for record cards.
    #[serde(default = "default_cards")]
    pub cards: Vec<String>,
}

impl Default for SelectorCatalog {
    fn default() -> Self {
        Self {
            login_trigger: default_login_trigger(),
            email_field: default_email_field(),
            password_field: default_password_field(),
            submit_button: default_submit_button(),
            login_indicator: default_login_indicator(),
            app_menu: default_app_menu(),
            projects_entry: default_projects_entry(),
            project_tile: default_project_tile(),
            board_ready: default_board_ready(),
            section: default_section(),
            cards: default_cards(),
        }
    }
}

impl SelectorCatalog {
    /// Name and contents of every chain, for validation.
    pub fn chains(&self) -> [(&'static str, &[StrategySpec]); 10] {
        [
            ("login_trigger", self.login_trigger.as_slice()),
            ("email_field", self.email_field.as_slice()),
            ("password_field", self.password_field.as_slice()),
            ("submit_button", self.submit_button.as_slice()),
            ("login_indicator", self.login_indicator.as_slice()),
            ("app_menu", self.app_menu.as_slice()),
            ("projects_entry", self.projects_entry.as_slice()),
            ("project_tile", self.project_tile.as_slice()),
            ("board_ready", self.board_ready.as_slice()),
            ("section", self.section.as_slice()),
        ]
    }
}

fn default_login_trigger() -> Vec<StrategySpec> {
    css_chain(&[
        "span.te_user_account_icon.d-block",
        "i.fa-user-circle-o",
        ".fa-user-circle-o",
        ".fa-user",
        "a[href*='/web/login']",
    ])
}

fn default_email_field() -> Vec<StrategySpec> {
    css_chain(&["input#login", "input[name='login']", "input[type='email']"])
}

fn default_password_field() -> Vec<StrategySpec> {
    css_chain(&["input#password", "input[type='password']"])
}

fn default_submit_button() -> Vec<StrategySpec> {
    css_chain(&["button[type='submit']", "input[type='submit']"])
}

fn default_login_indicator() -> Vec<StrategySpec> {
    css_chain(&[".o_main_navbar", ".o_user_menu", ".o_menu_apps"])
}

fn default_app_menu() -> Vec<StrategySpec> {
    css_chain(&[".o_menu_apps", ".o_menu_toggle", ".fa-th"])
}

fn default_projects_entry() -> Vec<StrategySpec> {
    vec![
        StrategySpec::new(Selector::text("Projects", MatchMode::Partial)),
        StrategySpec::new(Selector::text("Project", MatchMode::Partial)),
    ]
}

fn default_project_tile() -> Vec<StrategySpec> {
    vec![
        StrategySpec::new(Selector::css_text(".o_kanban_record", "{project}")),
        StrategySpec::new(Selector::text("{project}", MatchMode::Partial)),
    ]
}

fn default_board_ready() -> Vec<StrategySpec> {
    css_chain(&[".o_kanban_group", ".o_kanban_view", ".kanban-column"])
}

fn default_section() -> Vec<StrategySpec> {
    vec![
        StrategySpec::enclosed_by(
            Selector::css_text(".o_kanban_group .o_column_title", "{section}")
                .with_mode(MatchMode::Exact),
            ".o_kanban_group",
        ),
        StrategySpec::enclosed_by(
            Selector::css_text(".o_kanban_group .o_kanban_header", "{section}"),
            ".o_kanban_group",
        ),
        StrategySpec::enclosed_by(
            Selector::css_text("h3", "{section}").with_mode(MatchMode::Exact),
            ".o_kanban_group, .kanban-column, section",
        ),
        StrategySpec::enclosed_by(Selector::text("{section}", MatchMode::Exact), "div"),
        // Whole-column text also matches cards that mention the section.
        StrategySpec::new(Selector::css_text(".kanban-column", "{section}")),
    ]
}

fn default_cards() -> Vec<String> {
    vec![
        ".o_kanban_record".to_string(),
        ".kanban-card".to_string(),
        ".task-card".to_string(),
    ]
}
