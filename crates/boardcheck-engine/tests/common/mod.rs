#![allow(dead_code)]

use async_trait::async_trait;
use boardcheck_engine::backend::{Backend, BackendError, NavigationResult};
use boardcheck_engine::config::{BoardcheckConfig, TimingsConfig};
use boardcheck_engine::criteria::{Credentials, SearchCriteria};
use boardcheck_engine::protocol::{ElementHandle, ElementInfo, ElementQuery, MatchMode, Selector};
use std::time::Duration;

/// In-memory page. Elements are stored in DOM order; children must be added
/// after their parent.
#[derive(Debug, Default)]
pub struct FakeBoard {
    elements: Vec<FakeElement>,

    pub launches: usize,
    pub closes: usize,
    pub screenshots: usize,
    pub navigations: Vec<String>,
    pub queries: Vec<ElementQuery>,
    pub clicks: Vec<ElementHandle>,
    pub typed: Vec<(ElementHandle, String)>,
    pub keys: Vec<(ElementHandle, String)>,

    pub fail_launch: bool,
    pub fail_screenshot: bool,
    /// Queries whose selector renders containing this string panic.
    pub panic_on: Option<String>,
    /// Queries whose selector renders containing this string never complete.
    pub stall_on: Option<String>,
    /// Queries whose selector renders containing this string fail.
    pub fail_on: Option<String>,
}

#[derive(Debug, Clone)]
struct FakeElement {
    parent: Option<usize>,
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    own_text: String,
    visible: bool,
    clickable: bool,
    /// Hidden until this many queries have been answered.
    appears_after: usize,
}

impl FakeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element described like `div.o_kanban_group` or
    /// `input#login[type='text']`.
    pub fn add(&mut self, parent: Option<ElementHandle>, spec: &str, text: &str) -> ElementHandle {
        let compound = parse_compound(spec).unwrap_or_else(|e| panic!("bad element spec {spec}: {e}"));
        let element = FakeElement {
            parent: parent.map(index),
            tag: compound.tag.unwrap_or_else(|| "div".to_string()),
            id: compound.id,
            classes: compound.classes,
            attrs: compound
                .attrs
                .into_iter()
                .map(|a| (a.name, a.value))
                .collect(),
            own_text: text.to_string(),
            visible: true,
            clickable: true,
            appears_after: 0,
        };
        self.elements.push(element);
        ElementHandle(self.elements.len() as u32)
    }

    pub fn hide(&mut self, handle: ElementHandle) {
        self.elements[index(handle)].visible = false;
    }

    pub fn make_unclickable(&mut self, handle: ElementHandle) {
        self.elements[index(handle)].clickable = false;
    }

    pub fn appear_after(&mut self, handle: ElementHandle, queries: usize) {
        self.elements[index(handle)].appears_after = queries;
    }

    /// Queries whose selector mentions `needle`.
    pub fn queries_for(&self, needle: &str) -> usize {
        self.queries
            .iter()
            .filter(|q| q.selector.to_string().contains(needle))
            .count()
    }

    fn is_visible(&self, i: usize) -> bool {
        let mut cur = Some(i);
        while let Some(c) = cur {
            let el = &self.elements[c];
            if !el.visible || self.queries.len() < el.appears_after {
                return false;
            }
            cur = el.parent;
        }
        true
    }

    fn is_descendant(&self, i: usize, ancestor: usize) -> bool {
        let mut cur = self.elements[i].parent;
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.elements[c].parent;
        }
        false
    }

    fn rendered_text(&self, i: usize) -> String {
        let mut parts = vec![self.elements[i].own_text.clone()];
        for j in (i + 1)..self.elements.len() {
            if self.is_descendant(j, i) {
                parts.push(self.elements[j].own_text.clone());
            }
        }
        parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn info(&self, i: usize) -> ElementInfo {
        ElementInfo {
            handle: ElementHandle(i as u32 + 1),
            tag: self.elements[i].tag.clone(),
            text: self.rendered_text(i),
            visible: self.is_visible(i),
        }
    }

    fn matches_css(&self, i: usize, list: &[Vec<Compound>]) -> bool {
        list.iter().any(|complex| self.matches_complex(i, complex))
    }

    fn matches_complex(&self, i: usize, parts: &[Compound]) -> bool {
        let Some((last, rest)) = parts.split_last() else {
            return false;
        };
        if !last.matches(&self.elements[i]) {
            return false;
        }
        let mut remaining = rest.iter().rev().peekable();
        let mut cur = self.elements[i].parent;
        while let Some(c) = cur {
            match remaining.peek() {
                None => break,
                Some(part) if part.matches(&self.elements[c]) => {
                    remaining.next();
                }
                Some(_) => {}
            }
            cur = self.elements[c].parent;
        }
        remaining.peek().is_none()
    }

    fn resolve(&self, query: &ElementQuery) -> Result<Vec<ElementInfo>, BackendError> {
        let scope = match query.scope {
            Some(handle) => Some(self.lookup(handle)?),
            None => None,
        };
        let in_scope = |i: usize| scope.is_none_or(|s| self.is_descendant(i, s));

        let css_list = |css: &str| {
            parse_selector_list(css).map_err(|_| BackendError::SelectorInvalid {
                selector: css.to_string(),
            })
        };

        let picked: Vec<usize> = match &query.selector {
            Selector::Css { css } => {
                let list = css_list(css)?;
                (0..self.elements.len())
                    .filter(|&i| in_scope(i) && self.matches_css(i, &list))
                    .collect()
            }
            Selector::CssText { css, text, mode } => {
                let list = css_list(css)?;
                (0..self.elements.len())
                    .filter(|&i| in_scope(i) && self.matches_css(i, &list))
                    .filter(|&i| mode.matches(&self.rendered_text(i), text))
                    .collect()
            }
            Selector::Text { text, mode } => {
                let hits: Vec<usize> = (0..self.elements.len())
                    .filter(|&i| in_scope(i) && mode.matches(&self.rendered_text(i), text))
                    .collect();
                hits.iter()
                    .copied()
                    .filter(|&i| !hits.iter().any(|&j| self.is_descendant(j, i)))
                    .collect()
            }
            Selector::OwnText { text, mode } => (0..self.elements.len())
                .filter(|&i| in_scope(i) && mode.matches(&self.elements[i].own_text, text))
                .collect(),
        };

        Ok(picked.into_iter().map(|i| self.info(i)).collect())
    }

    fn lookup(&self, handle: ElementHandle) -> Result<usize, BackendError> {
        let i = index(handle);
        if i < self.elements.len() {
            Ok(i)
        } else {
            Err(BackendError::ElementStale { handle })
        }
    }

    fn usable(&self, handle: ElementHandle) -> Result<usize, BackendError> {
        let i = self.lookup(handle)?;
        if !self.elements[i].clickable || !self.is_visible(i) {
            return Err(BackendError::ElementNotInteractable {
                handle,
                reason: "covered by another element".into(),
            });
        }
        Ok(i)
    }
}

fn index(handle: ElementHandle) -> usize {
    handle.0 as usize - 1
}

#[async_trait]
impl Backend for FakeBoard {
    async fn launch(&mut self) -> Result<(), BackendError> {
        self.launches += 1;
        if self.fail_launch {
            return Err(BackendError::Launch("no browser".into()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.closes += 1;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.launches > 0 && self.closes == 0
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        self.navigations.push(url.to_string());
        Ok(NavigationResult {
            url: url.to_string(),
            title: "Board".into(),
            settled: true,
        })
    }

    async fn query(&mut self, query: &ElementQuery) -> Result<Vec<ElementInfo>, BackendError> {
        let rendered = query.selector.to_string();
        if self.panic_on.as_deref().is_some_and(|n| rendered.contains(n)) {
            panic!("query exploded on {rendered}");
        }
        if self.stall_on.as_deref().is_some_and(|n| rendered.contains(n)) {
            std::future::pending::<()>().await;
        }
        self.queries.push(query.clone());
        if self.fail_on.as_deref().is_some_and(|n| rendered.contains(n)) {
            return Err(BackendError::ScriptError("execution context destroyed".into()));
        }
        self.resolve(query)
    }

    async fn enclosing(
        &mut self,
        handle: ElementHandle,
        css: &str,
    ) -> Result<Option<ElementInfo>, BackendError> {
        let list = parse_selector_list(css).map_err(|_| BackendError::SelectorInvalid {
            selector: css.to_string(),
        })?;
        let mut cur = Some(self.lookup(handle)?);
        while let Some(c) = cur {
            if self.matches_css(c, &list) {
                return Ok(Some(self.info(c)));
            }
            cur = self.elements[c].parent;
        }
        Ok(None)
    }

    async fn click(&mut self, handle: ElementHandle) -> Result<(), BackendError> {
        self.usable(handle)?;
        self.clicks.push(handle);
        Ok(())
    }

    async fn clear_and_type(
        &mut self,
        handle: ElementHandle,
        text: &str,
        _key_delay: Duration,
    ) -> Result<(), BackendError> {
        self.usable(handle)?;
        self.typed.push((handle, text.to_string()));
        Ok(())
    }

    async fn press_key(&mut self, handle: ElementHandle, key: &str) -> Result<(), BackendError> {
        self.lookup(handle)?;
        self.keys.push((handle, key.to_string()));
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        if self.fail_screenshot {
            return Err(BackendError::Screenshot("page crashed".into()));
        }
        self.screenshots += 1;
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }
}

// --- a tiny CSS subset: tag, #id, .class, [attr], [attr='v'], [attr*='v'],
// descendant combinators and comma lists ---

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug, Clone)]
struct AttrTest {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
}

impl Compound {
    fn matches(&self, el: &FakeElement) -> bool {
        if self.tag.as_ref().is_some_and(|t| t != &el.tag) {
            return false;
        }
        if self.id.is_some() && self.id != el.id {
            return false;
        }
        if !self.classes.iter().all(|c| el.classes.contains(c)) {
            return false;
        }
        self.attrs.iter().all(|test| {
            el.attrs.iter().any(|(name, value)| {
                name == &test.name
                    && match test.op {
                        AttrOp::Exists => true,
                        AttrOp::Equals => value == &test.value,
                        AttrOp::Contains => value.contains(&test.value),
                    }
            })
        })
    }
}

fn parse_selector_list(css: &str) -> Result<Vec<Vec<Compound>>, String> {
    css.split(',')
        .map(|complex| {
            let parts = complex
                .split_whitespace()
                .map(parse_compound)
                .collect::<Result<Vec<_>, _>>()?;
            if parts.is_empty() {
                return Err("empty selector".to_string());
            }
            Ok(parts)
        })
        .collect()
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

fn parse_compound(src: &str) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let mut chars = src.chars().peekable();

    let tag = take_ident(&mut chars);
    if !tag.is_empty() {
        compound.tag = Some(tag);
    }

    while let Some(c) = chars.next() {
        match c {
            '.' => compound.classes.push(take_ident(&mut chars)),
            '#' => compound.id = Some(take_ident(&mut chars)),
            '[' => {
                let name = take_ident(&mut chars);
                let op = match chars.next() {
                    Some(']') => {
                        compound.attrs.push(AttrTest {
                            name,
                            op: AttrOp::Exists,
                            value: String::new(),
                        });
                        continue;
                    }
                    Some('=') => AttrOp::Equals,
                    Some('*') if chars.next() == Some('=') => AttrOp::Contains,
                    other => return Err(format!("unexpected {:?} in attribute", other)),
                };
                let quote = chars.next().ok_or("unterminated attribute")?;
                if quote != '\'' && quote != '"' {
                    return Err("attribute value must be quoted".into());
                }
                let value: String = chars.by_ref().take_while(|&c| c != quote).collect();
                if chars.next() != Some(']') {
                    return Err("unterminated attribute".into());
                }
                compound.attrs.push(AttrTest { name, op, value });
            }
            other => return Err(format!("unsupported selector syntax {:?}", other)),
        }
    }
    Ok(compound)
}

// --- fixtures ---

pub fn credentials() -> Credentials {
    Credentials::new("ops@example.com", "hunter2")
}

pub fn criteria(title: &str, section: &str, mode: MatchMode) -> SearchCriteria {
    SearchCriteria::new("Test Support", section, title, mode)
}

/// Default selectors, no waiting, no screenshots.
pub fn fast_config() -> BoardcheckConfig {
    let mut config = BoardcheckConfig::default();
    config.timings = TimingsConfig::immediate();
    config.evidence.enabled = false;
    config
}

/// Handles of interest on a board built by [`odoo_board`].
pub struct BoardHandles {
    pub login_trigger: ElementHandle,
    pub email: ElementHandle,
    pub password: ElementHandle,
    pub submit: ElementHandle,
    pub app_menu: ElementHandle,
    pub projects_entry: ElementHandle,
    pub project_tile: ElementHandle,
    pub columns: Vec<ElementHandle>,
    /// Card records per column.
    pub cards: Vec<Vec<ElementHandle>>,
}

/// A page carrying the login form, navigation controls and a kanban board
/// with the given `(column title, card titles)`.
pub fn odoo_board(columns: &[(&str, &[&str])]) -> (FakeBoard, BoardHandles) {
    let mut board = FakeBoard::new();

    let header = board.add(None, "header.o_main_navbar", "");
    let login_trigger = board.add(Some(header), "span.te_user_account_icon.d-block", "");
    let app_menu = board.add(Some(header), "a.o_menu_apps", "");

    let form = board.add(None, "form.oe_login_form", "");
    let email = board.add(Some(form), "input#login[name='login'][type='text']", "");
    let password = board.add(Some(form), "input#password[type='password']", "");
    let submit = board.add(Some(form), "button[type='submit']", "Log in");

    let apps = board.add(None, "div.o_apps", "");
    let projects_entry = board.add(Some(apps), "a.o_app", "Projects");

    let projects = board.add(None, "div.o_kanban_view.o_project_kanban", "");
    let project_tile = board.add(Some(projects), "div.o_project_tile", "Test Support");

    let kanban = board.add(None, "div.o_kanban_view", "");
    let mut groups = Vec::new();
    let mut records = Vec::new();
    for (title, cards) in columns {
        let group = board.add(Some(kanban), "div.o_kanban_group", "");
        let header = board.add(Some(group), "div.o_kanban_header", "");
        board.add(Some(header), "span.o_column_title", title);
        let mut column_records = Vec::new();
        for card in cards.iter() {
            let record = board.add(Some(group), "div.o_kanban_record", "");
            board.add(Some(record), "span.o_record_title", card);
            column_records.push(record);
        }
        groups.push(group);
        records.push(column_records);
    }

    (
        board,
        BoardHandles {
            login_trigger,
            email,
            password,
            submit,
            app_menu,
            projects_entry,
            project_tile,
            columns: groups,
            cards: records,
        },
    )
}
