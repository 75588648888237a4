//! Containment search: does the title exist *inside* the labeled section?
//!
//! 1. Resolve the section container. If that fails the whole page becomes
//!    the scope and the outcome is marked degraded.
//! 2. Enumerate cards for every configured pattern across the page.
//! 3. Test each visible card's text against the title under the match mode.
//! 4. When scoped, a text match is accepted only if re-querying the same
//!    pattern inside the container returns that very element.
//! 5. If no card is accepted, scan the document's own text nodes for the
//!    title, still subject to the containment check.
//!
//! The search stops at the first accepted match.

use crate::backend::{Backend, BackendError};
use crate::config::BoardcheckConfig;
use crate::criteria::SearchCriteria;
use crate::protocol::{ElementHandle, ElementInfo, ElementQuery, MatchMode, Selector};
use crate::resolution::LocatorChain;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Cards dumped to the debug log per pattern.
const CANDIDATE_LOG_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    Section {
        container: ElementHandle,
        strategy: String,
    },
    /// The section could not be located; the whole page was searched.
    Degraded,
}

impl SearchScope {
    pub fn container(&self) -> Option<ElementHandle> {
        match self {
            SearchScope::Section { container, .. } => Some(*container),
            SearchScope::Degraded => None,
        }
    }
}

/// A card considered during the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub handle: ElementHandle,
    pub text: String,
    pub visible: bool,
    /// Whether the element lies inside the section. Always true when degraded.
    pub in_section: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPath {
    /// Found among cards of this CSS pattern.
    Card { pattern: String },
    /// Found by the structure-agnostic text scan.
    DocumentScan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub handle: ElementHandle,
    pub text: String,
    pub path: MatchPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub scope: SearchScope,
    pub matched: Option<SearchMatch>,
    /// Texts that matched the title but sat outside the section.
    pub rejected: Vec<String>,
}

impl SearchOutcome {
    pub fn found(&self) -> bool {
        self.matched.is_some()
    }

    pub fn is_degraded(&self) -> bool {
        self.scope == SearchScope::Degraded
    }
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// Not a single query succeeded; the page could not be inspected at all.
    #[error("board could not be inspected: {0}")]
    Unavailable(#[source] BackendError),
}

pub struct ContainmentSearch {
    section: LocatorChain,
    card_patterns: Vec<String>,
    title: String,
    mode: MatchMode,
}

/// Tracks whether any query worked so total failure can be told apart from "absent".
#[derive(Default)]
struct QueryHealth {
    succeeded: usize,
    last_error: Option<BackendError>,
}

impl QueryHealth {
    fn record<T>(&mut self, result: Result<T, BackendError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.succeeded += 1;
                Some(value)
            }
            Err(e) => {
                debug!("Search query failed: {}", e);
                self.last_error = Some(e);
                None
            }
        }
    }
}

impl ContainmentSearch {
    pub fn new(config: &BoardcheckConfig, criteria: &SearchCriteria) -> Self {
        let section = LocatorChain::from_specs(
            format!("section '{}'", criteria.section),
            &config.selectors.section,
            criteria,
        )
        .timed(&config.timings);

        Self {
            section,
            card_patterns: config.selectors.cards.clone(),
            title: criteria.title.clone(),
            mode: criteria.match_mode,
        }
    }

    pub async fn run<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
    ) -> Result<SearchOutcome, SearchError> {
        let scope = match self.section.locate(backend).await {
            Ok(located) => {
                info!(
                    "Section container resolved to {} via {}",
                    located.element.handle, located.strategy
                );
                SearchScope::Section {
                    container: located.element.handle,
                    strategy: located.strategy,
                }
            }
            Err(e) => {
                warn!("{}; searching the entire page instead", e);
                SearchScope::Degraded
            }
        };

        let mut health = QueryHealth::default();
        let mut rejected = Vec::new();

        info!("Searching for {:?} ({} match)", self.title, self.mode);
        for pattern in &self.card_patterns {
            let query = ElementQuery::page(Selector::css(pattern.as_str()));
            let Some(cards) = health.record(backend.query(&query).await) else {
                continue;
            };
            debug!("{} cards match {}", cards.len(), pattern);
            for (i, card) in cards.iter().take(CANDIDATE_LOG_LIMIT).enumerate() {
                debug!("  card {}: {:?}", i, truncate(&card.text, 100));
            }

            let membership_selector =
                Selector::css_text(pattern.as_str(), self.title.as_str()).with_mode(self.mode);
            let mut members: Option<HashSet<ElementHandle>> = None;

            for card in cards {
                if !card.visible || !self.mode.matches(&card.text, &self.title) {
                    continue;
                }
                let candidate = self
                    .classify(backend, &scope, &membership_selector, &mut members, &mut health, card)
                    .await;
                if candidate.in_section {
                    info!("Accepted card {:?}", truncate(&candidate.text, 100));
                    return Ok(SearchOutcome {
                        scope,
                        matched: Some(SearchMatch {
                            handle: candidate.handle,
                            text: candidate.text,
                            path: MatchPath::Card {
                                pattern: pattern.clone(),
                            },
                        }),
                        rejected,
                    });
                }
                info!("Card {:?} matches but is outside the section", truncate(&candidate.text, 100));
                rejected.push(candidate.text);
            }
        }

        // Last resort: text nodes anywhere, no card structure assumed.
        debug!("No card accepted, scanning document text for {:?}", self.title);
        let scan_selector = Selector::own_text(self.title.as_str(), self.mode);
        let query = ElementQuery::page(scan_selector.clone());
        if let Some(hits) = health.record(backend.query(&query).await) {
            let mut members: Option<HashSet<ElementHandle>> = None;
            for hit in hits.into_iter().filter(|h| h.visible) {
                let candidate = self
                    .classify(backend, &scope, &scan_selector, &mut members, &mut health, hit)
                    .await;
                if candidate.in_section {
                    info!("Accepted text-scan hit {:?} (low confidence)", truncate(&candidate.text, 100));
                    return Ok(SearchOutcome {
                        scope,
                        matched: Some(SearchMatch {
                            handle: candidate.handle,
                            text: candidate.text,
                            path: MatchPath::DocumentScan,
                        }),
                        rejected,
                    });
                }
                rejected.push(candidate.text);
            }
        }

        if health.succeeded == 0 {
            if let Some(e) = health.last_error {
                return Err(SearchError::Unavailable(e));
            }
        }

        info!("{:?} not found in section", self.title);
        Ok(SearchOutcome {
            scope,
            matched: None,
            rejected,
        })
    }

    /// Decide section membership for a text match. Fails closed: an error
    /// while re-querying counts as outside.
    async fn classify<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        scope: &SearchScope,
        selector: &Selector,
        members: &mut Option<HashSet<ElementHandle>>,
        health: &mut QueryHealth,
        element: ElementInfo,
    ) -> Candidate {
        let in_section = match scope.container() {
            None => true,
            Some(container) => {
                if members.is_none() {
                    let query = ElementQuery::within(selector.clone(), container);
                    let found = health
                        .record(backend.query(&query).await)
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|e| e.visible)
                        .map(|e| e.handle)
                        .collect();
                    *members = Some(found);
                }
                members
                    .as_ref()
                    .is_some_and(|set| set.contains(&element.handle))
            }
        };

        Candidate {
            handle: element.handle,
            text: element.text,
            visible: element.visible,
            in_section,
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}
