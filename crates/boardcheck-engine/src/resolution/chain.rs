//! The strategy chain itself.
//!
//! A chain is tried strictly in declared order. Each strategy gets its own
//! polling budget; the first one that yields a visible element wins and no
//! later strategy is queried. Failures of individual attempts (timeouts,
//! stale elements, zero matches, invalid selectors) are logged and swallowed.

use super::result::{Located, LocatorError};
use crate::backend::{Backend, BackendError};
use crate::config::{StrategySpec, TimingsConfig};
use crate::criteria::SearchCriteria;
use crate::protocol::{ElementHandle, ElementInfo, ElementQuery, Selector};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// One concrete way to find the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub selector: Selector,
    /// Replace the match by its nearest ancestor matching this CSS selector.
    pub enclose: Option<String>,
}

impl Strategy {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            enclose: None,
        }
    }

    fn describe(&self) -> String {
        match &self.enclose {
            Some(css) => format!("{} -> closest({})", self.selector, css),
            None => self.selector.to_string(),
        }
    }
}

/// What to do with the element once located.
#[derive(Debug, Clone, Copy)]
pub enum Interaction<'a> {
    Click,
    ClearAndType { text: &'a str, key_delay: Duration },
    PressKey(&'a str),
}

impl Interaction<'_> {
    async fn perform<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        handle: ElementHandle,
    ) -> Result<(), BackendError> {
        match *self {
            Interaction::Click => backend.click(handle).await,
            Interaction::ClearAndType { text, key_delay } => {
                backend.clear_and_type(handle, text, key_delay).await
            }
            Interaction::PressKey(key) => backend.press_key(handle, key).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Interaction::Click => "click",
            Interaction::ClearAndType { .. } => "type",
            Interaction::PressKey(_) => "press",
        }
    }
}

/// Ordered fallbacks for one logical target ("the login trigger").
#[derive(Debug, Clone)]
pub struct LocatorChain {
    target: String,
    strategies: Vec<Strategy>,
    attempt_timeout: Duration,
    poll_interval: Duration,
    scope: Option<ElementHandle>,
}

impl LocatorChain {
    /// A chain with a single attempt per strategy.
    pub fn new(target: impl Into<String>, strategies: Vec<Strategy>) -> Self {
        Self {
            target: target.into(),
            strategies,
            attempt_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            scope: None,
        }
    }

    /// Build from configured specs, substituting criteria placeholders.
    pub fn from_specs(
        target: impl Into<String>,
        specs: &[StrategySpec],
        criteria: &SearchCriteria,
    ) -> Self {
        let strategies = specs
            .iter()
            .map(|spec| Strategy {
                selector: spec.selector.clone().map_text(|s| criteria.render(s)),
                enclose: spec.enclose.clone(),
            })
            .collect();
        Self::new(target, strategies)
    }

    pub fn with_budget(mut self, attempt_timeout: Duration, poll_interval: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Per-strategy budget from the configured timings.
    pub fn timed(self, timings: &TimingsConfig) -> Self {
        self.with_budget(timings.attempt_timeout(), timings.poll_interval())
    }

    /// Only consider elements inside `scope`.
    pub fn within(mut self, scope: ElementHandle) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// First visible element produced by any strategy, in declared order.
    pub async fn locate<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
    ) -> Result<Located, LocatorError> {
        let mut attempted = Vec::with_capacity(self.strategies.len());

        for (index, strategy) in self.strategies.iter().enumerate() {
            let described = strategy.describe();
            match self.attempt(backend, strategy).await {
                Some(element) => {
                    info!("Located '{}' via {}", self.target, described);
                    return Ok(Located {
                        element,
                        strategy_index: index,
                        strategy: described,
                    });
                }
                None => attempted.push(described),
            }
        }

        debug!("All strategies exhausted for '{}'", self.target);
        Err(LocatorError::Exhausted {
            target: self.target.clone(),
            attempted,
        })
    }

    /// Locate and then act on the element. A strategy whose element rejects
    /// the interaction is skipped in favor of the next one.
    pub async fn locate_and<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        interaction: Interaction<'_>,
    ) -> Result<Located, LocatorError> {
        let mut attempted = Vec::with_capacity(self.strategies.len());
        let mut rejection: Option<String> = None;

        for (index, strategy) in self.strategies.iter().enumerate() {
            let described = strategy.describe();
            let Some(element) = self.attempt(backend, strategy).await else {
                attempted.push(described);
                continue;
            };

            match interaction.perform(backend, element.handle).await {
                Ok(()) => {
                    info!(
                        "Located '{}' via {} and performed {}",
                        self.target,
                        described,
                        interaction.name()
                    );
                    return Ok(Located {
                        element,
                        strategy_index: index,
                        strategy: described,
                    });
                }
                Err(e) => {
                    debug!(
                        "'{}' found via {} but {} failed: {}",
                        self.target,
                        described,
                        interaction.name(),
                        e
                    );
                    rejection = Some(e.to_string());
                    attempted.push(described);
                }
            }
        }

        match rejection {
            Some(reason) => Err(LocatorError::NotInteractable {
                target: self.target.clone(),
                reason,
                attempted,
            }),
            None => Err(LocatorError::Exhausted {
                target: self.target.clone(),
                attempted,
            }),
        }
    }

    /// Poll one strategy until it yields a visible element or its budget runs out.
    async fn attempt<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        strategy: &Strategy,
    ) -> Option<ElementInfo> {
        let deadline = Instant::now() + self.attempt_timeout;
        let query = ElementQuery {
            selector: strategy.selector.clone(),
            scope: self.scope,
        };

        loop {
            match backend.query(&query).await {
                Ok(found) => {
                    if let Some(element) = found.into_iter().find(|e| e.visible) {
                        return match &strategy.enclose {
                            None => Some(element),
                            Some(css) => self.enclose(backend, element, css).await,
                        };
                    }
                }
                Err(BackendError::SelectorInvalid { selector }) => {
                    debug!("Strategy {} rejected as invalid: {}", strategy.selector, selector);
                    return None;
                }
                Err(e) => {
                    debug!("Strategy {} attempt failed: {}", strategy.selector, e);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "Strategy {} found nothing visible within {:?}",
                    strategy.selector, self.attempt_timeout
                );
                return None;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn enclose<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        element: ElementInfo,
        css: &str,
    ) -> Option<ElementInfo> {
        match backend.enclosing(element.handle, css).await {
            Ok(Some(container)) => Some(container),
            Ok(None) => {
                debug!("{} has no ancestor matching {}", element.handle, css);
                None
            }
            Err(e) => {
                debug!("Failed to resolve ancestor of {}: {}", element.handle, e);
                None
            }
        }
    }
}
