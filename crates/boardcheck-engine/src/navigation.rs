//! Menu → projects → project traversal.

use crate::backend::Backend;
use crate::config::{BoardcheckConfig, TimingsConfig};
use crate::criteria::SearchCriteria;
use crate::resolution::{Interaction, LocatorChain, LocatorError};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopKind {
    AppMenu,
    ProjectsArea,
    Project,
}

impl fmt::Display for HopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HopKind::AppMenu => "application menu",
            HopKind::ProjectsArea => "projects area",
            HopKind::Project => "project",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error)]
#[error("navigation hop '{hop}' failed: {source}")]
pub struct NavigationError {
    pub hop: HopKind,
    #[source]
    pub source: LocatorError,
}

/// One click in the traversal plus how to tell it has rendered.
struct Hop {
    kind: HopKind,
    control: LocatorChain,
    /// Polled after the click; the fixed settle applies when absent or unseen.
    ready: Option<LocatorChain>,
    settle: Duration,
}

/// Result of a completed traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationReport {
    /// Hops whose ready marker was never seen.
    pub unconfirmed: Vec<HopKind>,
}

pub struct NavigationSequencer {
    hops: Vec<Hop>,
}

impl NavigationSequencer {
    pub fn new(config: &BoardcheckConfig, criteria: &SearchCriteria) -> Self {
        let timings: &TimingsConfig = &config.timings;
        let selectors = &config.selectors;

        let hops = vec![
            Hop {
                kind: HopKind::AppMenu,
                control: LocatorChain::from_specs("application menu", &selectors.app_menu, criteria)
                    .timed(timings),
                ready: None,
                settle: timings.settle(),
            },
            Hop {
                kind: HopKind::ProjectsArea,
                control: LocatorChain::from_specs(
                    "projects area",
                    &selectors.projects_entry,
                    criteria,
                )
                .timed(timings),
                ready: None,
                settle: timings.settle(),
            },
            Hop {
                kind: HopKind::Project,
                control: LocatorChain::from_specs(
                    format!("project '{}'", criteria.project),
                    &selectors.project_tile,
                    criteria,
                )
                .timed(timings),
                ready: Some(
                    LocatorChain::from_specs("board", &selectors.board_ready, criteria)
                        .with_budget(timings.board_settle(), timings.poll_interval()),
                ),
                settle: timings.board_settle(),
            },
        ];

        Self { hops }
    }

    pub async fn run<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
    ) -> Result<NavigationReport, NavigationError> {
        let mut unconfirmed = Vec::new();

        for hop in &self.hops {
            info!("Navigating: {}", hop.kind);
            hop.control
                .locate_and(backend, Interaction::Click)
                .await
                .map_err(|source| NavigationError {
                    hop: hop.kind,
                    source,
                })?;

            match &hop.ready {
                Some(ready) => match ready.locate(backend).await {
                    Ok(located) => debug!("{} rendered ({})", hop.kind, located.strategy),
                    // The poll already spent the settle budget.
                    Err(_) => {
                        debug!("{} ready marker not seen within {:?}", hop.kind, hop.settle);
                        unconfirmed.push(hop.kind);
                    }
                },
                None => tokio::time::sleep(hop.settle).await,
            }
        }

        info!("Reached the board");
        Ok(NavigationReport { unconfirmed })
    }
}
