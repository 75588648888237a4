//! One run end to end: launch, log in, navigate, search, report.
//!
//! `Checker::run` never fails. Every error, timeout, interruption or panic
//! below it becomes a `Verdict` with `found = false`, and the session is
//! released exactly once before the verdict is returned.

use crate::auth::{AuthError, Authenticator};
use crate::backend::{Backend, BackendError};
use crate::config::BoardcheckConfig;
use crate::criteria::{Credentials, SearchCriteria};
use crate::evidence::{self, EvidenceRecorder};
use crate::navigation::{NavigationError, NavigationSequencer};
use crate::search::{ContainmentSearch, MatchPath, SearchError};
use crate::session::Session;
use crate::verdict::{Diagnostic, Verdict};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage aborted: launch")]
    Launch(#[source] BackendError),
    #[error("stage aborted: authentication")]
    Authentication(#[source] AuthError),
    #[error("stage aborted: navigation")]
    Navigation(#[source] NavigationError),
    #[error("stage aborted: search")]
    Search(#[source] SearchError),
    #[error("run deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("run interrupted")]
    Interrupted,
    #[error("run panicked: {0}")]
    Panicked(String),
}

impl StageError {
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Launch(_) => "launch",
            StageError::Authentication(_) => "authentication",
            StageError::Navigation(_) => "navigation",
            StageError::Search(_) => "search",
            StageError::DeadlineExceeded(_) | StageError::Interrupted | StageError::Panicked(_) => {
                "run"
            }
        }
    }

    /// Whether the page is still worth a final screenshot.
    fn wants_evidence(&self) -> bool {
        !matches!(
            self,
            StageError::DeadlineExceeded(_) | StageError::Interrupted
        )
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        let detail = match self {
            StageError::Launch(e) => e.to_string(),
            StageError::Authentication(e) => e.to_string(),
            StageError::Navigation(e) => e.to_string(),
            StageError::Search(e) => e.to_string(),
            other => other.to_string(),
        };
        let mut out = vec![Diagnostic::StageFailed {
            stage: self.stage().to_string(),
            detail,
        }];
        let locator = match self {
            StageError::Authentication(e) => e.locator.as_ref(),
            StageError::Navigation(e) => Some(&e.source),
            _ => None,
        };
        if let Some(locator) = locator.filter(|l| l.is_exhausted()) {
            out.push(Diagnostic::LocatorExhausted {
                target: locator.target().to_string(),
                attempted: locator.attempted().to_vec(),
            });
        }
        out
    }
}

/// Immutable inputs for a run.
pub struct Checker {
    config: BoardcheckConfig,
    credentials: Credentials,
    criteria: SearchCriteria,
}

/// Mutable state the stages append to.
struct RunLog {
    evidence: EvidenceRecorder,
    diagnostics: Vec<Diagnostic>,
}

impl RunLog {
    async fn capture<B: Backend + ?Sized>(&mut self, backend: &mut B, stage: &str) {
        if let Some(artifact) = self.evidence.capture(backend, stage).await {
            self.diagnostics.push(Diagnostic::Evidence(artifact));
        }
    }
}

impl Checker {
    pub fn new(config: BoardcheckConfig, credentials: Credentials, criteria: SearchCriteria) -> Self {
        Self {
            config,
            credentials,
            criteria,
        }
    }

    pub fn config(&self) -> &BoardcheckConfig {
        &self.config
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub async fn run<B: Backend + ?Sized>(&self, backend: &mut B) -> Verdict {
        self.run_with_shutdown(backend, std::future::pending::<()>())
            .await
    }

    /// Like `run`, but abandons the current stage as soon as `shutdown`
    /// completes. The session is still released.
    pub async fn run_with_shutdown<B, F>(&self, backend: &mut B, shutdown: F) -> Verdict
    where
        B: Backend + ?Sized,
        F: Future<Output = ()>,
    {
        info!(
            "Checking for {:?} in '{}' of project '{}'",
            self.criteria.title, self.criteria.section, self.criteria.project
        );

        let mut session = Session::new(backend);
        let mut log = RunLog {
            evidence: EvidenceRecorder::new(&self.config.evidence),
            diagnostics: Vec::new(),
        };

        let result = {
            let stages = AssertUnwindSafe(self.stages(&mut session, &mut log))
                .catch_unwind()
                .map(|caught| {
                    caught.unwrap_or_else(|panic| Err(StageError::Panicked(panic_message(panic))))
                });

            let bounded = async {
                match self.config.timings.run_deadline() {
                    Some(limit) => tokio::time::timeout(limit, stages)
                        .await
                        .unwrap_or(Err(StageError::DeadlineExceeded(limit))),
                    None => stages.await,
                }
            };

            tokio::select! {
                result = bounded => result,
                _ = shutdown => Err(StageError::Interrupted),
            }
        };

        if let Err(e) = &result {
            match std::error::Error::source(e) {
                Some(cause) => error!("{}: {}", e, cause),
                None => error!("{}", e),
            }
            if e.wants_evidence() && session.is_open() {
                log.capture(session.backend(), evidence::ON_ERROR).await;
            }
        }

        session.release().await;

        let verdict = match result {
            Ok(Some(text)) => Verdict::found(text, log.diagnostics),
            Ok(None) => Verdict::not_found(log.diagnostics),
            Err(e) => {
                let mut diagnostics = log.diagnostics;
                diagnostics.extend(e.diagnostics());
                Verdict::failed(e.to_string(), diagnostics)
            }
        };
        info!(
            "Run finished: found={} ({} diagnostics)",
            verdict.is_found(),
            verdict.diagnostics().len()
        );
        verdict
    }

    async fn stages<B: Backend + ?Sized>(
        &self,
        session: &mut Session<'_, B>,
        log: &mut RunLog,
    ) -> Result<Option<String>, StageError> {
        session.open().await.map_err(StageError::Launch)?;
        let backend = session.backend();

        let mut auth = Authenticator::new(&self.config, &self.credentials, &self.criteria);
        let login = auth.run(backend).await.map_err(StageError::Authentication)?;
        if !login.verified {
            log.diagnostics.push(Diagnostic::UnverifiedLogin);
        }
        log.capture(backend, evidence::AFTER_LOGIN).await;

        let navigation = NavigationSequencer::new(&self.config, &self.criteria)
            .run(backend)
            .await
            .map_err(StageError::Navigation)?;
        for hop in navigation.unconfirmed {
            log.diagnostics.push(Diagnostic::UnconfirmedHop {
                hop: hop.to_string(),
            });
        }
        log.capture(backend, evidence::AFTER_NAVIGATION).await;

        let outcome = ContainmentSearch::new(&self.config, &self.criteria)
            .run(backend)
            .await
            .map_err(StageError::Search)?;
        if outcome.is_degraded() {
            warn!("Result is based on a whole-page search");
            log.diagnostics.push(Diagnostic::DegradedScope {
                section: self.criteria.section.clone(),
            });
        }
        for text in &outcome.rejected {
            log.diagnostics.push(Diagnostic::RejectedOutsideSection { text: text.clone() });
        }
        if let Some(m) = &outcome.matched {
            if m.path == MatchPath::DocumentScan {
                log.diagnostics.push(Diagnostic::LowConfidenceMatch {
                    text: m.text.clone(),
                });
            }
        }
        log.capture(backend, evidence::AFTER_CHECK).await;

        Ok(outcome.matched.map(|m| m.text))
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
