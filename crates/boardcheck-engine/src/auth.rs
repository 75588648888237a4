//! Login state machine.
//!
//! `Idle → TriggerClicked → EmailFilled → PasswordFilled → Submitted →
//! {Authenticated, Failed}`. Every forward edge is guarded by a locator
//! chain; an exhausted chain moves straight to `Failed`.

use crate::backend::Backend;
use crate::config::{BoardcheckConfig, TimingsConfig};
use crate::criteria::{Credentials, SearchCriteria};
use crate::protocol::ElementHandle;
use crate::resolution::{Interaction, LocatorChain, LocatorError};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Which control a login step needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    LoginTrigger,
    EmailField,
    PasswordField,
    Submit,
}

impl fmt::Display for AuthStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStep::LoginTrigger => "login trigger",
            AuthStep::EmailField => "email field",
            AuthStep::PasswordField => "password field",
            AuthStep::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// How the credentials were committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPath {
    Button,
    /// No submit control was usable; Enter was pressed in the password field.
    EnterKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    TriggerClicked,
    EmailFilled,
    PasswordFilled { field: ElementHandle },
    Submitted { via: SubmitPath },
    /// `verified` is false when no signed-in indicator showed up and the
    /// machine fell back to the settle delay.
    Authenticated { verified: bool },
    Failed {
        step: AuthStep,
        reason: String,
        /// The chain that gave up, when a control could not be found or used.
        locator: Option<LocatorError>,
    },
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthState::Authenticated { .. } | AuthState::Failed { .. }
        )
    }
}

#[derive(Debug, Clone, Error)]
#[error("authentication failed at {step}: {reason}")]
pub struct AuthError {
    pub step: AuthStep,
    pub reason: String,
    #[source]
    pub locator: Option<LocatorError>,
}

/// Successful login summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub verified: bool,
    pub submitted_via: SubmitPath,
}

struct LoginChains {
    trigger: LocatorChain,
    email: LocatorChain,
    password: LocatorChain,
    submit: LocatorChain,
    indicator: LocatorChain,
}

pub struct Authenticator<'a> {
    base_url: &'a str,
    credentials: &'a Credentials,
    timings: &'a TimingsConfig,
    chains: LoginChains,
    state: AuthState,
    history: Vec<AuthState>,
}

impl<'a> Authenticator<'a> {
    pub fn new(
        config: &'a BoardcheckConfig,
        credentials: &'a Credentials,
        criteria: &SearchCriteria,
    ) -> Self {
        let timings = &config.timings;
        let selectors = &config.selectors;
        let chains = LoginChains {
            trigger: LocatorChain::from_specs("login trigger", &selectors.login_trigger, criteria)
                .timed(timings),
            email: LocatorChain::from_specs("email field", &selectors.email_field, criteria)
                .timed(timings),
            password: LocatorChain::from_specs(
                "password field",
                &selectors.password_field,
                criteria,
            )
            .timed(timings),
            submit: LocatorChain::from_specs("submit control", &selectors.submit_button, criteria)
                .timed(timings),
            indicator: LocatorChain::from_specs(
                "signed-in indicator",
                &selectors.login_indicator,
                criteria,
            )
            .with_budget(timings.login_indicator_timeout(), timings.poll_interval()),
        };

        Self {
            base_url: &config.target.base_url,
            credentials,
            timings,
            chains,
            state: AuthState::Idle,
            history: vec![AuthState::Idle],
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Every state visited, starting with `Idle`.
    pub fn history(&self) -> &[AuthState] {
        &self.history
    }

    /// Drive the machine to a terminal state.
    pub async fn run<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<AuthOutcome, AuthError> {
        info!("Starting login as {}", self.credentials.identity());
        let mut submitted_via = SubmitPath::Button;

        while !self.state.is_terminal() {
            let next = self.step(backend).await;
            debug!("Auth transition {:?} -> {:?}", self.state, next);
            if let AuthState::Submitted { via } = next {
                submitted_via = via;
            }
            self.history.push(next.clone());
            self.state = next;
        }

        match &self.state {
            AuthState::Authenticated { verified } => {
                info!("Login completed (verified: {})", verified);
                Ok(AuthOutcome {
                    verified: *verified,
                    submitted_via,
                })
            }
            AuthState::Failed {
                step,
                reason,
                locator,
            } => {
                warn!("Login failed at {}: {}", step, reason);
                Err(AuthError {
                    step: *step,
                    reason: reason.clone(),
                    locator: locator.clone(),
                })
            }
            other => Err(AuthError {
                step: AuthStep::Submit,
                reason: format!("stopped in non-terminal state {:?}", other),
                locator: None,
            }),
        }
    }

    async fn step<B: Backend + ?Sized>(&self, backend: &mut B) -> AuthState {
        match &self.state {
            AuthState::Idle => {
                match backend.navigate(self.base_url).await {
                    Ok(nav) if !nav.settled => {
                        warn!("{} did not settle, continuing with partial render", nav.url)
                    }
                    Ok(nav) => debug!("Loaded {} ({})", nav.url, nav.title),
                    Err(e) => warn!("Navigation to {} failed: {}", self.base_url, e),
                }
                tokio::time::sleep(self.timings.settle()).await;

                match self.chains.trigger.locate_and(backend, Interaction::Click).await {
                    Ok(_) => AuthState::TriggerClicked,
                    Err(e) => failed(AuthStep::LoginTrigger, e),
                }
            }
            AuthState::TriggerClicked => {
                tokio::time::sleep(self.timings.settle()).await;
                let typing = Interaction::ClearAndType {
                    text: self.credentials.identity(),
                    key_delay: self.timings.key_delay(),
                };
                match self.chains.email.locate_and(backend, typing).await {
                    Ok(_) => AuthState::EmailFilled,
                    Err(e) => failed(AuthStep::EmailField, e),
                }
            }
            AuthState::EmailFilled => {
                let typing = Interaction::ClearAndType {
                    text: self.credentials.secret(),
                    key_delay: self.timings.key_delay(),
                };
                match self.chains.password.locate_and(backend, typing).await {
                    Ok(located) => AuthState::PasswordFilled {
                        field: located.element.handle,
                    },
                    Err(e) => failed(AuthStep::PasswordField, e),
                }
            }
            AuthState::PasswordFilled { field } => {
                match self.chains.submit.locate_and(backend, Interaction::Click).await {
                    Ok(_) => AuthState::Submitted {
                        via: SubmitPath::Button,
                    },
                    Err(e) => {
                        info!("No usable submit control ({}), pressing Enter instead", e);
                        match backend.press_key(*field, "Enter").await {
                            Ok(()) => AuthState::Submitted {
                                via: SubmitPath::EnterKey,
                            },
                            Err(key_err) => AuthState::Failed {
                                step: AuthStep::Submit,
                                reason: format!("{}; Enter fallback failed: {}", e, key_err),
                                locator: Some(e),
                            },
                        }
                    }
                }
            }
            AuthState::Submitted { .. } => match self.chains.indicator.locate(backend).await {
                Ok(located) => {
                    debug!("Signed-in indicator seen via {}", located.strategy);
                    AuthState::Authenticated { verified: true }
                }
                Err(_) => {
                    warn!(
                        "No signed-in indicator appeared; assuming success after {:?}",
                        self.timings.login_settle()
                    );
                    tokio::time::sleep(self.timings.login_settle()).await;
                    AuthState::Authenticated { verified: false }
                }
            },
            terminal => terminal.clone(),
        }
    }
}

fn failed(step: AuthStep, err: LocatorError) -> AuthState {
    AuthState::Failed {
        step,
        reason: err.to_string(),
        locator: Some(err),
    }
}
