pub mod auth;
pub mod backend;
pub mod checker;
pub mod config;
pub mod criteria;
pub mod error;
pub mod evidence;
pub mod navigation;
pub mod protocol;
pub mod resolution;
pub mod search;
pub mod session;
pub mod verdict;

pub use backend::{Backend, BackendError, NavigationResult};
pub use checker::{Checker, StageError};
pub use config::{BoardcheckConfig, ConfigError, ConfigLoader};
pub use criteria::{Credentials, SearchCriteria};
pub use protocol::MatchMode;
pub use verdict::{Answer, Diagnostic, EvidenceArtifact, RunReport, Verdict};
