pub mod loader;
pub mod schema;
pub mod selectors;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{BoardcheckConfig, BrowserSettings, EvidenceConfig, TargetConfig, TimingsConfig};
pub use selectors::{SelectorCatalog, StrategySpec};
