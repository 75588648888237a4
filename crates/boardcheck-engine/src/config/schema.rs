use super::selectors::SelectorCatalog;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardcheckConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub timings: TimingsConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    #[serde(default)]
    pub selectors: SelectorCatalog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://teams.eoxs.com/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: Option<String>,
    /// Overrides browser discovery; `CHROME_BIN` is honored when unset.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    /// Persistent profile directory. A throwaway per-run profile is used when unset.
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
    /// Pause before every interaction in visible mode.
    #[serde(default = "default_slow_mo_ms")]
    pub slow_mo_ms: u64,
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: default_user_agent(),
            chrome_executable: None,
            user_data_dir: None,
            slow_mo_ms: default_slow_mo_ms(),
            extra_args: default_extra_args(),
        }
    }
}

impl BrowserSettings {
    /// Effective slow-motion delay; always zero when headless.
    pub fn slow_mo(&self) -> Duration {
        if self.headless {
            Duration::ZERO
        } else {
            Duration::from_millis(self.slow_mo_ms)
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_user_agent() -> Option<String> {
    Some(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .to_string(),
    )
}

fn default_slow_mo_ms() -> u64 {
    100
}

fn default_extra_args() -> Vec<String> {
    [
        "--disable-gpu",
        "--disable-dev-shm-usage",
        "--disable-setuid-sandbox",
        "--disable-accelerated-2d-canvas",
        "--disable-extensions",
        "--no-first-run",
        "--ignore-certificate-errors",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingsConfig {
    /// Budget for one strategy of a locator chain.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Hard cap on waiting for a page load.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    /// Quiet window after which the network counts as idle.
    #[serde(default = "default_network_idle_ms")]
    pub network_idle_ms: u64,
    /// Pause after each click that changes the view.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Fallback wait after login submission when no indicator appears.
    #[serde(default = "default_login_settle_ms")]
    pub login_settle_ms: u64,
    #[serde(default = "default_login_indicator_timeout_ms")]
    pub login_indicator_timeout_ms: u64,
    /// Fallback wait for the board to render when no ready marker appears.
    #[serde(default = "default_board_settle_ms")]
    pub board_settle_ms: u64,
    #[serde(default = "default_key_delay_ms")]
    pub key_delay_ms: u64,
    /// Upper bound on a whole run. `None` disables the deadline.
    #[serde(default = "default_run_deadline_ms")]
    pub run_deadline_ms: Option<u64>,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: default_attempt_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            network_idle_ms: default_network_idle_ms(),
            settle_ms: default_settle_ms(),
            login_settle_ms: default_login_settle_ms(),
            login_indicator_timeout_ms: default_login_indicator_timeout_ms(),
            board_settle_ms: default_board_settle_ms(),
            key_delay_ms: default_key_delay_ms(),
            run_deadline_ms: default_run_deadline_ms(),
        }
    }
}

impl TimingsConfig {
    /// All waits collapsed to zero. Every lookup still gets one attempt.
    pub fn immediate() -> Self {
        Self {
            attempt_timeout_ms: 0,
            poll_interval_ms: 0,
            navigation_timeout_ms: 0,
            network_idle_ms: 0,
            settle_ms: 0,
            login_settle_ms: 0,
            login_indicator_timeout_ms: 0,
            board_settle_ms: 0,
            key_delay_ms: 0,
            run_deadline_ms: None,
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn login_settle(&self) -> Duration {
        Duration::from_millis(self.login_settle_ms)
    }

    pub fn login_indicator_timeout(&self) -> Duration {
        Duration::from_millis(self.login_indicator_timeout_ms)
    }

    pub fn board_settle(&self) -> Duration {
        Duration::from_millis(self.board_settle_ms)
    }

    pub fn key_delay(&self) -> Duration {
        Duration::from_millis(self.key_delay_ms)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_ms.map(Duration::from_millis)
    }
}

fn default_attempt_timeout_ms() -> u64 {
    3000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_navigation_timeout_ms() -> u64 {
    30000
}

fn default_network_idle_ms() -> u64 {
    500
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_login_settle_ms() -> u64 {
    5000
}

fn default_login_indicator_timeout_ms() -> u64 {
    10000
}

fn default_board_settle_ms() -> u64 {
    3000
}

fn default_key_delay_ms() -> u64 {
    50
}

fn default_run_deadline_ms() -> Option<u64> {
    Some(300_000)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    #[serde(default = "default_evidence_enabled")]
    pub enabled: bool,
    #[serde(default = "default_evidence_dir")]
    pub dir: PathBuf,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_evidence_enabled(),
            dir: default_evidence_dir(),
        }
    }
}

fn default_evidence_enabled() -> bool {
    true
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from("./evidence")
}
