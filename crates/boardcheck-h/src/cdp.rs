use boardcheck_engine::config::BrowserSettings;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, EventExceptionThrown};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

type CdpResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Counts in-flight requests so navigation can wait for a quiet network.
#[derive(Debug)]
pub struct NetworkMonitor {
    started: Instant,
    inflight: AtomicI64,
    last_activity_ms: AtomicU64,
}

impl NetworkMonitor {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            inflight: AtomicI64::new(0),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_activity_ms.store(now, Ordering::Relaxed);
    }

    fn request_started(&self) {
        self.inflight.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    fn request_ended(&self) {
        // Requests issued before the listener attached end without a start.
        let _ = self
            .inflight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some((n - 1).max(0)));
        self.touch();
    }

    pub fn inflight(&self) -> i64 {
        self.inflight.load(Ordering::Relaxed)
    }

    /// True when nothing is in flight and nothing happened for `quiet`.
    pub fn is_idle(&self, quiet: Duration) -> bool {
        let now = self.started.elapsed().as_millis() as u64;
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        self.inflight() == 0 && now.saturating_sub(last) >= quiet.as_millis() as u64
    }

    /// Resolve once the network has been idle for `quiet`. Unbounded; callers
    /// wrap it in their own timeout.
    pub async fn wait_for_idle(&self, quiet: Duration) {
        let step = (quiet / 5).max(Duration::from_millis(25));
        while !self.is_idle(quiet) {
            tokio::time::sleep(step).await;
        }
    }
}

pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    pub network: Arc<NetworkMonitor>,
    listeners: Vec<JoinHandle<()>>,
    user_data_dir: PathBuf,
    cleanup_user_data_dir: bool,
}

/// Whatever a launch got as far as starting. Released as a unit when the
/// launch fails midway and when a launched client closes.
#[derive(Default)]
struct LaunchParts {
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    listeners: Vec<JoinHandle<()>>,
}

impl LaunchParts {
    async fn release(self, user_data_dir: &Path, cleanup_user_data_dir: bool) -> CdpResult<()> {
        for listener in &self.listeners {
            listener.abort();
        }

        let mut closed = Ok(());
        if let Some(mut browser) = self.browser {
            closed = browser
                .close()
                .await
                .map(|_| ())
                .map_err(|e| format!("Error closing browser: {}", e));
            if closed.is_ok() {
                let _ = browser.wait().await;
            }
        }
        if let Some(handler_task) = self.handler_task {
            handler_task.abort();
        }

        if cleanup_user_data_dir {
            if let Err(e) = std::fs::remove_dir_all(user_data_dir) {
                tracing::debug!(
                    "Failed to clean up user-data-dir {}: {}",
                    user_data_dir.display(),
                    e
                );
            }
        }

        closed?;
        Ok(())
    }
}

impl CdpClient {
    pub async fn launch(settings: &BrowserSettings, request_timeout: Duration) -> CdpResult<Self> {
        let (user_data_dir, cleanup_user_data_dir) = resolve_user_data_dir(settings)?;

        let mut parts = LaunchParts::default();
        let started = start(settings, request_timeout, &user_data_dir, &mut parts).await;

        match (started, parts.browser.take(), parts.handler_task.take()) {
            (Ok((page, network)), Some(browser), Some(handler_task)) => Ok(Self {
                browser,
                handler_task,
                page,
                network,
                listeners: parts.listeners,
                user_data_dir,
                cleanup_user_data_dir,
            }),
            (started, browser, handler_task) => {
                parts.browser = browser;
                parts.handler_task = handler_task;
                if let Err(e) = parts.release(&user_data_dir, cleanup_user_data_dir).await {
                    tracing::debug!("Cleanup after failed launch: {}", e);
                }
                Err(started
                    .err()
                    .unwrap_or_else(|| "browser launch did not complete".into()))
            }
        }
    }

    pub async fn close(self) -> CdpResult<()> {
        let parts = LaunchParts {
            browser: Some(self.browser),
            handler_task: Some(self.handler_task),
            listeners: self.listeners,
        };
        parts
            .release(&self.user_data_dir, self.cleanup_user_data_dir)
            .await
    }
}

/// Bring up the browser, its page and the listeners, recording each piece in
/// `parts` as soon as it exists.
async fn start(
    settings: &BrowserSettings,
    request_timeout: Duration,
    user_data_dir: &Path,
    parts: &mut LaunchParts,
) -> CdpResult<(Page, Arc<NetworkMonitor>)> {
    let mut config_builder = BrowserConfig::builder();
    config_builder = config_builder.no_sandbox(); // Often needed in docker/CI/restricted envs
    config_builder = config_builder
        .user_data_dir(user_data_dir)
        .request_timeout(request_timeout)
        .args(settings.extra_args.iter().cloned());

    if let Some(agent) = &settings.user_agent {
        config_builder = config_builder.arg(format!("--user-agent={}", agent));
    }

    if settings.headless {
        tracing::info!(
            "Launching browser in headless mode ({}x{})",
            settings.window_width,
            settings.window_height
        );
        config_builder = config_builder.viewport(Viewport {
            width: settings.window_width,
            height: settings.window_height,
            ..Default::default()
        });
    } else {
        tracing::info!("Launching browser in visible mode");
        config_builder = config_builder
            .with_head()
            .window_size(settings.window_width, settings.window_height)
            .viewport(None);
    }

    // Explicit setting first, then CHROME_BIN
    let executable = settings
        .chrome_executable
        .clone()
        .or_else(|| std::env::var("CHROME_BIN").ok().map(PathBuf::from));
    if let Some(chrome_bin) = executable {
        tracing::info!("Using custom Chrome binary: {}", chrome_bin.display());
        config_builder = config_builder.chrome_executable(chrome_bin);
    }

    let (browser, mut handler) = Browser::launch(
        config_builder
            .build()
            .map_err(|e| format!("Failed to build browser config: {}", e))?,
    )
    .await
    .map_err(|e| format!("Failed to launch browser: {}", e))?;

    parts.handler_task = Some(tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                tracing::debug!("Browser handler error (ignoring): {}", e);
                continue;
            }
        }
        tracing::debug!("Browser handler task ended");
    }));
    let browser = parts.browser.insert(browser);

    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| format!("Failed to create page: {}", e))?;

    let network = Arc::new(NetworkMonitor::new());
    parts.listeners.push(forward_console(&page).await?);
    parts.listeners.push(forward_exceptions(&page).await?);
    parts.listeners.push(accept_dialogs(&page).await?);
    parts.listeners.push(track_network(&page, network.clone()).await?);

    Ok((page, network))
}

async fn forward_console(page: &Page) -> CdpResult<JoinHandle<()>> {
    let mut events = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(|e| format!("Failed to subscribe to console events: {}", e))?;

    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let args: Vec<String> = event
                .args
                .iter()
                .map(|arg| {
                    arg.value
                        .as_ref()
                        .map(|v| v.to_string())
                        .or_else(|| arg.description.clone())
                        .unwrap_or_else(|| "unknown".to_string())
                })
                .collect();
            tracing::info!(target: "boardcheck::page", "console [{:?}]: {}", event.r#type, args.join(" "));
        }
    }))
}

async fn forward_exceptions(page: &Page) -> CdpResult<JoinHandle<()>> {
    let mut events = page
        .event_listener::<EventExceptionThrown>()
        .await
        .map_err(|e| format!("Failed to subscribe to exception events: {}", e))?;

    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let details = &event.exception_details;
            let description = details
                .exception
                .as_ref()
                .and_then(|ex| ex.description.clone())
                .unwrap_or_else(|| details.text.clone());
            tracing::warn!(target: "boardcheck::page", "page error: {}", description);
        }
    }))
}

/// Alerts, confirms and prompts would block every later evaluation.
async fn accept_dialogs(page: &Page) -> CdpResult<JoinHandle<()>> {
    let mut events = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| format!("Failed to subscribe to dialog events: {}", e))?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            tracing::info!(
                target: "boardcheck::page",
                "Accepting JavaScript dialog: {} ({:?})",
                event.message,
                event.r#type
            );
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                tracing::error!("Failed to accept dialog: {}", e);
            }
        }
    }))
}

async fn track_network(page: &Page, monitor: Arc<NetworkMonitor>) -> CdpResult<JoinHandle<()>> {
    let mut started = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| format!("Failed to subscribe to network events: {}", e))?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(|e| format!("Failed to subscribe to network events: {}", e))?;
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(|e| format!("Failed to subscribe to network events: {}", e))?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(_) = started.next() => monitor.request_started(),
                Some(_) = finished.next() => monitor.request_ended(),
                Some(_) = failed.next() => monitor.request_ended(),
                else => break,
            }
        }
    }))
}

fn resolve_user_data_dir(settings: &BrowserSettings) -> CdpResult<(PathBuf, bool)> {
    if let Some(path) = &settings.user_data_dir {
        std::fs::create_dir_all(path)?;
        tracing::info!("Using configured user data dir: {}", path.display());
        return Ok((path.clone(), false));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("System clock error: {}", e))?
        .as_nanos();
    let unique = format!("boardcheck-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    tracing::debug!("Using isolated user data dir: {}", path.display());
    Ok((path, true))
}
