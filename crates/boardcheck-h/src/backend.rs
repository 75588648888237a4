use crate::cdp::CdpClient;
use crate::inject::{ProbeReply, call_probe};
use async_trait::async_trait;
use boardcheck_engine::backend::{Backend, BackendError, NavigationResult};
use boardcheck_engine::config::{BoardcheckConfig, BrowserSettings, TimingsConfig};
use boardcheck_engine::error::map_probe_error;
use boardcheck_engine::protocol::{ElementHandle, ElementInfo, ElementQuery};
use boardcheck_probe::handle_selector;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use std::time::Duration;
use tracing::{info, warn};

/// Chromium over CDP, with the probe injected into every document.
pub struct HeadlessBackend {
    client: Option<CdpClient>,
    settings: BrowserSettings,
    navigation_timeout: Duration,
    network_idle: Duration,
}

impl HeadlessBackend {
    pub fn new(settings: BrowserSettings, timings: &TimingsConfig) -> Self {
        Self {
            client: None,
            settings,
            navigation_timeout: timings.navigation_timeout(),
            network_idle: timings.network_idle(),
        }
    }

    pub fn from_config(config: &BoardcheckConfig) -> Self {
        Self::new(config.browser.clone(), &config.timings)
    }

    pub fn get_client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }

    fn client(&self) -> Result<&CdpClient, BackendError> {
        self.client.as_ref().ok_or(BackendError::NotReady)
    }

    /// Slow-motion pause before an interaction; zero when headless.
    async fn pause(&self) {
        let delay = self.settings.slow_mo();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn element(&self, handle: ElementHandle) -> Result<Element, BackendError> {
        self.client()?
            .page
            .find_element(handle_selector(handle.0))
            .await
            .map_err(|_| BackendError::ElementStale { handle })
    }

    async fn get_navigation_result(
        page: &chromiumoxide::Page,
        settled: bool,
    ) -> Result<NavigationResult, BackendError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult {
            url,
            title,
            settled,
        })
    }
}

/// The probe only knows handles, so a stale report is tied back to the
/// handle the request was about.
fn probe_failure(code: &str, message: &str, subject: Option<ElementHandle>) -> BackendError {
    match (code, subject) {
        ("ELEMENT_STALE", Some(handle)) => BackendError::ElementStale { handle },
        _ => map_probe_error(code, message),
    }
}

fn not_interactable(handle: ElementHandle, err: CdpError) -> BackendError {
    BackendError::ElementNotInteractable {
        handle,
        reason: err.to_string(),
    }
}

#[async_trait]
impl Backend for HeadlessBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        if self.client.is_some() {
            return Ok(());
        }
        info!("Launching Headless Backend (Chromium)...");
        let client = CdpClient::launch(&self.settings, self.navigation_timeout)
            .await
            .map_err(|e| BackendError::Launch(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| BackendError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        let client = self.client()?;

        info!("Navigating to: {}", url);
        let load = async {
            match client.page.goto(url).await {
                Ok(_) => {}
                Err(CdpError::Timeout) => return Ok(false),
                Err(e) => return Err(BackendError::Navigation(e.to_string())),
            }
            client.network.wait_for_idle(self.network_idle).await;
            Ok(true)
        };

        let settled = match tokio::time::timeout(self.navigation_timeout, load).await {
            Ok(result) => result?,
            Err(_) => false,
        };
        if !settled {
            warn!(
                "Page did not settle within {:?}, continuing",
                self.navigation_timeout
            );
        }

        Self::get_navigation_result(&client.page, settled).await
    }

    async fn query(&mut self, query: &ElementQuery) -> Result<Vec<ElementInfo>, BackendError> {
        let client = self.client()?;
        let request = serde_json::to_string(query)?;

        match call_probe(&client.page, &format!("query({})", request)).await? {
            ProbeReply::Ok(value) => Ok(serde_json::from_value(value)?),
            ProbeReply::Failed { code, message } => {
                Err(probe_failure(&code, &message, query.scope))
            }
        }
    }

    async fn enclosing(
        &mut self,
        handle: ElementHandle,
        css: &str,
    ) -> Result<Option<ElementInfo>, BackendError> {
        let client = self.client()?;
        let call = format!("closest({}, {})", handle.0, serde_json::to_string(css)?);

        match call_probe(&client.page, &call).await? {
            ProbeReply::Ok(value) => Ok(serde_json::from_value(value)?),
            ProbeReply::Failed { code, message } => {
                Err(probe_failure(&code, &message, Some(handle)))
            }
        }
    }

    async fn click(&mut self, handle: ElementHandle) -> Result<(), BackendError> {
        self.pause().await;
        let element = self.element(handle).await?;
        element
            .scroll_into_view()
            .await
            .map_err(|e| not_interactable(handle, e))?;
        element
            .click()
            .await
            .map_err(|e| not_interactable(handle, e))?;
        Ok(())
    }

    async fn clear_and_type(
        &mut self,
        handle: ElementHandle,
        text: &str,
        key_delay: Duration,
    ) -> Result<(), BackendError> {
        self.pause().await;
        let client = self.client()?;
        if let ProbeReply::Failed { code, message } =
            call_probe(&client.page, &format!("clear({})", handle.0)).await?
        {
            return Err(probe_failure(&code, &message, Some(handle)));
        }

        let element = self.element(handle).await?;
        element
            .focus()
            .await
            .map_err(|e| not_interactable(handle, e))?;

        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(|e| not_interactable(handle, e))?;
            if !key_delay.is_zero() {
                tokio::time::sleep(key_delay).await;
            }
        }
        Ok(())
    }

    async fn press_key(&mut self, handle: ElementHandle, key: &str) -> Result<(), BackendError> {
        self.pause().await;
        let element = self.element(handle).await?;
        element
            .press_key(key)
            .await
            .map_err(|e| not_interactable(handle, e))?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        let client = self.client()?;
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        client
            .page
            .screenshot(params)
            .await
            .map_err(|e| BackendError::Screenshot(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_probe_error_keeps_handle() {
        let err = probe_failure("ELEMENT_STALE", "gone", Some(ElementHandle(4)));
        assert!(matches!(err, BackendError::ElementStale { handle } if handle == ElementHandle(4)));
    }

    #[test]
    fn test_other_probe_errors_are_mapped() {
        let err = probe_failure("SELECTOR_INVALID", "div[[", None);
        assert_eq!(err.code(), "SELECTOR_INVALID");
        assert_eq!(probe_failure("ELEMENT_STALE", "gone", None).code(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_commands_before_launch_are_not_ready() {
        let mut backend = HeadlessBackend::new(BrowserSettings::default(), &TimingsConfig::default());
        assert!(!backend.is_ready().await);
        assert!(matches!(
            backend.screenshot().await,
            Err(BackendError::NotReady)
        ));
        // Closing an unlaunched backend is a no-op.
        backend.close().await.unwrap();
    }
}
