use crate::protocol::{ElementHandle, ElementInfo, ElementQuery};
use async_trait::async_trait;
use std::time::Duration;

pub use crate::error::BackendError;

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
    /// False when the hard timeout elapsed before the network went quiet.
    pub settled: bool,
}

/// The Backend trait is the session driver every browser implementation provides.
///
/// Element lookups are stateless: a query returns handles, and interactions
/// address elements by handle. A handle may go stale when the page re-renders;
/// callers re-query rather than cache.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Launch the browser and open an isolated page.
    async fn launch(&mut self) -> Result<(), BackendError>;

    /// Release every resource. Must be idempotent and safe after a failed launch.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Check if the backend is ready to accept commands.
    async fn is_ready(&self) -> bool;

    /// Load a URL. Returns once the network is quiet or the navigation
    /// timeout elapsed; the latter is reported through `settled`.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError>;

    /// All elements matching the query, in DOM order.
    async fn query(&mut self, query: &ElementQuery) -> Result<Vec<ElementInfo>, BackendError>;

    /// Nearest ancestor of `handle` matching `css`.
    async fn enclosing(
        &mut self,
        handle: ElementHandle,
        css: &str,
    ) -> Result<Option<ElementInfo>, BackendError>;

    /// Scroll the element into view and click it.
    async fn click(&mut self, handle: ElementHandle) -> Result<(), BackendError>;

    /// Focus, empty any pre-filled value, then type `text` one character at a
    /// time with `key_delay` between characters.
    async fn clear_and_type(
        &mut self,
        handle: ElementHandle,
        text: &str,
        key_delay: Duration,
    ) -> Result<(), BackendError>;

    /// Press a named key (e.g. "Enter") with the element focused.
    async fn press_key(&mut self, handle: ElementHandle, key: &str) -> Result<(), BackendError>;

    /// Capture a full-page PNG.
    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError>;
}
