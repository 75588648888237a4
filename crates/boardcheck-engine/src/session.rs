use crate::backend::{Backend, BackendError};
use tracing::{debug, warn};

/// Exclusive, scoped ownership of one browser session for one run.
///
/// `release` closes the backend at most once. Async work cannot run in
/// `Drop`, so the owner must call `release` on every exit path; dropping an
/// unreleased session only logs.
pub struct Session<'a, B: Backend + ?Sized> {
    backend: &'a mut B,
    opened: bool,
    released: bool,
}

impl<'a, B: Backend + ?Sized> Session<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        Self {
            backend,
            opened: false,
            released: false,
        }
    }

    /// Launch the browser. A failed launch still needs `release`.
    pub async fn open(&mut self) -> Result<(), BackendError> {
        self.backend.launch().await?;
        self.opened = true;
        debug!("Session opened");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.opened && !self.released
    }

    pub fn backend(&mut self) -> &mut B {
        self.backend
    }

    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.backend.close().await {
            Ok(()) => debug!("Session released"),
            Err(e) => warn!("Error while releasing session: {}", e),
        }
    }
}

impl<B: Backend + ?Sized> Drop for Session<'_, B> {
    fn drop(&mut self) {
        if !self.released {
            warn!("Session dropped without being released");
        }
    }
}
