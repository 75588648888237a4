//! Screenshot trail. Capture failures never fail a run.

use crate::backend::Backend;
use crate::config::EvidenceConfig;
use crate::verdict::EvidenceArtifact;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

pub const AFTER_LOGIN: &str = "after_login";
pub const AFTER_NAVIGATION: &str = "after_navigation";
pub const AFTER_CHECK: &str = "after_check";
pub const ON_ERROR: &str = "error";

pub struct EvidenceRecorder {
    /// None when capturing is disabled.
    dir: Option<PathBuf>,
}

impl EvidenceRecorder {
    pub fn new(config: &EvidenceConfig) -> Self {
        Self {
            dir: config.enabled.then(|| config.dir.clone()),
        }
    }

    /// Screenshot the page and write `screenshot_<stage>_<millis>.png`.
    pub async fn capture<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        stage: &str,
    ) -> Option<EvidenceArtifact> {
        let dir = self.dir.as_ref()?;

        let bytes = match backend.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not capture {} evidence: {}", stage, e);
                return None;
            }
        };

        let captured_at = epoch_millis();
        let path = dir.join(file_name(stage, captured_at));
        if let Err(e) = write_artifact(dir, &path, &bytes).await {
            warn!("Could not save {} evidence to {}: {}", stage, path.display(), e);
            return None;
        }

        info!("Evidence saved to {} ({} bytes)", path.display(), bytes.len());
        Some(EvidenceArtifact {
            stage: stage.to_string(),
            path,
            captured_at,
        })
    }
}

async fn write_artifact(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, bytes).await
}

fn file_name(stage: &str, millis: u64) -> String {
    format!("screenshot_{}_{}.png", stage, millis)
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
