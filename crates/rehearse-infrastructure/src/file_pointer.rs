//! Durable session pointer backed by a JSON file.
//!
//! Remembers which session the candidate was in so a fresh mount can
//! rehydrate it. A missing or corrupt file degrades to "no pointer";
//! the pointer is never the authoritative record.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use rehearse_core::error::{RehearseError, Result};
use rehearse_core::session::SessionPointer;

const POINTER_FILE: &str = "session_pointer.json";

const TARGET: &str = "file_pointer";

#[derive(Debug, Serialize, Deserialize)]
struct PointerFile {
    session_id: String,
}

/// File-backed implementation of [`SessionPointer`].
pub struct FileSessionPointer {
    path: PathBuf,
}

impl FileSessionPointer {
    /// Creates a pointer under the platform data directory
    /// (e.g. `~/.local/share/rehearse/session_pointer.json`).
    pub fn new_default() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| RehearseError::persistence("cannot determine data directory"))?;
        Ok(Self::new(data_dir.join("rehearse").join(POINTER_FILE)))
    }

    /// Creates a pointer at an explicit path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SessionPointer for FileSessionPointer {
    async fn get(&self) -> Option<String> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(_) => return None,
        };
        match serde_json::from_str::<PointerFile>(&raw) {
            Ok(pointer) => Some(pointer.session_id),
            Err(e) => {
                tracing::warn!(
                    target: TARGET,
                    path = %self.path.display(),
                    "corrupt pointer file, treating as absent: {e}"
                );
                None
            }
        }
    }

    async fn set(&self, session_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_string_pretty(&PointerFile {
            session_id: session_id.to_string(),
        })?;

        // Write-then-rename so a crash mid-write never leaves a torn file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;

        tracing::debug!(target: TARGET, session_id, "pointer saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
