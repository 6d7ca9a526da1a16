//! Side-channel file carrying the active run across processes
//!
//! The configuration phase and the test phase of a suite may run in different
//! processes. The run identity is written to one fixed file in the working
//! directory so the test processes can pick it up. One writer and one reader
//! per directory; concurrent suites sharing a directory are not supported.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, trace};

use crate::client::Run;
use crate::error::{Result, VisualReviewError};

/// File name of the run identity record
pub const RUN_FILE_NAME: &str = ".visualreview-run.json";

#[derive(Debug, Clone)]
pub struct RunIdentityStore {
    path: PathBuf,
}

impl RunIdentityStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(RUN_FILE_NAME),
        }
    }

    /// Store in the current working directory
    pub fn in_working_dir() -> Self {
        Self::new(".")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, run: &Run) -> Result<()> {
        let data = serde_json::to_vec_pretty(run)
            .map_err(|e| VisualReviewError::protocol(self.context(), format!("could not serialize run: {}", e)))?;
        fs::write(&self.path, data).await.map_err(|e| self.storage(e))?;
        debug!("Wrote run {} to {}", run.run_id, self.path.display());
        Ok(())
    }

    pub async fn read(&self) -> Result<Run> {
        let data = fs::read(&self.path).await.map_err(|e| self.storage(e))?;
        let run = serde_json::from_slice(&data).map_err(|e| {
            VisualReviewError::protocol(self.context(), format!("stored run is not valid: {}", e))
        })?;
        trace!("Read run from {}", self.path.display());
        Ok(run)
    }

    /// Removes the file; a missing file is not an error
    pub async fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!("{} already absent", self.path.display());
                Ok(())
            }
            Err(e) => Err(self.storage(e)),
        }
    }

    fn context(&self) -> String {
        self.path.display().to_string()
    }

    fn storage(&self, source: std::io::Error) -> VisualReviewError {
        VisualReviewError::Storage {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn run() -> Run {
        Run {
            run_id: "42".to_string(),
            project_id: Some("7".to_string()),
            suite_id: None,
            branch_name: "feature/login".to_string(),
            disabled: false,
        }
    }

    #[tokio::test]
    async fn test_write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = RunIdentityStore::new(dir.path());
        store.write(&run()).await.unwrap();
        assert_eq!(store.read().await.unwrap(), run());
    }

    #[tokio::test]
    async fn test_write_overwrites_previous_run() {
        let dir = tempdir().unwrap();
        let store = RunIdentityStore::new(dir.path());
        store.write(&run()).await.unwrap();

        let mut next = run();
        next.run_id = "43".to_string();
        store.write(&next).await.unwrap();
        assert_eq!(store.read().await.unwrap().run_id, "43");
    }

    #[tokio::test]
    async fn test_invalid_content_is_protocol_error() {
        let dir = tempdir().unwrap();
        let store = RunIdentityStore::new(dir.path());
        std::fs::write(store.path(), b"{\"runId\": ").unwrap();
        let err = store.read().await.unwrap_err();
        assert!(err.is_protocol());
    }

    #[tokio::test]
    async fn test_read_missing_file_is_storage_error() {
        let dir = tempdir().unwrap();
        let store = RunIdentityStore::new(dir.path());
        assert!(matches!(store.read().await, Err(VisualReviewError::Storage { .. })));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = RunIdentityStore::new(dir.path());
        store.write(&run()).await.unwrap();
        store.delete().await.unwrap();
        assert!(!store.path().exists());
        store.delete().await.unwrap();
    }
}
