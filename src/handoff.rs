//! Async handoff store
//!
//! `async_init` leaves the report status URL in a fixed file under the
//! working directory; `async_result` picks it up from there. The file holds a
//! single record and is left in place after reading.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const HANDOFF_DIR: &str = "soos/workspace";
pub const HANDOFF_FILE: &str = "soos_async.json";

/// The only state that crosses between the two async invocations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncResumptionToken {
    pub report_status_url: String,
}

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("Async analysis file not found at {}. Run with mode async_init first", .0.display())]
    Missing(PathBuf),

    #[error("Failed to access async analysis file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Async analysis file {} is malformed: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct HandoffStore {
    path: PathBuf,
}

impl HandoffStore {
    pub fn new(working_directory: &Path) -> Self {
        Self {
            path: working_directory.join(HANDOFF_DIR).join(HANDOFF_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the token, replacing any previous one
    pub fn write(&self, token: &AsyncResumptionToken) -> Result<(), HandoffError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let json = serde_json::to_string(token).map_err(|source| HandoffError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| self.io_error(source))?;

        debug!(path = %self.path.display(), "Wrote async resumption token");
        Ok(())
    }

    pub fn read(&self) -> Result<AsyncResumptionToken, HandoffError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(HandoffError::Missing(self.path.clone()));
            }
            Err(source) => return Err(self.io_error(source)),
        };

        serde_json::from_str(&raw).map_err(|source| HandoffError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn io_error(&self, source: io::Error) -> HandoffError {
        HandoffError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn token(url: &str) -> AsyncResumptionToken {
        AsyncResumptionToken {
            report_status_url: url.to_string(),
        }
    }

    #[test]
    fn test_write_then_read_returns_same_url() {
        let dir = TempDir::new().unwrap();
        let store = HandoffStore::new(dir.path());
        let url = "https://api.example.test/clients/c/projects/p/analysis/a/status?x=1&y=2";

        store.write(&token(url)).unwrap();

        assert_eq!(store.read().unwrap().report_status_url, url);
        assert!(store.path().exists());
    }

    #[test]
    fn test_file_location_and_format() {
        let dir = TempDir::new().unwrap();
        let store = HandoffStore::new(dir.path());
        store.write(&token("https://x/status")).unwrap();

        let expected = dir.path().join("soos").join("workspace").join("soos_async.json");
        assert_eq!(store.path(), expected);

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(expected).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({ "report_status_url": "https://x/status" }));
    }

    #[test]
    fn test_overwrites_previous_token() {
        let dir = TempDir::new().unwrap();
        let store = HandoffStore::new(dir.path());

        store.write(&token("https://x/first")).unwrap();
        store.write(&token("https://x/second")).unwrap();

        assert_eq!(store.read().unwrap(), token("https://x/second"));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = HandoffStore::new(dir.path());

        assert!(matches!(store.read(), Err(HandoffError::Missing(_))));
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let store = HandoffStore::new(dir.path());
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{\"url\": 1}").unwrap();

        assert!(matches!(store.read(), Err(HandoffError::Malformed { .. })));
    }
}
