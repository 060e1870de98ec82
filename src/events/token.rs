//! Persisted OAuth token record.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Access and refresh token pair as stored on disk.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// User access token.
    pub token: String,
    /// Refresh token.
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// The token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Token store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record.
    ///
    /// # Errors
    ///
    /// [`Error::MissingToken`] if the file does not exist; I/O or JSON
    /// errors otherwise.
    pub fn load(&self) -> Result<TokenRecord> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::MissingToken(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Replace the record atomically: write a sibling temp file, then rename.
    pub fn save(&self, record: &TokenRecord) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let mut file = fs::File::create(&tmp)?;
        file.write_all(&serde_json::to_vec(record)?)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "token record saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(token: &str) -> TokenRecord {
        TokenRecord {
            token: token.into(),
            refresh_token: format!("{token}-refresh"),
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(Error::MissingToken(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested/streamer_tokens.json"));
        store.save(&record("first")).unwrap();
        store.save(&record("second")).unwrap();
        assert_eq!(store.load().unwrap(), record("second"));
        assert!(!dir.path().join("nested/streamer_tokens.json.tmp").exists());
    }

    #[test]
    fn test_reads_existing_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        fs::write(&path, r#"{"token": "abc", "refresh_token": "def"}"#).unwrap();
        let loaded = TokenStore::new(&path).load().unwrap();
        assert_eq!(loaded.token, "abc");
        assert_eq!(loaded.refresh_token, "def");
        assert!(!format!("{loaded:?}").contains("abc"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(TokenStore::new(&path).load(), Err(Error::Json(_))));
    }
}
