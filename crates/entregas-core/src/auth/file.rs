use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{CredentialStore, StorageError, Token};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Scratch file the session is written to before being renamed into place
const SESSION_TMP_FILE: &str = "session.json.tmp";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: Token,
    pub stored_at: DateTime<Utc>,
}

/// Stores the session token as JSON inside the application cache directory.
///
/// Writes go to a scratch file and are renamed over `session.json`, so a
/// concurrent `get` sees either the old or the new token, never a torn file.
pub struct FileStore {
    cache_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    /// Load the full record, including when the token was stored
    pub async fn record(&self) -> Result<Option<SessionRecord>, StorageError> {
        let path = self.session_path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: SessionRecord = serde_json::from_str(&contents)?;
        Ok(Some(record))
    }

    async fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CredentialStore for FileStore {
    async fn get(&self) -> Result<Option<Token>, StorageError> {
        Ok(self.record().await?.map(|record| record.token))
    }

    async fn set(&self, token: Token) -> Result<(), StorageError> {
        let record = SessionRecord {
            token,
            stored_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&record)?;

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let tmp = self.cache_dir.join(SESSION_TMP_FILE);
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, self.session_path()).await?;
        debug!(path = %self.session_path().display(), "Session saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        Self::remove_if_exists(&self.session_path()).await?;
        debug!(path = %self.session_path().display(), "Session cleared");
        Ok(())
    }
}
