use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use super::Token;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Credential storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored credential is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Credential backend failure: {0}")]
    Backend(String),
}

/// Persistence for the single session token.
///
/// A completed `set` or `clear` is visible to every later `get` on the same
/// store. Concurrent writers race and the last write wins.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored token, or `None` when no session exists.
    fn get(&self) -> impl Future<Output = Result<Option<Token>, StorageError>> + Send;

    /// Persists `token`, replacing any previous one.
    fn set(&self, token: Token) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Removes the stored token. Clearing an empty store succeeds.
    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<S: CredentialStore> CredentialStore for Arc<S> {
    fn get(&self) -> impl Future<Output = Result<Option<Token>, StorageError>> + Send {
        (**self).get()
    }

    fn set(&self, token: Token) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).set(token)
    }

    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).clear()
    }
}

impl<S: CredentialStore> CredentialStore for &S {
    fn get(&self) -> impl Future<Output = Result<Option<Token>, StorageError>> + Send {
        (**self).get()
    }

    fn set(&self, token: Token) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).set(token)
    }

    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).clear()
    }
}

/// Process-local store. Each instance is an isolated session.
#[derive(Debug, Default)]
pub struct MemoryStore {
    token: RwLock<Option<Token>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: Token) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }
}

impl CredentialStore for MemoryStore {
    async fn get(&self) -> Result<Option<Token>, StorageError> {
        Ok(self.token.read().await.clone())
    }

    async fn set(&self, token: Token) -> Result<(), StorageError> {
        *self.token.write().await = Some(token);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.token.write().await = None;
        Ok(())
    }
}
