use keyring::Entry;
use tokio::task;

use super::{CredentialStore, StorageError, Token};

const SERVICE_NAME: &str = "entregas";

/// Keeps the session token in the OS keychain, one entry per profile.
///
/// keyring calls block, so each one runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
    account: String,
}

impl KeyringStore {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            account: profile.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    async fn with_entry<R, F>(&self, op: F) -> Result<R, StorageError>
    where
        R: Send + 'static,
        F: FnOnce(Entry) -> Result<R, StorageError> + Send + 'static,
    {
        let service = self.service.clone();
        let account = self.account.clone();
        task::spawn_blocking(move || {
            let entry = Entry::new(&service, &account)?;
            op(entry)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("keychain task failed: {}", e)))?
    }
}

/// A keychain value that is not a usable token is a storage failure, so the
/// pipeline never degrades to an unauthenticated call.
fn token_from_secret(secret: String) -> Result<Token, StorageError> {
    Token::new(secret)
        .map_err(|e| StorageError::Backend(format!("stored keychain value is unusable: {}", e)))
}

impl CredentialStore for KeyringStore {
    async fn get(&self) -> Result<Option<Token>, StorageError> {
        self.with_entry(|entry| match entry.get_password() {
            Ok(secret) => token_from_secret(secret).map(Some),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn set(&self, token: Token) -> Result<(), StorageError> {
        self.with_entry(move |entry| {
            entry.set_password(token.expose())?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.with_entry(|entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await
    }
}
