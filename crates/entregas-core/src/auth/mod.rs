//! Session credential management.
//!
//! This module provides:
//! - `Token`: the opaque session credential, redacted when printed
//! - `CredentialStore`: async get/set/clear over a single token, with
//!   memory, file and OS keychain backends
//! - `AuthFlow`: login, registration and logout on top of the API client
//!
//! Tokens never expire client-side. The backend decides, and answers 401.

pub mod credentials;
pub mod file;
pub mod flow;
pub mod store;
pub mod token;

pub use credentials::KeyringStore;
pub use file::{FileStore, SessionRecord};
pub use flow::{AuthFlow, AuthOutcome, RegistrationForm, UserSummary};
pub use store::{CredentialStore, MemoryStore, StorageError};
pub use token::{Token, TokenError};

use crate::config::{Config, ConfigError, CredentialBackend};

/// The store selected by configuration, so binaries can pick a backend at
/// runtime while the pipeline stays generic.
pub enum ConfiguredStore {
    File(FileStore),
    Keyring(KeyringStore),
}

impl ConfiguredStore {
    pub fn open(config: &Config) -> Result<Self, ConfigError> {
        Ok(match config.credential_backend {
            CredentialBackend::Keyring => Self::Keyring(KeyringStore::new(&config.profile)),
            CredentialBackend::File => Self::File(FileStore::new(config.cache_dir()?)),
        })
    }

    pub fn backend(&self) -> CredentialBackend {
        match self {
            Self::Keyring(_) => CredentialBackend::Keyring,
            Self::File(_) => CredentialBackend::File,
        }
    }
}

impl CredentialStore for ConfiguredStore {
    async fn get(&self) -> Result<Option<Token>, StorageError> {
        match self {
            Self::Keyring(store) => store.get().await,
            Self::File(store) => store.get().await,
        }
    }

    async fn set(&self, token: Token) -> Result<(), StorageError> {
        match self {
            Self::Keyring(store) => store.set(token).await,
            Self::File(store) => store.set(token).await,
        }
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match self {
            Self::Keyring(store) => store.clear().await,
            Self::File(store) => store.clear().await,
        }
    }
}
