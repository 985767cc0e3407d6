//! Core library for the Entregas Plus courier client.
//!
//! - `auth`: the session credential, its stores, and the login/logout flow
//! - `api`: the authenticated request pipeline and its HTTP transport
//! - `config`: base URL, timeout, auth scheme and credential backend selection

pub mod api;
pub mod auth;
pub mod config;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, HttpResponse, Method, RequestDescriptor};
pub use auth::{AuthFlow, AuthOutcome, CredentialStore, StorageError, Token};
pub use config::Config;
