//! REST API client module for the Entregas Plus backend.
//!
//! This module provides the `ApiClient`, which attaches the stored session
//! token to every outgoing request as `Authorization: Token <t>` (or
//! `Bearer`, per configuration) and hands it to a `Transport`.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod request;
pub mod transport;

pub use reqwest::StatusCode;

pub use client::{authorize, join_url, ApiClient};
pub use error::{ApiError, TransportError};
pub use request::{AuthScheme, Method, RequestDescriptor};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
