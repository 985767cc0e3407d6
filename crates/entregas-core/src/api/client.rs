//! Authenticated request pipeline for the Entregas Plus backend.
//!
//! Every call reads the current token from the injected credential store,
//! attaches it with [`authorize`], and dispatches through a [`Transport`].
//! Responses come back untouched, whatever their status.

use reqwest::header::{self, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{CredentialStore, Token};
use crate::config::Config;

use super::{
    ApiError, AuthScheme, HttpRequest, HttpResponse, RequestDescriptor, ReqwestTransport,
    Transport,
};

const APPLICATION_JSON: &str = "application/json";

/// Attach `token` to `request` as `Authorization: <scheme> <token>`.
///
/// A request without a token passes through unchanged, as does one whose
/// caller already set an `Authorization` header.
pub fn authorize(
    mut request: HttpRequest,
    token: Option<&Token>,
    scheme: AuthScheme,
) -> Result<HttpRequest, ApiError> {
    let Some(token) = token else {
        return Ok(request);
    };
    if request.headers.contains_key(header::AUTHORIZATION) {
        return Ok(request);
    }

    let mut value = HeaderValue::from_str(&format!("{} {}", scheme.as_str(), token.expose()))
        .map_err(|_| ApiError::InvalidRequest("token is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    request.headers.insert(header::AUTHORIZATION, value);
    Ok(request)
}

/// Join a base URL and a relative path with exactly one `/` between them
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim().trim_start_matches('/')
    )
}

/// API client for the courier backend.
/// Clone is cheap when the store and transport handles are (e.g. `Arc<S>`).
#[derive(Clone)]
pub struct ApiClient<S, T = ReqwestTransport> {
    store: S,
    transport: T,
    base_url: String,
    scheme: AuthScheme,
}

impl<S: CredentialStore> ApiClient<S, ReqwestTransport> {
    /// Create a client over HTTP using the configured base URL, timeout and scheme
    pub fn from_config(config: &Config, store: S) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::new(config.base_url.clone(), store, transport).with_scheme(config.auth_scheme))
    }
}

impl<S: CredentialStore, T: Transport> ApiClient<S, T> {
    pub fn new(base_url: impl Into<String>, store: S, transport: T) -> Self {
        Self {
            store,
            transport,
            base_url: base_url.into(),
            scheme: AuthScheme::default(),
        }
    }

    pub fn with_scheme(mut self, scheme: AuthScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// Decorate and dispatch one request.
    ///
    /// A storage failure is returned before anything touches the network;
    /// the call never silently goes out unauthenticated. Non-2xx responses
    /// are returned as `Ok`.
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<HttpResponse, ApiError> {
        descriptor.validate()?;

        let token = self.store.get().await?;
        let request = authorize(self.prepare(descriptor), token.as_ref(), self.scheme)?;

        debug!(
            method = %request.method,
            url = %request.url,
            authenticated = request.headers.contains_key(header::AUTHORIZATION),
            "Dispatching request"
        );

        let method = request.method;
        let url = request.url.clone();
        match self.transport.execute(request).await {
            Ok(response) => {
                debug!(method = %method, url = %url, status = %response.status, "Response received");
                Ok(response)
            }
            Err(e) => {
                warn!(method = %method, url = %url, error = %e, "Request failed");
                Err(e.into())
            }
        }
    }

    fn prepare(&self, descriptor: RequestDescriptor) -> HttpRequest {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        if descriptor.body.is_some() {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        }
        // Caller-supplied headers win over the defaults
        headers.extend(descriptor.headers);

        HttpRequest {
            method: descriptor.method,
            url: join_url(&self.base_url, &descriptor.path),
            headers,
            body: descriptor.body,
        }
    }

    // ===== Convenience Methods =====

    pub async fn get(&self, path: &str) -> Result<HttpResponse, ApiError> {
        self.send(RequestDescriptor::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<HttpResponse, ApiError> {
        self.send(RequestDescriptor::post(path, body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<HttpResponse, ApiError> {
        self.send(RequestDescriptor::put(path, body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<HttpResponse, ApiError> {
        self.send(RequestDescriptor::patch(path, body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<HttpResponse, ApiError> {
        self.send(RequestDescriptor::delete(path)).await
    }

    /// Send and decode a 2xx JSON body; non-2xx becomes `ApiError::Status`
    pub async fn fetch_json<R: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<R, ApiError> {
        let path = descriptor.path.clone();
        let response = self.send(descriptor).await?.error_for_status()?;
        response.json().map_err(|e| {
            warn!(path = %path, error = %e, "Failed to parse JSON response");
            e
        })
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.fetch_json(RequestDescriptor::get(path)).await
    }

    pub async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("body is not valid JSON: {}", e)))?;
        self.fetch_json(RequestDescriptor::post(path, body)).await
    }
}
