//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use reqwest::StatusCode;

use crate::api::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::auth::{CredentialStore, StorageError, Token};

/// Records every request; answers with queued responses, then `200 {}`.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<HttpRequest>>,
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn fail_with(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn single_request(&self) -> HttpRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests.into_iter().next().unwrap()
    }
}

impl Transport for RecordingTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::new(StatusCode::OK, "{}")))
    }
}

/// Every call fails as if the server refused the connection.
pub struct FailingTransport;

impl Transport for FailingTransport {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Connect("connection refused".to_string()))
    }
}

/// Every operation fails with a backend error.
pub struct FailingStore;

impl CredentialStore for FailingStore {
    async fn get(&self) -> Result<Option<Token>, StorageError> {
        Err(StorageError::Backend("storage unavailable".to_string()))
    }

    async fn set(&self, _token: Token) -> Result<(), StorageError> {
        Err(StorageError::Backend("storage unavailable".to_string()))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Err(StorageError::Backend("storage unavailable".to_string()))
    }
}

/// A fresh, not-yet-created directory under the system temp dir
pub fn scratch_dir(label: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("entregas-{}-{}-{}", label, std::process::id(), n))
}
