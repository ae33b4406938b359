//! HTTP blob service storage.
//!
//! The actual HTTP client is abstracted via a trait so the engine does not
//! depend on a particular HTTP library or on how bearer tokens are obtained
//! and refreshed. The client is expected to attach authentication itself.

use crate::error::{StorageError, StorageResult};
use crate::remote::{RemoteStorage, RootPointer};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use tracing::debug;

/// A response from the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates an empty `200 OK` response.
    pub fn ok() -> Self {
        Self::new(200, Vec::new())
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// `Err` is reserved for transport failures (connection refused, timeout,
/// TLS errors). Any response the server produced, whatever its status, is
/// returned as `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    fn get(&self, url: &str) -> Result<HttpResponse, String>;

    /// Sends a PUT request with a body.
    fn put(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;

    /// Sends a POST request with a body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;
}

const ROOT_GET_PATH: &str = "/sync/v4/root";
const ROOT_PUT_PATH: &str = "/sync/v3/root";
const FILES_PATH: &str = "/sync/v3/files/";
const SYNC_COMPLETE_PATH: &str = "/sync/v2/sync-complete";

#[derive(Debug, Deserialize)]
struct RootResponse {
    hash: String,
    generation: u64,
}

#[derive(Debug, Serialize)]
struct RootUpdateRequest<'a> {
    hash: &'a str,
    generation: u64,
    broadcast: bool,
}

#[derive(Debug, Serialize)]
struct SyncCompleteRequest {
    generation: u64,
}

/// A [`RemoteStorage`] talking to the HTTP blob service.
pub struct HttpBlobStorage<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpBlobStorage<C> {
    /// Creates a storage client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|e| StorageError::protocol(format!("failed to encode request: {e}")))
    }

    fn decode_root(response: &HttpResponse) -> StorageResult<RootResponse> {
        serde_json::from_slice(&response.body)
            .map_err(|e| StorageError::protocol(format!("failed to decode root response: {e}")))
    }
}

/// Maps a non-success status to a storage error.
fn status_error(response: &HttpResponse, what: &str) -> StorageError {
    let body = String::from_utf8_lossy(&response.body);
    match response.status {
        401 | 403 => StorageError::Auth {
            message: format!("{what}: {} {body}", response.status),
        },
        500..=599 => StorageError::network(format!("{what}: {} {body}", response.status)),
        status => StorageError::protocol(format!("{what}: unexpected status {status} {body}")),
    }
}

impl<C: HttpClient> RemoteStorage for HttpBlobStorage<C> {
    fn get_root(&self) -> StorageResult<RootPointer> {
        let response = self
            .client
            .get(&self.url(ROOT_GET_PATH))
            .map_err(StorageError::network)?;
        match response.status {
            404 => Ok(RootPointer::default()),
            _ if response.is_success() => {
                let root = Self::decode_root(&response)?;
                Ok(RootPointer::new(root.hash, root.generation))
            }
            _ => Err(status_error(&response, "get root")),
        }
    }

    fn get_reader(&self, hash: &str) -> StorageResult<Box<dyn Read + Send>> {
        let response = self
            .client
            .get(&self.url(&format!("{FILES_PATH}{hash}")))
            .map_err(StorageError::network)?;
        match response.status {
            404 => Err(StorageError::not_found(hash)),
            _ if response.is_success() => {
                debug!(hash, size = response.body.len(), "fetched blob");
                Ok(Box::new(Cursor::new(response.body)))
            }
            _ => Err(status_error(&response, "get blob")),
        }
    }

    fn put_blob(&self, hash: &str, content: &[u8]) -> StorageResult<()> {
        let response = self
            .client
            .put(&self.url(&format!("{FILES_PATH}{hash}")), content.to_vec())
            .map_err(StorageError::network)?;
        if response.is_success() {
            debug!(hash, size = content.len(), "uploaded blob");
            Ok(())
        } else {
            Err(status_error(&response, "put blob"))
        }
    }

    fn cas_root(&self, hash: &str, expected_generation: u64) -> StorageResult<u64> {
        let body = Self::encode(&RootUpdateRequest {
            hash,
            generation: expected_generation,
            broadcast: true,
        })?;
        let response = self
            .client
            .put(&self.url(ROOT_PUT_PATH), body)
            .map_err(StorageError::network)?;
        match response.status {
            412 => Err(StorageError::WrongGeneration {
                expected: expected_generation,
            }),
            _ if response.is_success() => {
                let root = Self::decode_root(&response)?;
                if root.hash != hash {
                    return Err(StorageError::protocol(format!(
                        "root update acknowledged {} instead of {hash}",
                        root.hash
                    )));
                }
                Ok(root.generation)
            }
            _ => Err(status_error(&response, "update root")),
        }
    }

    fn sync_complete(&self, generation: u64) -> StorageResult<()> {
        let body = Self::encode(&SyncCompleteRequest { generation })?;
        let response = self
            .client
            .post(&self.url(SYNC_COMPLETE_PATH), body)
            .map_err(StorageError::network)?;
        match response.status {
            409 => Err(StorageError::Conflict { generation }),
            _ if response.is_success() => Ok(()),
            _ => Err(status_error(&response, "sync complete")),
        }
    }
}
