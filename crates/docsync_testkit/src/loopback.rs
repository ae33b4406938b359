//! An in-memory blob service answering HTTP requests in-process.

use docsync_storage::{HttpClient, HttpResponse};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct ServiceState {
    blobs: HashMap<String, Vec<u8>>,
    root: Option<(String, u64)>,
    notified: Option<u64>,
    requests: usize,
}

/// Serves the blob service endpoints from memory, with the same status
/// codes as the real service (404, 409, 412).
///
/// Several storages can share one service through `&LoopbackBlobService`.
#[derive(Debug, Default)]
pub struct LoopbackBlobService {
    state: Mutex<ServiceState>,
}

impl LoopbackBlobService {
    /// Creates an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of requests served.
    pub fn requests(&self) -> usize {
        self.state.lock().requests
    }

    /// Returns the current root generation.
    pub fn generation(&self) -> u64 {
        self.state.lock().root.as_ref().map_or(0, |(_, g)| *g)
    }

    /// Returns the last acknowledged generation.
    pub fn notified(&self) -> Option<u64> {
        self.state.lock().notified
    }

    fn route(&self, method: &str, url: &str, body: &[u8]) -> HttpResponse {
        let path = url.find("/sync/").map_or(url, |i| &url[i..]);
        let mut state = self.state.lock();
        state.requests += 1;

        if let Some(hash) = path.strip_prefix("/sync/v3/files/") {
            return match method {
                "GET" => match state.blobs.get(hash) {
                    Some(blob) => HttpResponse::new(200, blob.clone()),
                    None => HttpResponse::new(404, Vec::new()),
                },
                "PUT" => {
                    state.blobs.insert(hash.to_string(), body.to_vec());
                    HttpResponse::ok()
                }
                _ => HttpResponse::new(405, Vec::new()),
            };
        }

        match (method, path) {
            ("GET", "/sync/v4/root") => match &state.root {
                Some((hash, generation)) => root_response(hash, *generation),
                None => HttpResponse::new(404, Vec::new()),
            },
            ("PUT", "/sync/v3/root") => {
                let Ok(request) = serde_json::from_slice::<Value>(body) else {
                    return HttpResponse::new(400, "bad request");
                };
                let (Some(hash), Some(expected)) =
                    (request["hash"].as_str(), request["generation"].as_u64())
                else {
                    return HttpResponse::new(400, "missing fields");
                };
                let current = state.root.as_ref().map_or(0, |(_, g)| *g);
                if current != expected {
                    return HttpResponse::new(412, "generation mismatch");
                }
                let next = current + 1;
                state.root = Some((hash.to_string(), next));
                root_response(hash, next)
            }
            ("POST", "/sync/v2/sync-complete") => {
                let generation = serde_json::from_slice::<Value>(body)
                    .ok()
                    .and_then(|v| v["generation"].as_u64());
                let current = state.root.as_ref().map_or(0, |(_, g)| *g);
                match generation {
                    Some(g) if g < current => HttpResponse::new(409, "superseded"),
                    Some(g) => {
                        state.notified = Some(g);
                        HttpResponse::ok()
                    }
                    None => HttpResponse::new(400, "missing generation"),
                }
            }
            _ => HttpResponse::new(404, Vec::new()),
        }
    }
}

fn root_response(hash: &str, generation: u64) -> HttpResponse {
    let body = json!({ "hash": hash, "generation": generation, "schemaVersion": 3 });
    HttpResponse::new(200, body.to_string())
}

impl HttpClient for &LoopbackBlobService {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        Ok(self.route("GET", url, &[]))
    }

    fn put(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        Ok(self.route("PUT", url, &body))
    }

    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        Ok(self.route("POST", url, &body))
    }
}
