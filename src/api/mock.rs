use super::{PlaylistSource, SourceFactory};
use crate::errors::{NetworkError, ProviderError};
use crate::models::{ConnectionCredentials, Snapshot};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// What a fetch of a given external id should produce.
#[derive(Debug, Clone)]
pub enum MockFetch {
    Snapshot(Snapshot),
    NetworkDown,
    Malformed,
}

/// A canned source used in tests: serves configured snapshots and can
/// simulate connectivity loss or bad payloads per playlist id.
#[derive(Default)]
pub struct MockSource {
    responses: Mutex<HashMap<String, MockFetch>>,
    fetches: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, external_id: &str, fetch: MockFetch) {
        self.responses.lock().unwrap().insert(external_id.to_string(), fetch);
    }

    /// Number of fetches attempted so far, across all playlists.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PlaylistSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_playlist(&self, external_id: &str) -> Result<Snapshot> {
        info!("MockSource: fetch_playlist {}", external_id);
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let fetch = self.responses.lock().unwrap().get(external_id).cloned();
        match fetch {
            Some(MockFetch::Snapshot(s)) => Ok(s),
            Some(MockFetch::NetworkDown) => {
                Err(NetworkError(format!("mock: {} unreachable", external_id)).into())
            }
            Some(MockFetch::Malformed) | None => {
                Err(ProviderError(format!("mock: no such playlist {}", external_id)).into())
            }
        }
    }
}

/// Hands the same shared mock source to every connection.
pub struct MockSourceFactory {
    pub source: Arc<MockSource>,
}

impl SourceFactory for MockSourceFactory {
    fn open_session(&self, _creds: &ConnectionCredentials) -> Arc<dyn PlaylistSource> {
        self.source.clone()
    }
}
