pub mod spotify;
pub mod mock;

use crate::models::{ConnectionCredentials, Snapshot};
use anyhow::Result;
use std::sync::Arc;

/// PlaylistSource trait: the single fetch operation the poller needs.
/// Implementations: spotify::SpotifySource and mock::MockSource.
#[async_trait::async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Fetch the current snapshot of an external playlist. One blocking
    /// network exchange, no internal retry; connectivity failures surface
    /// as `errors::NetworkError`, bad responses as `errors::ProviderError`.
    async fn fetch_playlist(&self, external_id: &str) -> Result<Snapshot>;

    /// Return the source's name (for logging)
    fn name(&self) -> &str;
}

/// Opens one provider session per connection's credentials. The poller asks
/// for a fresh session at the start of each connection within a cycle.
pub trait SourceFactory: Send + Sync {
    fn open_session(&self, creds: &ConnectionCredentials) -> Arc<dyn PlaylistSource>;
}

/// Production factory: one authenticated Spotify client per connection.
pub struct SpotifySessionFactory;

impl SourceFactory for SpotifySessionFactory {
    fn open_session(&self, creds: &ConnectionCredentials) -> Arc<dyn PlaylistSource> {
        Arc::new(spotify::SpotifySource::new(
            creds.client_id.clone(),
            creds.client_secret.clone(),
        ))
    }
}
