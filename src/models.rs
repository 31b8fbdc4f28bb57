use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time capture of a tracked playlist: the item set plus the
/// display metadata the digest needs. Only `items` is interpreted by the
/// diff; everything the provider sends beyond these fields is carried
/// opaquely in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    pub items: Vec<PlaylistItem>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

impl Snapshot {
    /// Insertion timestamp of the newest item, if any.
    pub fn latest_added_at(&self) -> Option<DateTime<Utc>> {
        self.items.iter().map(|it| it.added_at).max()
    }
}

/// One entry of a playlist. `added_at` is second-precision UTC and is
/// monotonic per insertion; ties between entries are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub added_at: DateTime<Utc>,
    pub track: TrackInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub name: String,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    pub album: AlbumRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistRef {
    pub name: String,
    #[serde(default)]
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumRef {
    pub name: String,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
}

/// Provider credentials for one upstream account. Read-only to the poller.
#[derive(Debug, Clone)]
pub struct ConnectionCredentials {
    pub id: i64,
    pub client_id: String,
    pub client_secret: String,
}

/// A playlist the daemon watches. `last_snapshot` is None until the first
/// successful poll establishes a baseline.
#[derive(Debug, Clone)]
pub struct TrackedPlaylist {
    pub id: i64,
    pub external_id: String,
    pub last_snapshot: Option<Snapshot>,
}

/// Outbound mail settings, stored as the single `global_config` row.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender: String,
    pub host: String,
    pub port: u16,
    pub password: String,
}
