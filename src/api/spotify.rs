use super::PlaylistSource;
use crate::errors::{NetworkError, ProviderError};
use crate::models::{AlbumRef, ArtistRef, PlaylistItem, Snapshot, TrackInfo};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::Value;
use std::env;

/// App token from the client-credentials grant. The notifier only reads
/// public playlist state, so no user authorization is involved.
#[derive(Debug, Clone)]
struct AppToken {
    access_token: String,
    expires_at: i64, // epoch seconds
}

/// Spotify source backed by the Spotify Web API.
/// Endpoints may be overridden by SPOTIFY_AUTH_BASE and SPOTIFY_API_BASE env vars (useful for tests).
pub struct SpotifySource {
    client: Client,
    client_id: String,
    client_secret: String,
    token: tokio::sync::Mutex<Option<AppToken>>,
}

impl SpotifySource {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client: Client::new(),
            client_id,
            client_secret,
            token: tokio::sync::Mutex::new(None),
        }
    }

    fn auth_base() -> String {
        env::var("SPOTIFY_AUTH_BASE").unwrap_or_else(|_| "https://accounts.spotify.com".into())
    }
    fn api_base() -> String {
        // include v1 path by default
        env::var("SPOTIFY_API_BASE").unwrap_or_else(|_| "https://api.spotify.com/v1".into())
    }

    async fn request_token(&self) -> Result<AppToken> {
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        );
        let url = format!("{}/api/token", Self::auth_base());
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth_header)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(as_network)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(ProviderError(format!(
                "token grant failed: {} => {}",
                status, body
            ))));
        }
        let j: Value = resp.json().await?;
        let access_token = j["access_token"]
            .as_str()
            .ok_or_else(|| ProviderError("token response missing access_token".into()))?
            .to_string();
        let expires_in = j["expires_in"].as_i64().unwrap_or(3600);
        Ok(AppToken { access_token, expires_at: Utc::now().timestamp() + expires_in })
    }

    async fn ensure_token(&self, force: bool) -> Result<()> {
        let mut lock = self.token.lock().await;
        let stale = match &*lock {
            None => true,
            Some(t) => force || Utc::now().timestamp() + 30 >= t.expires_at,
        };
        if stale {
            debug!("Spotify app token missing or near expiry, requesting a new one");
            *lock = Some(self.request_token().await?);
        }
        Ok(())
    }

    async fn get_bearer(&self) -> Result<String> {
        self.ensure_token(false).await?;
        let lock = self.token.lock().await;
        let t = lock.as_ref().ok_or_else(|| anyhow!("no token loaded"))?;
        Ok(format!("Bearer {}", t.access_token))
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let bearer = self.get_bearer().await?;
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, &bearer)
            .send()
            .await
            .map_err(as_network)?;
        let status = resp.status();

        if status.as_u16() == 401 {
            // App tokens cannot be refreshed; request a fresh one and retry once.
            warn!("Got 401 from {}; requesting a fresh token", url);
            self.ensure_token(true).await?;
            let bearer2 = self.get_bearer().await?;
            let resp2 = self
                .client
                .get(url)
                .header(AUTHORIZATION, &bearer2)
                .send()
                .await
                .map_err(as_network)?;
            let st2 = resp2.status();
            if !st2.is_success() {
                let txt = resp2.text().await.unwrap_or_default();
                return Err(anyhow!(ProviderError(format!(
                    "playlist fetch failed after token refresh: {} => {}",
                    st2, txt
                ))));
            }
            return Ok(resp2.json().await?);
        }

        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!(ProviderError(format!(
                "playlist fetch failed: {} => {}",
                status, txt
            ))));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PlaylistSource for SpotifySource {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn fetch_playlist(&self, external_id: &str) -> Result<Snapshot> {
        let url = format!(
            "{}/playlists/{}",
            Self::api_base(),
            url::form_urlencoded::byte_serialize(external_id.as_bytes()).collect::<String>()
        );
        let j = self.get_json(&url).await?;
        let mut snapshot = snapshot_from_payload(&j)?;

        // The playlist endpoint only carries the first page of tracks;
        // follow the continuation links for the rest.
        let mut next = j["tracks"]["next"].as_str().map(|s| s.to_string());
        while let Some(url) = next {
            let page = self.get_json(&url).await?;
            if let Some(arr) = page["items"].as_array() {
                for it in arr {
                    snapshot.items.push(item_from_payload(it)?);
                }
            }
            next = page["next"].as_str().map(|s| s.to_string());
        }

        Ok(snapshot)
    }
}

fn as_network(e: reqwest::Error) -> anyhow::Error {
    if e.is_connect() || e.is_timeout() {
        anyhow::Error::new(NetworkError(e.to_string()))
    } else {
        e.into()
    }
}

/// Map the playlist payload into our snapshot shape. Display fields are
/// best-effort; the item list is strict because the diff depends on it.
fn snapshot_from_payload(v: &Value) -> Result<Snapshot> {
    let name = v["name"]
        .as_str()
        .ok_or_else(|| ProviderError("playlist payload missing name".into()))?
        .to_string();

    let mut items = Vec::new();
    if let Some(arr) = v["tracks"]["items"].as_array() {
        for it in arr {
            items.push(item_from_payload(it)?);
        }
    }

    // Provider fields we do not interpret but keep with the snapshot.
    let mut extra = serde_json::Map::new();
    for key in ["snapshot_id", "uri", "collaborative", "public"] {
        if !v[key].is_null() {
            extra.insert(key.to_string(), v[key].clone());
        }
    }

    Ok(Snapshot {
        name,
        description: v["description"].as_str().unwrap_or("").to_string(),
        external_url: v["external_urls"]["spotify"].as_str().map(String::from),
        artwork_url: image_url(&v["images"], 1),
        items,
        extra: if extra.is_empty() { Value::Null } else { Value::Object(extra) },
    })
}

fn item_from_payload(v: &Value) -> Result<PlaylistItem> {
    let added_raw = v["added_at"]
        .as_str()
        .ok_or_else(|| ProviderError("track entry missing added_at".into()))?;
    let added_at: DateTime<Utc> = added_raw
        .parse()
        .map_err(|e| ProviderError(format!("bad added_at {:?}: {}", added_raw, e)))?;

    let t = &v["track"];
    let name = t["name"]
        .as_str()
        .ok_or_else(|| ProviderError("track entry missing track name".into()))?
        .to_string();

    let artists = t["artists"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|a| ArtistRef {
                    name: a["name"].as_str().unwrap_or("").to_string(),
                    external_url: a["external_urls"]["spotify"].as_str().map(String::from),
                })
                .collect()
        })
        .unwrap_or_default();

    let album = AlbumRef {
        name: t["album"]["name"].as_str().unwrap_or("").to_string(),
        external_url: t["album"]["external_urls"]["spotify"].as_str().map(String::from),
        artwork_url: image_url(&t["album"]["images"], 2),
    };

    Ok(PlaylistItem {
        added_at,
        track: TrackInfo {
            name,
            external_url: t["external_urls"]["spotify"].as_str().map(String::from),
            artists,
            album,
        },
    })
}

/// Spotify image arrays go largest-first; prefer the given index and fall
/// back to the smallest available.
fn image_url(images: &Value, preferred: usize) -> Option<String> {
    let arr = images.as_array()?;
    arr.get(preferred)
        .or_else(|| arr.last())
        .and_then(|i| i["url"].as_str())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_maps_to_snapshot() {
        let payload = json!({
            "name": "Morning Mix",
            "description": "wake up",
            "external_urls": {"spotify": "https://open.spotify.com/playlist/abc"},
            "images": [
                {"url": "https://img/640"}, {"url": "https://img/300"}, {"url": "https://img/64"}
            ],
            "snapshot_id": "xyz",
            "tracks": {
                "items": [{
                    "added_at": "2024-05-01T08:30:00Z",
                    "track": {
                        "name": "Song",
                        "external_urls": {"spotify": "https://open.spotify.com/track/t1"},
                        "artists": [{"name": "Band", "external_urls": {"spotify": "https://open.spotify.com/artist/a1"}}],
                        "album": {
                            "name": "Record",
                            "external_urls": {"spotify": "https://open.spotify.com/album/al1"},
                            "images": [{"url": "https://img/a640"}, {"url": "https://img/a300"}, {"url": "https://img/a64"}]
                        }
                    }
                }],
                "next": null
            }
        });
        let s = snapshot_from_payload(&payload).unwrap();
        assert_eq!(s.name, "Morning Mix");
        assert_eq!(s.artwork_url.as_deref(), Some("https://img/300"));
        assert_eq!(s.items.len(), 1);
        let it = &s.items[0];
        assert_eq!(it.track.name, "Song");
        assert_eq!(it.track.artists[0].name, "Band");
        assert_eq!(it.track.album.artwork_url.as_deref(), Some("https://img/a64"));
        assert_eq!(s.extra["snapshot_id"], "xyz");
    }

    #[test]
    fn missing_added_at_is_a_provider_error() {
        let payload = json!({
            "name": "P",
            "tracks": {"items": [{"track": {"name": "Song", "album": {"name": "R"}}}]}
        });
        let err = snapshot_from_payload(&payload).unwrap_err();
        assert!(err.to_string().contains("added_at"));
    }

    #[test]
    fn image_url_falls_back_to_smallest() {
        let images = json!([{"url": "https://img/640"}]);
        assert_eq!(image_url(&images, 2).as_deref(), Some("https://img/640"));
        assert_eq!(image_url(&json!([]), 1), None);
        assert_eq!(image_url(&json!(null), 1), None);
    }
}
