use crate::api::{SourceFactory, SpotifySessionFactory};
use crate::config::Config;
use crate::db;
use crate::diff;
use crate::errors::FailureKind;
use crate::models::{ConnectionCredentials, MailConfig, PlaylistItem, Snapshot, TrackedPlaylist};
use crate::notify::{smtp::SmtpDispatcher, Dispatcher};
use anyhow::{Context, Result};
use log::{error, info};

use std::sync::Arc;
use std::time::Duration;

/// Outcome of one full pass over all connections and playlists.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub playlists_checked: usize,
    pub digests_sent: usize,
    pub notifications_skipped: usize,
}

/// Drives the poll-diff-persist-notify loop. Connections and playlists are
/// processed strictly sequentially; the only suspension points are the
/// sleeps between cycles.
pub struct Poller {
    cfg: Config,
    sources: Arc<dyn SourceFactory>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Poller {
    pub fn new(cfg: Config) -> Self {
        Self::with_parts(cfg, Arc::new(SpotifySessionFactory), Arc::new(SmtpDispatcher::new()))
    }

    /// Explicit-dependency constructor; tests inject mock sources and
    /// dispatchers through this.
    pub fn with_parts(
        cfg: Config,
        sources: Arc<dyn SourceFactory>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self { cfg, sources, dispatcher }
    }

    /// Long-running entry point: poll forever, classifying every failure
    /// into a backoff instead of exiting. Returns only if the store cannot
    /// be opened at startup.
    pub async fn run(&self) -> Result<()> {
        info!("Starting playlist update notification daemon");

        let db_path = self.cfg.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), anyhow::Error> {
            let path_display = db_path.display().to_string();
            db::open_or_create(&db_path)
                .with_context(|| format!("opening DB at {}", path_display))?;
            info!("DB connection to {} successfully opened", path_display);
            Ok(())
        })
        .await??;

        loop {
            match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        "Cycle complete: {} playlist(s) checked, {} digest(s) sent, {} notification(s) skipped",
                        report.playlists_checked, report.digests_sent, report.notifications_skipped
                    );
                    tokio::time::sleep(Duration::from_secs(self.cfg.poll_interval_sec)).await;
                }
                Err(e) => {
                    let kind = FailureKind::classify(&e);
                    let backoff = kind.backoff();
                    match kind {
                        FailureKind::Network => error!(
                            "Failed to connect. This might be because there is no internet. Retrying in {}s: {:#}",
                            backoff.as_secs(),
                            e
                        ),
                        _ => error!(
                            "Error while checking for updates. Waiting {}s and retrying: {:#}",
                            backoff.as_secs(),
                            e
                        ),
                    }
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// One full pass: for every connection and every tracked playlist,
    /// fetch, diff against the stored snapshot, persist the fetched state
    /// unconditionally, then notify if anything is new. Fetch and persist
    /// errors abort the remainder of the cycle and are classified by the
    /// caller; the next cycle restarts from the first connection.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        info!("Checking for updates");
        let mut report = CycleReport::default();

        let connections = tokio::task::spawn_blocking({
            let db_path = self.cfg.db_path.clone();
            move || -> Result<Vec<ConnectionCredentials>, anyhow::Error> {
                let path_display = db_path.display().to_string();
                let conn = db::open_or_create(&db_path)
                    .with_context(|| format!("opening DB for enumerating connections at {}", path_display))?;
                db::list_connections(&conn)
            }
        })
        .await??;

        for creds in connections {
            let source = self.sources.open_session(&creds);

            let playlists: Vec<TrackedPlaylist> = tokio::task::spawn_blocking({
                let db_path = self.cfg.db_path.clone();
                let connection_id = creds.id;
                move || -> Result<Vec<TrackedPlaylist>, anyhow::Error> {
                    let conn = db::open_or_create(&db_path)?;
                    db::list_tracked_playlists(&conn, connection_id)
                }
            })
            .await?
            .with_context(|| format!("enumerating playlists of connection {}", creds.id))?;

            for pl in playlists {
                let current = source
                    .fetch_playlist(&pl.external_id)
                    .await
                    .with_context(|| {
                        format!("fetching playlist {} (connection {})", pl.external_id, creds.id)
                    })?;

                let fresh = diff::new_items(pl.last_snapshot.as_ref(), &current);

                // Persist before notifying: a failed digest must never lead
                // to the same items being reported again next cycle.
                tokio::task::spawn_blocking({
                    let db_path = self.cfg.db_path.clone();
                    let playlist_id = pl.id;
                    let snapshot = current.clone();
                    move || -> Result<(), anyhow::Error> {
                        let conn = db::open_or_create(&db_path)?;
                        db::save_snapshot(&conn, playlist_id, &snapshot)
                    }
                })
                .await?
                .with_context(|| format!("persisting snapshot of playlist {}", pl.external_id))?;

                report.playlists_checked += 1;

                if fresh.is_empty() {
                    continue;
                }
                info!("The playlist {} was updated.", pl.external_id);
                if self.notify(pl.id, &current, &fresh).await? {
                    report.digests_sent += 1;
                } else {
                    report.notifications_skipped += 1;
                }
            }
        }

        info!("Finished checking for updates");
        Ok(report)
    }

    /// Resolve mail configuration and subscribers, then dispatch one digest.
    /// Store trouble on this path only costs the affected notification: it
    /// is logged and skipped (`Ok(false)`) so the cycle can continue with
    /// the next playlist. A transport failure propagates.
    async fn notify(
        &self,
        playlist_id: i64,
        playlist: &Snapshot,
        fresh: &[PlaylistItem],
    ) -> Result<bool> {
        let mail_res = tokio::task::spawn_blocking({
            let db_path = self.cfg.db_path.clone();
            move || -> Result<Option<MailConfig>, anyhow::Error> {
                let conn = db::open_or_create(&db_path)?;
                db::load_mail_config(&conn)
            }
        })
        .await?;

        let mail = match mail_res {
            Ok(Some(m)) => m,
            Ok(None) => {
                error!("No information about email sending in the store; skipping notification");
                return Ok(false);
            }
            Err(e) => {
                error!(
                    "Could not read information from the store required to send emails; skipping notification: {:#}",
                    e
                );
                return Ok(false);
            }
        };

        let recipients_res = tokio::task::spawn_blocking({
            let db_path = self.cfg.db_path.clone();
            move || -> Result<Vec<String>, anyhow::Error> {
                let conn = db::open_or_create(&db_path)?;
                db::list_subscribers(&conn, playlist_id)
            }
        })
        .await?;

        let recipients = match recipients_res {
            Ok(r) => r,
            Err(e) => {
                error!(
                    "Could not resolve subscribers for playlist {}; skipping notification: {:#}",
                    playlist_id, e
                );
                return Ok(false);
            }
        };

        if recipients.is_empty() {
            info!("Playlist {} has no subscribers; skipping digest", playlist_id);
            return Ok(false);
        }

        self.dispatcher
            .send_digest(&mail, &recipients, playlist, fresh)
            .await
            .with_context(|| format!("sending digest for playlist {}", playlist_id))?;
        Ok(true)
    }
}
