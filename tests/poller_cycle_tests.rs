use std::path::PathBuf;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

use playlist_update_notifier::api::mock::{MockFetch, MockSource, MockSourceFactory};
use playlist_update_notifier::config::Config;
use playlist_update_notifier::db;
use playlist_update_notifier::models::{AlbumRef, MailConfig, PlaylistItem, Snapshot, TrackInfo};
use playlist_update_notifier::notify::mock::MockDispatcher;
use playlist_update_notifier::poller::Poller;

fn item(name: &str, ts: &str) -> PlaylistItem {
    PlaylistItem {
        added_at: ts.parse().unwrap(),
        track: TrackInfo {
            name: name.into(),
            external_url: None,
            artists: Vec::new(),
            album: AlbumRef { name: "album".into(), external_url: None, artwork_url: None },
        },
    }
}

fn snapshot(items: Vec<PlaylistItem>) -> Snapshot {
    Snapshot {
        name: "Morning Mix".into(),
        description: String::new(),
        external_url: None,
        artwork_url: None,
        items,
        extra: serde_json::Value::Null,
    }
}

fn test_config(td: &TempDir) -> Config {
    Config {
        db_path: td.path().join("test.db"),
        log_dir: td.path().join("logs"),
        poll_interval_sec: 3600,
    }
}

struct Harness {
    cfg: Config,
    source: Arc<MockSource>,
    dispatcher: Arc<MockDispatcher>,
    playlist_id: i64,
}

/// Seed one connection with one tracked playlist, one subscriber and a mail
/// configuration, and wire a poller to mock source and dispatcher.
fn seeded_harness(td: &TempDir, with_mail_config: bool) -> Harness {
    let cfg = test_config(td);
    let conn = db::open_or_create(&cfg.db_path).unwrap();
    let connection_id = db::add_connection(&conn, "cid", "secret").unwrap();
    let playlist_id = db::track_playlist(&conn, connection_id, "ext-1").unwrap();
    db::subscribe_email(&conn, playlist_id, "fan@example.com").unwrap();
    if with_mail_config {
        db::set_mail_config(
            &conn,
            &MailConfig {
                sender: "bot@example.com".into(),
                host: "smtp.example.com".into(),
                port: 465,
                password: "hunter2".into(),
            },
        )
        .unwrap();
    }

    Harness {
        cfg,
        source: Arc::new(MockSource::new()),
        dispatcher: Arc::new(MockDispatcher::new()),
        playlist_id,
    }
}

fn poller_for(h: &Harness) -> Poller {
    Poller::with_parts(
        h.cfg.clone(),
        Arc::new(MockSourceFactory { source: h.source.clone() }),
        h.dispatcher.clone(),
    )
}

fn stored_snapshot(db_path: &PathBuf, playlist_id: i64) -> Option<Snapshot> {
    let conn = rusqlite::Connection::open(db_path).unwrap();
    let json: Option<String> = conn
        .query_row(
            "SELECT last_state_json FROM playlists WHERE id = ?1",
            rusqlite::params![playlist_id],
            |r| r.get(0),
        )
        .unwrap();
    json.map(|s| serde_json::from_str(&s).unwrap())
}

#[test]
fn first_poll_establishes_baseline_without_digest() {
    let td = tempdir().unwrap();
    let h = seeded_harness(&td, true);
    h.source.set(
        "ext-1",
        MockFetch::Snapshot(snapshot(vec![
            item("a", "2024-01-01T00:00:00Z"),
            item("b", "2024-01-02T00:00:00Z"),
        ])),
    );

    let rt = tokio::runtime::Runtime::new().unwrap();
    let report = rt.block_on(poller_for(&h).run_cycle()).unwrap();

    assert_eq!(report.playlists_checked, 1);
    assert_eq!(report.digests_sent, 0);
    assert!(h.dispatcher.sent().is_empty());

    let stored = stored_snapshot(&h.cfg.db_path, h.playlist_id).expect("baseline persisted");
    assert_eq!(stored.items.len(), 2);

    // A second cycle over unchanged content stays quiet.
    let report = rt.block_on(poller_for(&h).run_cycle()).unwrap();
    assert_eq!(report.digests_sent, 0);
    assert!(h.dispatcher.sent().is_empty());
}

#[test]
fn new_item_triggers_exactly_one_digest() {
    let td = tempdir().unwrap();
    let h = seeded_harness(&td, true);
    let rt = tokio::runtime::Runtime::new().unwrap();

    h.source.set(
        "ext-1",
        MockFetch::Snapshot(snapshot(vec![
            item("a", "2024-01-01T00:00:00Z"),
            item("b", "2024-01-02T00:00:00Z"),
        ])),
    );
    rt.block_on(poller_for(&h).run_cycle()).unwrap();

    h.source.set(
        "ext-1",
        MockFetch::Snapshot(snapshot(vec![
            item("a", "2024-01-01T00:00:00Z"),
            item("b", "2024-01-02T00:00:00Z"),
            item("c", "2024-01-03T00:00:00Z"),
        ])),
    );
    let report = rt.block_on(poller_for(&h).run_cycle()).unwrap();
    assert_eq!(report.digests_sent, 1);

    let sent = h.dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].item_names, vec!["c".to_string()]);
    assert_eq!(sent[0].recipients, vec!["fan@example.com".to_string()]);
    assert_eq!(sent[0].playlist_name, "Morning Mix");

    // Polling the same content again must not repeat the digest.
    let report = rt.block_on(poller_for(&h).run_cycle()).unwrap();
    assert_eq!(report.digests_sent, 0);
    assert_eq!(h.dispatcher.sent().len(), 1);
}

#[test]
fn snapshot_is_persisted_even_when_the_digest_fails() {
    let td = tempdir().unwrap();
    let h = seeded_harness(&td, true);
    let rt = tokio::runtime::Runtime::new().unwrap();

    h.source.set(
        "ext-1",
        MockFetch::Snapshot(snapshot(vec![item("a", "2024-01-01T00:00:00Z")])),
    );
    rt.block_on(poller_for(&h).run_cycle()).unwrap();

    h.source.set(
        "ext-1",
        MockFetch::Snapshot(snapshot(vec![
            item("a", "2024-01-01T00:00:00Z"),
            item("b", "2024-01-02T00:00:00Z"),
        ])),
    );
    h.dispatcher.fail_next_sends(true);
    let err = rt.block_on(poller_for(&h).run_cycle()).unwrap_err();
    assert!(err.to_string().contains("sending digest"));

    // State advanced before the failed send.
    let stored = stored_snapshot(&h.cfg.db_path, h.playlist_id).unwrap();
    assert_eq!(stored.items.len(), 2);

    // The retried cycle finds nothing new: the failed digest is lost, not
    // duplicated.
    h.dispatcher.fail_next_sends(false);
    let report = rt.block_on(poller_for(&h).run_cycle()).unwrap();
    assert_eq!(report.digests_sent, 0);
    assert!(h.dispatcher.sent().is_empty());
}

#[test]
fn missing_mail_config_skips_notification_but_cycle_completes() {
    let td = tempdir().unwrap();
    let h = seeded_harness(&td, false);
    let rt = tokio::runtime::Runtime::new().unwrap();

    h.source.set(
        "ext-1",
        MockFetch::Snapshot(snapshot(vec![item("a", "2024-01-01T00:00:00Z")])),
    );
    rt.block_on(poller_for(&h).run_cycle()).unwrap();

    h.source.set(
        "ext-1",
        MockFetch::Snapshot(snapshot(vec![
            item("a", "2024-01-01T00:00:00Z"),
            item("b", "2024-01-02T00:00:00Z"),
        ])),
    );
    let report = rt.block_on(poller_for(&h).run_cycle()).expect("cycle completes");
    assert_eq!(report.notifications_skipped, 1);
    assert_eq!(report.digests_sent, 0);
    assert!(h.dispatcher.sent().is_empty());

    // The snapshot still advanced; configuring mail later must not cause a
    // late digest for these items.
    let stored = stored_snapshot(&h.cfg.db_path, h.playlist_id).unwrap();
    assert_eq!(stored.items.len(), 2);
}

#[test]
fn playlist_without_subscribers_is_skipped_quietly() {
    let td = tempdir().unwrap();
    let cfg = test_config(&td);
    let conn = db::open_or_create(&cfg.db_path).unwrap();
    let connection_id = db::add_connection(&conn, "cid", "secret").unwrap();
    db::track_playlist(&conn, connection_id, "ext-1").unwrap();
    db::set_mail_config(
        &conn,
        &MailConfig {
            sender: "bot@example.com".into(),
            host: "smtp.example.com".into(),
            port: 465,
            password: "hunter2".into(),
        },
    )
    .unwrap();

    let source = Arc::new(MockSource::new());
    let dispatcher = Arc::new(MockDispatcher::new());
    let poller = Poller::with_parts(
        cfg,
        Arc::new(MockSourceFactory { source: source.clone() }),
        dispatcher.clone(),
    );

    let rt = tokio::runtime::Runtime::new().unwrap();
    source.set(
        "ext-1",
        MockFetch::Snapshot(snapshot(vec![item("a", "2024-01-01T00:00:00Z")])),
    );
    rt.block_on(poller.run_cycle()).unwrap();
    source.set(
        "ext-1",
        MockFetch::Snapshot(snapshot(vec![
            item("a", "2024-01-01T00:00:00Z"),
            item("b", "2024-01-02T00:00:00Z"),
        ])),
    );
    let report = rt.block_on(poller.run_cycle()).unwrap();
    assert_eq!(report.notifications_skipped, 1);
    assert!(dispatcher.sent().is_empty());
}
