use playlist_update_notifier::diff::new_items;
use playlist_update_notifier::models::{AlbumRef, PlaylistItem, Snapshot, TrackInfo};

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
        name: "pl".into(),
        description: String::new(),
        external_url: None,
        artwork_url: None,
        items,
        extra: serde_json::Value::Null,
    }
}

#[test]
fn first_poll_reports_nothing() {
    // Scenario: previous = None, current has content.
    let current = snapshot(vec![
        item("a", "2024-01-01T00:00:00Z"),
        item("b", "2024-01-02T00:00:00Z"),
    ]);
    assert!(new_items(None, &current).is_empty());
}

#[test]
fn diff_is_idempotent() {
    let current = snapshot(vec![
        item("a", "2024-01-01T00:00:00Z"),
        item("b", "2024-01-02T00:00:00Z"),
        item("c", "2024-01-02T00:00:00Z"),
    ]);
    assert!(new_items(Some(&current), &current).is_empty());
}

#[test]
fn strictly_newer_item_is_reported() {
    // Scenario: [A@t1, B@t2] -> [A@t1, B@t2, C@t3].
    let previous = snapshot(vec![
        item("a", "2024-01-01T00:00:00Z"),
        item("b", "2024-01-02T00:00:00Z"),
    ]);
    let current = snapshot(vec![
        item("a", "2024-01-01T00:00:00Z"),
        item("b", "2024-01-02T00:00:00Z"),
        item("c", "2024-01-03T00:00:00Z"),
    ]);
    let fresh = new_items(Some(&previous), &current);
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].track.name, "c");
}

#[test]
fn item_tied_with_newest_previous_timestamp_is_not_reported() {
    // D shares the exact timestamp of the newest previously-seen item and
    // is therefore excluded by the strict comparison.
    let previous = snapshot(vec![
        item("a", "2024-01-01T00:00:00Z"),
        item("b", "2024-01-02T00:00:00Z"),
    ]);
    let current = snapshot(vec![
        item("a", "2024-01-01T00:00:00Z"),
        item("b", "2024-01-02T00:00:00Z"),
        item("d", "2024-01-02T00:00:00Z"),
    ]);
    assert!(new_items(Some(&previous), &current).is_empty());
}

#[test]
fn all_newer_items_pass_through_in_current_order() {
    let previous = snapshot(vec![item("old", "2024-01-01T00:00:00Z")]);
    let current = snapshot(vec![
        item("z", "2024-02-03T00:00:00Z"),
        item("m", "2024-02-01T00:00:00Z"),
        item("a", "2024-02-02T00:00:00Z"),
    ]);
    let fresh = new_items(Some(&previous), &current);
    let names: Vec<&str> = fresh.iter().map(|it| it.track.name.as_str()).collect();
    // Same relative order as `current`, not sorted by timestamp.
    assert_eq!(names, vec!["z", "m", "a"]);
}

#[test]
fn interleaved_old_items_are_skipped() {
    let previous = snapshot(vec![item("b", "2024-01-02T00:00:00Z")]);
    let current = snapshot(vec![
        item("new1", "2024-01-03T00:00:00Z"),
        item("b", "2024-01-02T00:00:00Z"),
        item("new2", "2024-01-04T00:00:00Z"),
    ]);
    let names: Vec<String> = new_items(Some(&previous), &current)
        .into_iter()
        .map(|it| it.track.name)
        .collect();
    assert_eq!(names, vec!["new1".to_string(), "new2".to_string()]);
}

#[test]
fn emptied_previous_snapshot_reports_everything() {
    // A previously-seen playlist whose item list went empty has no newest
    // timestamp; everything currently present counts as new.
    let previous = snapshot(Vec::new());
    let current = snapshot(vec![
        item("a", "2024-01-01T00:00:00Z"),
        item("b", "2024-01-02T00:00:00Z"),
    ]);
    assert_eq!(new_items(Some(&previous), &current).len(), 2);
}
