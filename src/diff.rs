use crate::models::{PlaylistItem, Snapshot};

/// Compute which items of `current` are new relative to `previous`.
///
/// The first-ever poll (`previous` is None) establishes a baseline and
/// reports nothing. Afterwards an item counts as new when its `added_at` is
/// strictly greater than the newest `added_at` seen in `previous`; items
/// sharing that exact timestamp are NOT reported, matching the long-standing
/// behavior of this daemon. Returned items keep their order in `current`.
pub fn new_items(previous: Option<&Snapshot>, current: &Snapshot) -> Vec<PlaylistItem> {
    let previous = match previous {
        Some(p) => p,
        None => return Vec::new(),
    };

    // A previously-seen but now empty item list has no newest timestamp;
    // everything currently present counts as new.
    let threshold = match previous.latest_added_at() {
        Some(t) => t,
        None => return current.items.clone(),
    };

    current
        .items
        .iter()
        .filter(|it| it.added_at > threshold)
        .cloned()
        .collect()
}
