use super::Dispatcher;
use crate::models::{MailConfig, PlaylistItem, Snapshot};
use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::info;

/// A digest captured by the mock instead of being delivered.
#[derive(Debug, Clone)]
pub struct SentDigest {
    pub recipients: Vec<String>,
    pub playlist_name: String,
    pub item_names: Vec<String>,
}

/// Records digests instead of sending them; can be told to fail to
/// simulate an unreachable mail relay.
#[derive(Default)]
pub struct MockDispatcher {
    sent: Mutex<Vec<SentDigest>>,
    fail: AtomicBool,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentDigest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Dispatcher for MockDispatcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_digest(
        &self,
        _mail: &MailConfig,
        recipients: &[String],
        playlist: &Snapshot,
        new_items: &[PlaylistItem],
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("mock mail transport unavailable"));
        }
        info!(
            "MockDispatcher: digest for {} with {} item(s)",
            playlist.name,
            new_items.len()
        );
        self.sent.lock().unwrap().push(SentDigest {
            recipients: recipients.to_vec(),
            playlist_name: playlist.name.clone(),
            item_names: new_items.iter().map(|it| it.track.name.clone()).collect(),
        });
        Ok(())
    }
}
