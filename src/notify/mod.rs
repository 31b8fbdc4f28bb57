pub mod smtp;
pub mod mock;

use crate::models::{MailConfig, PlaylistItem, Snapshot};
use anyhow::Result;

/// Dispatcher trait: render and deliver one digest message.
/// Implementations: smtp::SmtpDispatcher and mock::MockDispatcher.
#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync {
    /// Deliver one digest covering `new_items` to every recipient as a
    /// single message. Callers never invoke this with an empty item list.
    /// The send succeeds or fails as one unit; partial delivery is not
    /// distinguished.
    async fn send_digest(
        &self,
        mail: &MailConfig,
        recipients: &[String],
        playlist: &Snapshot,
        new_items: &[PlaylistItem],
    ) -> Result<()>;

    /// Return the dispatcher's name (for logging)
    fn name(&self) -> &str;
}

/// Subject line for a digest, shared by every dispatcher.
pub fn digest_subject(playlist: &Snapshot) -> String {
    format!("Update to the playlist \"{}\"", playlist.name)
}
