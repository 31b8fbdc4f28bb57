use std::time::Duration;
use thiserror::Error;

/// Connectivity loss or timeout talking to the upstream provider. Sources
/// wrap their transport failures in this so the poller can pick the short
/// backoff without knowing which HTTP client produced the error.
#[derive(Debug, Error)]
#[error("network unreachable: {0}")]
pub struct NetworkError(pub String);

/// Upstream answered, but with something we cannot use: a non-success
/// status or a payload missing required fields.
#[derive(Debug, Error)]
#[error("provider error: {0}")]
pub struct ProviderError(pub String);

/// Delay before the next cycle after a connectivity failure.
pub const SHORT_BACKOFF: Duration = Duration::from_secs(60);
/// Delay before the next cycle after any other failure.
pub const LONG_BACKOFF: Duration = Duration::from_secs(600);

/// Closed classification of everything that can go wrong in a poll cycle.
/// The poller keys its backoff on this and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Could not reach the provider at all. Retry soon.
    Network,
    /// The store is missing data the notification path needs (mail config,
    /// subscribers) or a read against it failed. Handled per playlist: the
    /// notification is skipped and the cycle continues.
    ConfigData,
    /// Everything else: malformed payloads, store write failures, mail
    /// transport failures. Retry after the long delay.
    Unclassified,
}

impl FailureKind {
    pub fn backoff(&self) -> Duration {
        match self {
            FailureKind::Network => SHORT_BACKOFF,
            FailureKind::ConfigData => LONG_BACKOFF,
            FailureKind::Unclassified => LONG_BACKOFF,
        }
    }

    /// Walk the error chain and decide which recovery policy applies.
    pub fn classify(err: &anyhow::Error) -> FailureKind {
        for cause in err.chain() {
            if cause.downcast_ref::<NetworkError>().is_some() {
                return FailureKind::Network;
            }
            if let Some(re) = cause.downcast_ref::<reqwest::Error>() {
                if re.is_connect() || re.is_timeout() {
                    return FailureKind::Network;
                }
            }
        }
        FailureKind::Unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn network_marker_classifies_as_network() {
        let err = anyhow::Error::new(NetworkError("connection refused".into()));
        assert_eq!(FailureKind::classify(&err), FailureKind::Network);
    }

    #[test]
    fn network_marker_survives_added_context() {
        let err = anyhow::Error::new(NetworkError("timed out".into()))
            .context("fetching playlist abc for connection 1");
        assert_eq!(FailureKind::classify(&err), FailureKind::Network);
    }

    #[test]
    fn provider_and_plain_errors_are_unclassified() {
        let err = anyhow::Error::new(ProviderError("404 Not Found".into()));
        assert_eq!(FailureKind::classify(&err), FailureKind::Unclassified);
        let err = anyhow!("smtp handshake failed").context("sending digest");
        assert_eq!(FailureKind::classify(&err), FailureKind::Unclassified);
    }

    #[test]
    fn backoff_table() {
        assert_eq!(FailureKind::Network.backoff(), SHORT_BACKOFF);
        assert_eq!(FailureKind::ConfigData.backoff(), LONG_BACKOFF);
        assert_eq!(FailureKind::Unclassified.backoff(), LONG_BACKOFF);
        assert!(FailureKind::Network.backoff() < FailureKind::Unclassified.backoff());
    }
}
