//! Side-channel notifications emitted by the request client.
//!
//! The client holds an `Arc<dyn ClientNotifier>` supplied at construction.
//! Rate-limit advisories and session expiry are reported here in addition to
//! the error returned from the failing call.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// Advisory raised on HTTP 429.
///
/// Purely informational: the failing call has already returned an error and
/// nothing is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitAdvisory {
    /// Wait advertised by the server (or the default fallback).
    pub retry_after: Duration,
    /// Endpoint that was rate limited.
    pub endpoint: String,
    /// Server-assigned correlation id, when present.
    pub request_id: Option<String>,
    /// When the advisory was raised.
    pub issued_at: Instant,
}

impl RateLimitAdvisory {
    /// Creates an advisory issued now.
    pub fn new(retry_after_secs: u64, endpoint: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            retry_after: Duration::from_secs(retry_after_secs),
            endpoint: endpoint.into(),
            request_id,
            issued_at: Instant::now(),
        }
    }

    /// Time left on the countdown; zero once it has elapsed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.retry_after.saturating_sub(self.issued_at.elapsed())
    }

    /// Whether the advertised wait has fully elapsed.
    #[must_use]
    pub fn is_elapsed(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Events delivered through [`ChannelNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A request was rejected with HTTP 429.
    RateLimited(RateLimitAdvisory),
    /// A held credential was rejected and cleared.
    SessionExpired,
}

/// Receiver of request client side-channel events.
pub trait ClientNotifier: Send + Sync + std::fmt::Debug {
    /// Called once per 429 response.
    fn rate_limited(&self, advisory: RateLimitAdvisory);

    /// Called once per cleared credential.
    fn session_expired(&self);
}

/// Notifier that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ClientNotifier for NoopNotifier {
    fn rate_limited(&self, _advisory: RateLimitAdvisory) {}

    fn session_expired(&self) {}
}

/// Notifier forwarding events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver its events are delivered to.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ClientEvent) {
        if self.tx.send(event).is_err() {
            debug!("client event receiver dropped");
        }
    }
}

impl ClientNotifier for ChannelNotifier {
    fn rate_limited(&self, advisory: RateLimitAdvisory) {
        self.send(ClientEvent::RateLimited(advisory));
    }

    fn session_expired(&self) {
        self.send(ClientEvent::SessionExpired);
    }
}
