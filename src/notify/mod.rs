//! Outbound notification queue.
//!
//! Lifecycle flows enqueue a job on an in-process channel and move on; a
//! background task drains the channel and hands each job to a
//! `NotificationSender`. The sender decides how to deliver (SMTP, API, etc.)
//! and returns `Ok`/`Err`. Delivery is best-effort: failures are retried
//! with exponential backoff and jitter up to a max attempt threshold, then
//! logged and dropped. Callers never observe the outcome.
//!
//! The default sender for local dev is `LogSender`, which logs and returns
//! `Ok(())`.

use anyhow::Result;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Verify,
    Reset,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Reset => "reset",
        }
    }
}

/// One outbound message: what to send, to whom, and which lifecycle token
/// the recipient can redeem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub token: Uuid,
}

impl Notification {
    #[must_use]
    pub fn verify(recipient: &str, token: Uuid) -> Self {
        Self {
            kind: NotificationKind::Verify,
            recipient: recipient.to_string(),
            token,
        }
    }

    #[must_use]
    pub fn reset(recipient: &str, token: Uuid) -> Self {
        Self {
            kind: NotificationKind::Reset,
            recipient: recipient.to_string(),
            token,
        }
    }
}

/// Delivery abstraction used by the worker.
pub trait NotificationSender: Send + Sync {
    /// Deliver a message or return an error to trigger a retry.
    fn send(&self, message: &Notification) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogSender;

impl NotificationSender for LogSender {
    fn send(&self, message: &Notification) -> Result<()> {
        info!(
            kind = message.kind.as_str(),
            recipient = %message.recipient,
            token = %message.token,
            "notification send stub"
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WorkerConfig {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl WorkerConfig {
    /// Default worker config: 5 max attempts, 5s->5m exponential backoff
    /// with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    #[must_use]
    pub fn with_backoff_max(mut self, backoff_max: Duration) -> Self {
        self.backoff_max = backoff_max;
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let max_attempts = self.max_attempts.max(1);
        let backoff_base = if self.backoff_base.is_zero() {
            Duration::from_millis(1)
        } else {
            self.backoff_base
        };
        let backoff_max = if self.backoff_max < backoff_base {
            backoff_base
        } else {
            self.backoff_max
        };
        Self {
            max_attempts,
            backoff_base,
            backoff_max,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Write end of the queue, handed to the lifecycle service.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Fire-and-forget: never blocks, never fails the caller.
    pub fn enqueue(&self, message: Notification) {
        if self.tx.send(message).is_err() {
            error!("notification worker is gone, dropping message");
        }
    }
}

/// Spawn the worker task; it runs until every `Notifier` clone is dropped.
#[must_use]
pub fn spawn(sender: Arc<dyn NotificationSender>, config: WorkerConfig) -> (Notifier, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = config.normalize();

    let handle = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            deliver(sender.as_ref(), &message, config).await;
        }
    });

    (Notifier { tx }, handle)
}

async fn deliver(sender: &dyn NotificationSender, message: &Notification, config: WorkerConfig) {
    let mut backoff = config.backoff_base;

    for attempt in 1..=config.max_attempts {
        match sender.send(message) {
            Ok(()) => {
                info!(
                    kind = message.kind.as_str(),
                    recipient = %message.recipient,
                    attempt,
                    "notification delivered"
                );
                return;
            }
            Err(err) => {
                if attempt == config.max_attempts {
                    error!(
                        kind = message.kind.as_str(),
                        recipient = %message.recipient,
                        attempt,
                        "giving up on notification: {err}"
                    );
                    return;
                }

                warn!(
                    kind = message.kind.as_str(),
                    recipient = %message.recipient,
                    attempt,
                    "notification delivery failed, retrying: {err}"
                );

                let half = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX) / 2;
                let jitter = rand::thread_rng().gen_range(0..=half.max(1));
                sleep(backoff + Duration::from_millis(jitter)).await;
                backoff = backoff.saturating_mul(2).min(config.backoff_max);
            }
        }
    }
}
