//! Outbound notifications.
//!
//! Services hand a [`Notification`] to the [`NotificationDispatcher`] after
//! their database transaction commits. Delivery happens on a background
//! worker, so a slow or failing sink never holds up a request.

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::{AccessRequestStatus, InquiryStatus, ListingStatus, Phase};

pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;
const BASE_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Webhook answered with status {0}")]
    Status(u16),
    #[error("Circuit breaker open")]
    CircuitOpen,
}

/// A domain event addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    InquiryReceived {
        recipient: Uuid,
        listing_id: Uuid,
        inquiry_id: Uuid,
    },
    InquiryResponded {
        recipient: Uuid,
        inquiry_id: Uuid,
        status: InquiryStatus,
    },
    AccessRequested {
        recipient: Uuid,
        listing_id: Uuid,
        request_id: Uuid,
    },
    AccessReviewed {
        recipient: Uuid,
        request_id: Uuid,
        status: AccessRequestStatus,
    },
    ListingReviewed {
        recipient: Uuid,
        listing_id: Uuid,
        status: ListingStatus,
    },
    TransactionCreated {
        recipient: Uuid,
        transaction_id: Uuid,
    },
    PhaseAdvanced {
        recipient: Uuid,
        transaction_id: Uuid,
        phase: Phase,
    },
}

impl Notification {
    pub fn recipient(&self) -> Uuid {
        match self {
            Notification::InquiryReceived { recipient, .. }
            | Notification::InquiryResponded { recipient, .. }
            | Notification::AccessRequested { recipient, .. }
            | Notification::AccessReviewed { recipient, .. }
            | Notification::ListingReviewed { recipient, .. }
            | Notification::TransactionCreated { recipient, .. }
            | Notification::PhaseAdvanced { recipient, .. } => *recipient,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notification.recipient(),
            notification = ?notification,
            "Notification"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a fixed URL.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self::with_circuit_breaker(url, 5, 30)
    }

    pub fn with_circuit_breaker(
        url: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            client,
            url,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let client = self.client.clone();
        let url = self.url.clone();
        let body = notification.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).json(&body).send().await?;
                if !response.status().is_success() {
                    return Err(NotifyError::Status(response.status().as_u16()));
                }
                Ok(())
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(FailsafeError::Rejected) => Err(NotifyError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

/// Cheap, cloneable handle to the delivery queue.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    /// Starts the delivery worker and returns the handle services enqueue on.
    /// The worker stops once every handle has been dropped.
    pub fn spawn(notifier: Arc<dyn Notifier>, queue_size: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(queue_size.max(1));
        let worker = tokio::spawn(run_worker(notifier, receiver, BASE_RETRY_DELAY));
        (Self { sender }, worker)
    }

    /// Enqueues without waiting. A full or closed queue drops the
    /// notification with a warning.
    pub fn dispatch(&self, notification: Notification) {
        if let Err(err) = self.sender.try_send(notification) {
            let (reason, notification) = match err {
                mpsc::error::TrySendError::Full(n) => ("queue full", n),
                mpsc::error::TrySendError::Closed(n) => ("queue closed", n),
            };
            tracing::warn!(
                reason,
                recipient = %notification.recipient(),
                "Dropping notification"
            );
        }
    }
}

async fn run_worker(
    notifier: Arc<dyn Notifier>,
    mut receiver: mpsc::Receiver<Notification>,
    base_delay: Duration,
) {
    while let Some(notification) = receiver.recv().await {
        deliver_with_retry(notifier.as_ref(), &notification, base_delay).await;
    }
    tracing::debug!("Notification worker stopped");
}

/// Tries up to [`MAX_DELIVERY_ATTEMPTS`] times, doubling the delay between
/// attempts. Returns whether delivery succeeded.
async fn deliver_with_retry(
    notifier: &dyn Notifier,
    notification: &Notification,
    base_delay: Duration,
) -> bool {
    for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
        match notifier.deliver(notification).await {
            Ok(()) => return true,
            Err(err) if attempt < MAX_DELIVERY_ATTEMPTS => {
                tracing::warn!(attempt, error = %err, "Notification delivery failed, retrying");
                tokio::time::sleep(base_delay * 2u32.pow(attempt - 1)).await;
            }
            Err(err) => {
                tracing::error!(
                    attempts = attempt,
                    error = %err,
                    recipient = %notification.recipient(),
                    "Giving up on notification"
                );
            }
        }
    }
    false
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    /// Records deliveries and fails the first `fail_first` attempts.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub delivered: Mutex<Vec<Notification>>,
        pub attempts: AtomicU32,
        pub fail_first: u32,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.fail_first {
                return Err(NotifyError::Status(503));
            }
            self.delivered.lock().await.push(notification.clone());
            Ok(())
        }
    }

    fn sample() -> Notification {
        Notification::InquiryReceived {
            recipient: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            inquiry_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn serializes_with_event_tag() {
        let recipient = Uuid::new_v4();
        let json = serde_json::to_value(Notification::ListingReviewed {
            recipient,
            listing_id: Uuid::nil(),
            status: ListingStatus::Active,
        })
        .unwrap();
        assert_eq!(json["event"], "listing_reviewed");
        assert_eq!(json["status"], "active");
        assert_eq!(json["recipient"], recipient.to_string());
    }

    #[tokio::test]
    async fn retries_until_success() {
        let notifier = RecordingNotifier {
            fail_first: 2,
            ..Default::default()
        };
        let delivered = deliver_with_retry(&notifier, &sample(), Duration::from_millis(1)).await;

        assert!(delivered);
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(notifier.delivered.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let notifier = RecordingNotifier {
            fail_first: 10,
            ..Default::default()
        };
        let delivered = deliver_with_retry(&notifier, &sample(), Duration::from_millis(1)).await;

        assert!(!delivered);
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), MAX_DELIVERY_ATTEMPTS);
    }

    #[tokio::test]
    async fn dispatcher_delivers_in_background() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (dispatcher, worker) = NotificationDispatcher::spawn(notifier.clone(), 8);

        let first = sample();
        dispatcher.dispatch(first.clone());
        dispatcher.dispatch(sample());
        drop(dispatcher);
        worker.await.unwrap();

        let delivered = notifier.delivered.lock().await;
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0], first);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (sender, mut receiver) = mpsc::channel(1);
        let dispatcher = NotificationDispatcher { sender };

        dispatcher.dispatch(sample());
        dispatcher.dispatch(sample());

        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn webhook_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hooks")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "event": "inquiry_received"
            })))
            .with_status(204)
            .create_async()
            .await;

        let notifier = WebhookNotifier::new(format!("{}/hooks", server.url()));
        notifier.deliver(&sample()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn webhook_error_status_opens_circuit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hooks")
            .with_status(500)
            .expect_at_least(2)
            .create_async()
            .await;

        let notifier =
            WebhookNotifier::with_circuit_breaker(format!("{}/hooks", server.url()), 2, 60);
        assert!(matches!(notifier.deliver(&sample()).await, Err(NotifyError::Status(500))));
        assert!(matches!(notifier.deliver(&sample()).await, Err(NotifyError::Status(500))));
        assert_eq!(notifier.circuit_state(), "open");
        assert!(matches!(notifier.deliver(&sample()).await, Err(NotifyError::CircuitOpen)));
    }
}
