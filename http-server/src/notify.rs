use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound message sender. Fire-and-forget with respect to ledger
/// correctness: delivery failures are logged, never propagated back into a
/// mutation path.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: u64, text: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub user_id: u64,
    pub text: String,
}

/// Handle used by handlers and the reconciler to queue a message for the
/// delivery worker without waiting on it.
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<NotificationJob>,
}

impl NotificationSender {
    pub fn enqueue(&self, user_id: u64, text: String) {
        if self.tx.send(NotificationJob { user_id, text }).is_err() {
            tracing::warn!("Notification worker is gone; dropping message for user {}", user_id);
        }
    }
}

pub fn notification_channel() -> (NotificationSender, mpsc::UnboundedReceiver<NotificationJob>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NotificationSender { tx }, rx)
}

/// Drains the notification queue onto the notifier, decoupling delivery
/// latency from the ledger mutation paths that enqueue.
pub fn spawn_notification_worker(
    notifier: Arc<dyn Notifier>,
    mut rx: mpsc::UnboundedReceiver<NotificationJob>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            if let Err(err) = notifier.send(job.user_id, &job.text).await {
                tracing::warn!("Failed to notify user {}: {}", job.user_id, err);
            }
        }
    })
}

/// Posts messages to the configured notification endpoint.
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client configuration is valid");
        HttpNotifier { client, url }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, user_id: u64, text: &str) -> Result<(), NotifyError> {
        self.client
            .post(&self.url)
            .json(&json!({ "user_id": user_id, "text": text }))
            .send()
            .await
            .map_err(|err| NotifyError(err.to_string()))?
            .error_for_status()
            .map_err(|err| NotifyError(err.to_string()))?;
        Ok(())
    }
}

/// Fallback when no notification endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, user_id: u64, text: &str) -> Result<(), NotifyError> {
        tracing::info!("Notification for user {}: {}", user_id, text);
        Ok(())
    }
}
