use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Messages broadcast to every connected foreground page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    PriceUpdate {
        data: serde_json::Value,
    },
    PortfolioSyncComplete {
        success: bool,
    },
    NotificationClick {
        action: String,
        payload: serde_json::Value,
    },
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Returns how many pages received it; zero listeners is fine.
    pub fn send(&self, notification: Notification) -> usize {
        match self.tx.send(notification) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(notification)) => {
                debug!(?notification, "No pages listening");
                0
            }
        }
    }

    pub fn notification_click(&self, action: &str, payload: serde_json::Value) -> usize {
        self.send(Notification::NotificationClick {
            action: action.to_string(),
            payload,
        })
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}
