use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

pub const DEFAULT_ALERT_QUEUE: usize = 64;
pub const MAX_ALERT_QUEUE: usize = 4096;

/// Out-of-band text the remote wants shown to the user,
/// e.g. `* OK [ALERT] Mailbox is at 95% of quota`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub message: String,
}

/// Registration point for alert subscribers.
///
/// The queue is a broadcast channel: every subscriber sees alerts in
/// the order the transport pushed them, and an alert pushed while
/// nobody listens is gone.
pub struct AlertChannel {
    tx: broadcast::Sender<Alert>,
}

impl AlertChannel {
    /// `capacity` is clamped to `1..=MAX_ALERT_QUEUE`.
    pub fn new(capacity: usize) -> Self {
        let clamped = capacity.clamp(1, MAX_ALERT_QUEUE);
        if clamped != capacity {
            tracing::warn!(requested = capacity, used = clamped, "alert queue size out of range");
        }
        let (tx, _) = broadcast::channel(clamped);
        Self { tx }
    }

    /// Handle given to the transport so it can push alerts.
    pub fn sender(&self) -> AlertSender {
        AlertSender {
            tx: self.tx.clone(),
        }
    }

    pub fn subscribe(&self) -> Alerts {
        Alerts {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AlertChannel {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_QUEUE)
    }
}

#[derive(Clone)]
pub struct AlertSender {
    tx: broadcast::Sender<Alert>,
}

impl AlertSender {
    /// Never blocks and never fails.
    pub fn push(&self, message: impl Into<String>) {
        let alert = Alert {
            message: message.into(),
        };
        match self.tx.send(alert) {
            Ok(receivers) => tracing::debug!(receivers, "alert.dispatched"),
            Err(broadcast::error::SendError(alert)) => {
                tracing::debug!(alert=%alert.message, "alert.dropped, no subscriber")
            }
        }
    }
}

/// One subscription to the alert channel.
pub struct Alerts {
    rx: broadcast::Receiver<Alert>,
}

impl Alerts {
    /// Next alert, or `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<Alert> {
        loop {
            match self.rx.recv().await {
                Ok(alert) => return Some(alert),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "alert subscriber too slow, oldest alerts lost")
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next alert if one is already queued.
    pub fn try_recv(&mut self) -> Option<Alert> {
        loop {
            match self.rx.try_recv() {
                Ok(alert) => return Some(alert),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "alert subscriber too slow, oldest alerts lost")
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
