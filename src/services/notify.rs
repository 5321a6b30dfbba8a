// src/services/notify.rs

//! Notification sinks.
//!
//! Rendering and delivering a message to a chat belongs to the transport
//! layer; the engine only hands it structured `Notification` events.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::models::Notification;

/// Receives one event per detected change.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes every event to the log as a JSON line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let json = serde_json::to_string(notification)?;
        log::info!("notification {}", json);
        Ok(())
    }
}

/// Forwards events over a channel to whatever delivers them.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::UnboundedSender<Notification>) -> Self {
        Self { sender }
    }

    /// Create a notifier and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.sender
            .send(notification.clone())
            .map_err(|_| AppError::notify("notification receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatRef;

    fn sample() -> Notification {
        Notification {
            chat: ChatRef::Numeric(1),
            listing_id: "42".into(),
            title: "Bike".into(),
            price: 80.0,
            previous_price: Some(100.0),
            link: "http://p.example.com/i/42".into(),
            is_price_drop: true,
        }
    }

    #[tokio::test]
    async fn test_channel_delivers() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        notifier.notify(&sample()).await.unwrap();

        assert_eq!(rx.recv().await, Some(sample()));
    }

    #[tokio::test]
    async fn test_channel_closed_is_error() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);

        let err = notifier.notify(&sample()).await.unwrap_err();
        assert!(matches!(err, AppError::Notify(_)));
    }

    #[tokio::test]
    async fn test_log_notifier() {
        assert!(LogNotifier.notify(&sample()).await.is_ok());
    }
}
