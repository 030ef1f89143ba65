use tokio::sync::broadcast;

use crate::application::dto::background_dto::SelectedBackgroundUpdate;
use crate::application::services::background_service::BackgroundUpdateSink;
use crate::infrastructure::logging::logger;

/// Fans selected-background updates out to every subscriber
pub struct BroadcastUpdateSink {
    sender: broadcast::Sender<SelectedBackgroundUpdate>,
}

impl BroadcastUpdateSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SelectedBackgroundUpdate> {
        self.sender.subscribe()
    }
}

impl BackgroundUpdateSink for BroadcastUpdateSink {
    fn send_update(&self, update: SelectedBackgroundUpdate) {
        if self.sender.send(update).is_err() {
            logger::debug("No subscribers for background update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_updates_in_order() {
        let sink = BroadcastUpdateSink::new(8);
        let mut receiver = sink.subscribe();

        sink.send_update(SelectedBackgroundUpdate {
            for_dark_theme: false,
            background: None,
        });
        sink.send_update(SelectedBackgroundUpdate {
            for_dark_theme: true,
            background: None,
        });

        assert!(!receiver.recv().await.unwrap().for_dark_theme);
        assert!(receiver.recv().await.unwrap().for_dark_theme);
    }

    #[test]
    fn sending_without_subscribers_is_ignored() {
        let sink = BroadcastUpdateSink::new(0);
        sink.send_update(SelectedBackgroundUpdate {
            for_dark_theme: false,
            background: None,
        });
    }
}
