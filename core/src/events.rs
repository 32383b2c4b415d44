//! Out-of-band session notifications
//!
//! Fire-and-forget signals other parts of the host can listen for. Backed by
//! a tokio broadcast channel: a receiver that falls behind loses messages,
//! and publishing with no subscribers is not an error.

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HudEvent {
    /// The session's processing flag toggled
    ProcessingChanged(bool),
    /// Host asks the session to warm up its AI providers
    PrewarmRequested,
    /// Host should close the HUD overlay
    CloseRequested,
    /// Host should navigate to the given path
    Navigate(String),
    /// Startup restored a previous session instead of booting
    SessionRestored { lines: usize },
    /// Boot sequence finished; session accepts input
    BootCompleted,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HudEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: HudEvent) {
        // Err only means nobody is listening right now
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HudEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(HudEvent::ProcessingChanged(true));
        bus.publish(HudEvent::Navigate("/vault".to_string()));

        assert_eq!(rx.recv().await.unwrap(), HudEvent::ProcessingChanged(true));
        assert_eq!(rx.recv().await.unwrap(), HudEvent::Navigate("/vault".to_string()));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(HudEvent::CloseRequested);
    }
}
