//! In-process event bus.

use stowage_core::StowageEvent;
use tokio::sync::broadcast;

/// Sink for events produced by the ledger.
pub trait EventPublisher: Send + Sync {
    /// Publish one event. Must not block.
    fn publish(&self, event: StowageEvent);
}

/// Broadcast channel carrying every [`StowageEvent`].
///
/// Subscribers that fall behind lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StowageEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StowageEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: StowageEvent) {
        match &event {
            StowageEvent::File(file) => {
                tracing::debug!(checksum = %file.checksum, state = %file.state, "Publishing file event")
            }
            StowageEvent::Group(group) => {
                tracing::debug!(group_id = %group.group_id, status = %group.status, "Publishing group event")
            }
        }
        if self.sender.send(event).is_err() {
            tracing::trace!("No subscriber for event");
        }
    }
}
