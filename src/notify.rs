use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Fan-out of row writes to notification/audit observers, one channel per division.
#[derive(Default)]
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to writes in a division. Creates the channel if needed.
    pub fn subscribe(&self, division: &str) -> broadcast::Receiver<Event> {
        self.channels
            .entry(division.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Fire-and-forget. No-op if nobody is listening.
    pub fn send(&self, event: &Event) {
        if let Some(sender) = self.channels.get(event.division()) {
            let _ = sender.send(event.clone());
        }
    }
}
