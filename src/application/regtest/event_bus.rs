use tokio::sync::broadcast;

use crate::application::collaborators::EventBus;
use crate::application::collaborators::EventBusError;
use crate::application::collaborators::MinedBlockEvent;

/// Broadcasts mined-block events to every subscriber.
///
/// Publishing while nobody subscribes is an error, which makes a node
/// without listeners visible to the miner that found the block.
#[derive(Debug)]
pub struct RegtestEventBus {
    tx: broadcast::Sender<MinedBlockEvent>,
}

impl RegtestEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MinedBlockEvent> {
        self.tx.subscribe()
    }
}

impl Default for RegtestEventBus {
    fn default() -> Self {
        Self::new(16)
    }
}

impl EventBus for RegtestEventBus {
    fn publish(&self, event: MinedBlockEvent) -> Result<(), EventBusError> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| EventBusError::NoSubscribers)
    }
}
