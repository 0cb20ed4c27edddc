// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcast event bus for engine notifications.
//!
//! Publishing never blocks: slow subscribers lag and lose the oldest events,
//! and publishing without subscribers is a no-op.

use convoy_core::{EngineEvent, EventSink};
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

pub struct BroadcastSink {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            trace!("event dropped: no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_core::ConversationId;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        sink.publish(EngineEvent::ConversationUpdated {
            conversation_id: ConversationId(3),
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            EngineEvent::ConversationUpdated {
                conversation_id: ConversationId(3)
            }
        );
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let sink = BroadcastSink::default();
        assert_eq!(sink.subscriber_count(), 0);
        sink.publish(EngineEvent::ConversationUpdated {
            conversation_id: ConversationId(1),
        });
    }
}
