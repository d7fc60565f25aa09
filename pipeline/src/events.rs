//! Pipeline-wide event bus. Generalizes the publisher/subscriber pattern
//! used for audio nodes elsewhere in this workspace from a single async
//! event type to the fixed set of events this pipeline's stages raise,
//! delivered over blocking `std::sync::mpsc` channels since every stage
//! here runs on its own OS thread rather than as a tokio task.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    SrcNewEs { es_id: u32 },
    SrcDecodeEs { es_id: u32, bytes: usize },
    SrcEndEs { es_id: u32 },
    PlayerChange { media_id: String },
    PlayerPosition { position_ms: u64 },
    PlayerVolume { level: u8 },
    SinkEncodeStart,
    SinkEncodeEnd,
}

struct Listener {
    tx: Sender<PipelineEvent>,
    #[allow(dead_code)]
    name: String,
}

/// Fan-out publisher: every subscriber gets its own channel and its own
/// copy of each event. Subscribers are held in an insertion-ordered map
/// keyed by an incrementing id, so a specific one can be torn down by id
/// (e.g. a source rebuilt on `Change`) instead of relying on the
/// receiver being dropped; a dead channel is still pruned lazily on the
/// next publish as a fallback.
pub struct EventBus {
    subscribers: Mutex<BTreeMap<u64, Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe under a display name (used only for diagnostics) and
    /// get back the id to pass to [`EventBus::unsubscribe`].
    pub fn subscribe_named(&self, name: impl Into<String>) -> (u64, Receiver<PipelineEvent>) {
        let (tx, rx) = channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().unwrap().insert(
            id,
            Listener {
                tx,
                name: name.into(),
            },
        );
        (id, rx)
    }

    pub fn subscribe(&self) -> (u64, Receiver<PipelineEvent>) {
        self.subscribe_named("")
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().unwrap().remove(&id);
    }

    pub fn publish(&self, event: PipelineEvent) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|_, listener| listener.tx.send(event.clone()).is_ok());
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

    #[test]
    fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let (_id, rx) = bus.subscribe();
        bus.publish(PipelineEvent::SrcNewEs { es_id: 1 });
        match rx.recv().unwrap() {
            PipelineEvent::SrcNewEs { es_id } => assert_eq!(es_id, 1),
            _ => panic!("wrong event"),
        }
    }

    #[test]
    fn dropped_subscriber_is_pruned_on_next_publish() {
        let bus = EventBus::new();
        {
            let _rx = bus.subscribe();
        }
        bus.publish(PipelineEvent::SinkEncodeStart);
        assert_eq!(bus.subscribers.lock().unwrap().len(), 0);
    }

    #[test]
    fn unsubscribe_by_id_stops_delivery_to_that_listener() {
        let bus = EventBus::new();
        let (id_a, rx_a) = bus.subscribe_named("a");
        let (_id_b, rx_b) = bus.subscribe_named("b");

        bus.unsubscribe(id_a);
        bus.publish(PipelineEvent::SinkEncodeStart);

        assert!(rx_a.recv().is_err());
        assert!(matches!(rx_b.recv().unwrap(), PipelineEvent::SinkEncodeStart));
    }

    #[test]
    fn ids_are_assigned_in_insertion_order() {
        let bus = EventBus::new();
        let (id_a, _rx_a) = bus.subscribe();
        let (id_b, _rx_b) = bus.subscribe();
        assert!(id_b > id_a);
    }
}
