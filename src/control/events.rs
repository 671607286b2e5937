/*!
 * Control Event Lane
 * Bounded lock-free ring plus callback fan-out for control events
 */

use crate::control::types::ControlEvent;
use crate::core::limits::EVENT_RING_SIZE;
use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type EventCallback = Arc<dyn Fn(&ControlEvent) + Send + Sync>;

/// Lane statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneStats {
    pub published: u64,
    pub consumed: u64,
    pub dropped: u64,
}

/// Single-producer-friendly event lane; callbacks run outside any lock
pub struct EventLane {
    ring: Arc<ArrayQueue<ControlEvent>>,
    published: AtomicU64,
    consumed: AtomicU64,
    dropped: AtomicU64,
    callbacks: Mutex<Vec<EventCallback>>,
}

impl EventLane {
    pub fn new() -> Self {
        Self {
            ring: Arc::new(ArrayQueue::new(EVENT_RING_SIZE)),
            published: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Publish to the ring and fan out to callbacks
    pub fn publish(&self, event: ControlEvent) {
        let callbacks = self.callbacks.lock().clone();
        for cb in &callbacks {
            cb(&event);
        }
        match self.ring.push(event) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                // Ring full; pull-side consumers are lagging
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Pop the oldest undelivered event, if any
    pub fn try_consume(&self) -> Option<ControlEvent> {
        self.ring.pop().map(|event| {
            self.consumed.fetch_add(1, Ordering::Relaxed);
            event
        })
    }

    /// Register a push-mode subscriber; append-only, never reordered
    pub fn subscribe(&self, cb: impl Fn(&ControlEvent) + Send + Sync + 'static) {
        self.callbacks.lock().push(Arc::new(cb));
    }

    pub fn stats(&self) -> LaneStats {
        LaneStats {
            published: self.published.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventLane {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::types::{ControlAction, ControlEvent};
    use std::sync::atomic::AtomicUsize;

    fn action(pid: u32) -> ControlEvent {
        ControlEvent::ProcessAction {
            action: ControlAction::SetNice,
            pid,
            success: true,
        }
    }

    #[test]
    fn test_publish_consume_counts() {
        let lane = EventLane::new();
        lane.publish(action(1));
        lane.publish(action(2));

        assert!(lane.try_consume().is_some());
        let stats = lane.stats();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.consumed, 1);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_callbacks_fire_in_registration_order() {
        let lane = EventLane::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let first = Arc::clone(&hits);
        lane.subscribe(move |_| {
            first.fetch_add(1, Ordering::SeqCst);
        });
        let second = Arc::clone(&hits);
        lane.subscribe(move |_| {
            second.fetch_add(10, Ordering::SeqCst);
        });

        lane.publish(action(7));
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_full_ring_drops() {
        let lane = EventLane::new();
        for i in 0..(EVENT_RING_SIZE as u32 + 5) {
            lane.publish(action(i));
        }
        let stats = lane.stats();
        assert_eq!(stats.published, EVENT_RING_SIZE as u64);
        assert_eq!(stats.dropped, 5);
    }
}
