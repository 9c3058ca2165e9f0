//! Change-notification dispatch.

use std::sync::{Arc, Mutex, Weak};

use chart_core::SeriesEvent;

use crate::sync;

/// Receiver of series change notifications.
///
/// Implementations must ignore events whose `source` is themselves, so
/// that republishing a `Computed` notification cannot self-trigger.
pub trait SeriesListener: Send + Sync {
    fn on_series_event(&self, event: &SeriesEvent);
}

/// Fan-out of series events to weakly held listeners.
///
/// Listeners are dispatched synchronously in subscription order. The
/// subscription graph is acyclic — an indicator subscribes only to its
/// input series — so a cascade always terminates. Dead listeners are
/// pruned on publish.
#[derive(Default)]
pub struct EventHub {
    listeners: Mutex<Vec<Weak<dyn SeriesListener>>>,
}

impl EventHub {
    /// Create a hub with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe(&self, listener: Weak<dyn SeriesListener>) {
        sync::lock(&self.listeners).push(listener);
    }

    /// Deliver `event` to every live listener.
    pub fn publish(&self, event: &SeriesEvent) {
        // Collect upgrades first so listener callbacks run outside the
        // registry lock and may themselves publish.
        let targets: Vec<Arc<dyn SeriesListener>> = {
            let mut listeners = sync::lock(&self.listeners);
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for target in targets {
            target.on_series_event(event);
        }
    }

    /// Number of currently live listeners.
    pub fn listener_count(&self) -> usize {
        let mut listeners = sync::lock(&self.listeners);
        listeners.retain(|l| l.strong_count() > 0);
        listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_core::{EventKind, SeriesId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        seen: AtomicUsize,
    }

    impl SeriesListener for Counter {
        fn on_series_event(&self, _event: &SeriesEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn event() -> SeriesEvent {
        SeriesEvent {
            source: SeriesId::new_v4(),
            kind: EventKind::Refreshed,
            from_time: 0,
            to_time: 0,
            pass: 1,
        }
    }

    #[test]
    fn test_publish_reaches_live_listeners() {
        let hub = EventHub::new();
        let listener = Arc::new(Counter {
            seen: AtomicUsize::new(0),
        });
        hub.subscribe(Arc::downgrade(&listener) as Weak<dyn SeriesListener>);

        hub.publish(&event());
        assert_eq!(listener.seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dead_listeners_are_pruned() {
        let hub = EventHub::new();
        {
            let listener = Arc::new(Counter {
                seen: AtomicUsize::new(0),
            });
            hub.subscribe(Arc::downgrade(&listener) as Weak<dyn SeriesListener>);
        }
        hub.publish(&event());
        assert_eq!(hub.listener_count(), 0);
    }
}
