//! Discrete trade signals with structural de-duplication.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock, Weak};

use chart_core::{EventKind, SeriesEvent, SeriesId};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::base::BaseSeries;
use crate::events::SeriesListener;
use crate::sync;

/// Kind of trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    EnterLong,
    ExitLong,
    EnterShort,
    ExitShort,
    Alert,
}

/// A signal attached to a timestamp.
///
/// Identity is structural over `(time, kind, id)`; `text` and `color`
/// are display attributes and do not participate in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub time: i64,
    pub kind: SignalKind,
    pub id: u32,
    pub text: Option<String>,
    pub color: Option<String>,
}

impl Signal {
    /// Create a signal with no display attributes.
    pub fn new(time: i64, kind: SignalKind, id: u32) -> Self {
        Self {
            time,
            kind,
            id,
            text: None,
            color: None,
        }
    }

    /// Attach a label.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach a display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Structural equality: same timestamp, kind and id.
    pub fn same_signal(&self, other: &Signal) -> bool {
        self.time == other.time && self.kind == other.kind && self.id == other.id
    }
}

/// Published to subscribers when a genuinely new signal appears.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    pub source: SeriesId,
    pub signal: Signal,
}

/// Receiver of new-signal notifications (e.g. an alerting surface).
/// There is no synchronous return path back into the engine.
pub trait SignalListener: Send + Sync {
    fn on_signal(&self, event: &SignalEvent);
}

/// Criteria for [`SignalIndicator::remove`]; unset fields match any
/// signal.
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub kind: Option<SignalKind>,
    pub id: Option<u32>,
    pub text: Option<String>,
    pub color: Option<String>,
}

impl SignalFilter {
    /// Whether `signal` matches every set field.
    pub fn matches(&self, signal: &Signal) -> bool {
        if let Some(kind) = self.kind {
            if signal.kind != kind {
                return false;
            }
        }
        if let Some(id) = self.id {
            if signal.id != id {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if signal.text.as_deref() != Some(text.as_str()) {
                return false;
            }
        }
        if let Some(color) = &self.color {
            if signal.color.as_deref() != Some(color.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Holds small unordered collections of signals per timestamp and alerts
/// subscribers when a structurally new one appears.
pub struct SignalIndicator {
    id: SeriesId,
    name: String,
    base: Arc<BaseSeries>,
    signals: RwLock<BTreeMap<i64, Vec<Signal>>>,
    listeners: Mutex<Vec<Weak<dyn SignalListener>>>,
}

impl SignalIndicator {
    /// Create a signal indicator and subscribe it to the base series so
    /// truncation prunes its history.
    pub fn spawn(base: Arc<BaseSeries>, name: impl Into<String>) -> Arc<Self> {
        let indicator = Arc::new(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            base,
            signals: RwLock::new(BTreeMap::new()),
            listeners: Mutex::new(Vec::new()),
        });
        indicator
            .base
            .hub()
            .subscribe(Arc::downgrade(&indicator) as Weak<dyn SeriesListener>);
        indicator
    }

    /// Series identity, used as the signal-event source tag.
    pub fn id(&self) -> SeriesId {
        self.id
    }

    /// Indicator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a signal subscriber.
    pub fn subscribe(&self, listener: Weak<dyn SignalListener>) {
        sync::lock(&self.listeners).push(listener);
    }

    /// Insert `signal`, replacing any structurally equal signal at its
    /// timestamp while keeping the others. Returns whether the signal
    /// was new. A structurally equal re-derivation only refreshes the
    /// stored display attributes and does not republish.
    pub fn add_or_replace(&self, signal: Signal) -> bool {
        let is_new = {
            let mut signals = sync::write(&self.signals);
            let slot = signals.entry(signal.time).or_default();
            let had_equal = slot.iter().any(|s| s.same_signal(&signal));
            slot.retain(|s| !s.same_signal(&signal));
            slot.push(signal.clone());
            !had_equal
        };
        if is_new {
            info!(
                indicator = %self.name,
                time = signal.time,
                kind = ?signal.kind,
                id = signal.id,
                "new signal"
            );
            self.publish(&SignalEvent {
                source: self.id,
                signal,
            });
        }
        is_new
    }

    /// Remove signals at `time` matching `filter`; returns how many were
    /// removed.
    pub fn remove(&self, time: i64, filter: &SignalFilter) -> usize {
        let mut signals = sync::write(&self.signals);
        let Some(slot) = signals.get_mut(&time) else {
            return 0;
        };
        let before = slot.len();
        slot.retain(|s| !filter.matches(s));
        let removed = before - slot.len();
        if slot.is_empty() {
            signals.remove(&time);
        }
        removed
    }

    /// Signals at `time`, in insertion order.
    pub fn signals_at(&self, time: i64) -> Vec<Signal> {
        sync::read(&self.signals)
            .get(&time)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of stored signals.
    pub fn len(&self) -> usize {
        sync::read(&self.signals).values().map(Vec::len).sum()
    }

    /// Check whether any signal is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish(&self, event: &SignalEvent) {
        let targets: Vec<Arc<dyn SignalListener>> = {
            let mut listeners = sync::lock(&self.listeners);
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for target in targets {
            target.on_signal(event);
        }
    }
}

impl SeriesListener for SignalIndicator {
    fn on_series_event(&self, event: &SeriesEvent) {
        if event.source == self.id {
            return;
        }
        if event.kind == EventKind::Cleared {
            let mut signals = sync::write(&self.signals);
            signals.retain(|&time, _| time < event.from_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_core::Timeframe;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        seen: AtomicUsize,
    }

    impl SignalListener for CountingListener {
        fn on_signal(&self, _event: &SignalEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn indicator_with_listener() -> (Arc<SignalIndicator>, Arc<CountingListener>) {
        let base = BaseSeries::new("AAPL", Timeframe::Daily);
        let indicator = SignalIndicator::spawn(base, "signals");
        let listener = Arc::new(CountingListener {
            seen: AtomicUsize::new(0),
        });
        indicator.subscribe(Arc::downgrade(&listener) as Weak<dyn SignalListener>);
        (indicator, listener)
    }

    #[test]
    fn test_new_signal_publishes() {
        let (indicator, listener) = indicator_with_listener();

        assert!(indicator.add_or_replace(Signal::new(3000, SignalKind::EnterLong, 1)));
        assert_eq!(listener.seen.load(Ordering::SeqCst), 1);
        assert_eq!(indicator.len(), 1);
    }

    #[test]
    fn test_display_only_update_is_not_new() {
        let (indicator, listener) = indicator_with_listener();
        indicator.add_or_replace(
            Signal::new(3000, SignalKind::EnterLong, 1).with_color("green"),
        );

        // Re-derivation with a different color: not new, no republish
        let is_new = indicator.add_or_replace(
            Signal::new(3000, SignalKind::EnterLong, 1).with_color("blue"),
        );
        assert!(!is_new);
        assert_eq!(listener.seen.load(Ordering::SeqCst), 1);

        // The stored instance carries the refreshed attributes
        let stored = indicator.signals_at(3000);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].color.as_deref(), Some("blue"));
    }

    #[test]
    fn test_distinct_signals_coexist_at_one_time() {
        let (indicator, _listener) = indicator_with_listener();
        indicator.add_or_replace(Signal::new(3000, SignalKind::EnterLong, 1));
        indicator.add_or_replace(Signal::new(3000, SignalKind::ExitShort, 2));

        assert_eq!(indicator.signals_at(3000).len(), 2);
    }

    #[test]
    fn test_remove_with_wildcards() {
        let (indicator, _listener) = indicator_with_listener();
        indicator.add_or_replace(Signal::new(3000, SignalKind::EnterLong, 1));
        indicator.add_or_replace(Signal::new(3000, SignalKind::ExitLong, 2));
        indicator.add_or_replace(Signal::new(3000, SignalKind::Alert, 3).with_text("warn"));

        // Kind-only filter
        let removed = indicator.remove(
            3000,
            &SignalFilter {
                kind: Some(SignalKind::ExitLong),
                ..Default::default()
            },
        );
        assert_eq!(removed, 1);

        // Unset filter matches everything
        let removed = indicator.remove(3000, &SignalFilter::default());
        assert_eq!(removed, 2);
        assert!(indicator.is_empty());
    }

    #[test]
    fn test_cleared_prunes_signals() {
        let base = BaseSeries::new("AAPL", Timeframe::Daily);
        let indicator = SignalIndicator::spawn(base.clone(), "signals");
        indicator.add_or_replace(Signal::new(1000, SignalKind::EnterLong, 1));
        indicator.add_or_replace(Signal::new(3000, SignalKind::ExitLong, 1));

        base.clear_from(2000);

        assert_eq!(indicator.signals_at(1000).len(), 1);
        assert!(indicator.signals_at(3000).is_empty());
    }
}
