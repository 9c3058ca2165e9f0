//! Change-notification events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a series (base or derived), used to tag event sources so a
/// series can ignore notifications it produced itself.
pub type SeriesId = Uuid;

/// One root-triggered recomputation wave. Strictly increasing per base
/// series; windowed function caches use it to tell a cache hit within a
/// wave from stale state left over by an earlier wave.
pub type PassId = u64;

/// What a notification means for dependent series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Initial population; recompute everything.
    Loaded,
    /// Rows appended or inserted; recompute from the affected time.
    Refreshed,
    /// Existing rows revised in place; recompute from the affected time.
    Updated,
    /// A dependent series finished recomputing; cascades to second-order
    /// dependents.
    Computed,
    /// History truncated from the affected time onward.
    Cleared,
}

impl EventKind {
    /// Whether this kind signals a base-data change that dependents must
    /// recompute from.
    pub fn is_data_change(&self) -> bool {
        matches!(
            self,
            EventKind::Loaded | EventKind::Refreshed | EventKind::Updated
        )
    }
}

/// Notification emitted after a series mutation or recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesEvent {
    /// Series that produced the event.
    pub source: SeriesId,
    /// What happened.
    pub kind: EventKind,
    /// First affected timestamp (inclusive).
    pub from_time: i64,
    /// Last affected timestamp (inclusive).
    pub to_time: i64,
    /// Recomputation wave this event belongs to.
    pub pass: PassId,
}
