//! Batched cross-sectional computation.

use std::sync::{Arc, RwLock};

use chart_core::{ChartError, IndicatorError, Timeframe};
use tracing::debug;

use crate::indicator::Indicator;
use crate::sync;

/// One member of a panel: an indicator computed for an entity, valid
/// over a time interval.
#[derive(Clone)]
pub struct PanelMember {
    pub entity: String,
    pub indicator: Arc<Indicator>,
    /// First timestamp this entity participates at (inclusive).
    pub valid_from: i64,
    /// Last timestamp this entity participates at (inclusive).
    pub valid_to: i64,
}

/// Aggregates `(indicator, entity)` pairs sharing one sampling frequency
/// so a host can drive them with one batched compute call instead of one
/// call per entity.
///
/// Membership changes never retroactively recompute already-computed
/// history.
pub struct PanelIndicator {
    timeframe: Timeframe,
    members: RwLock<Vec<PanelMember>>,
}

impl PanelIndicator {
    /// Create an empty panel for `timeframe`.
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            members: RwLock::new(Vec::new()),
        }
    }

    /// The panel's sampling frequency.
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Add a member; its base series must share the panel's frequency.
    pub fn add(&self, member: PanelMember) -> Result<(), IndicatorError> {
        let member_tf = member.indicator.base().timeframe();
        if member_tf != self.timeframe {
            return Err(IndicatorError::TimeframeMismatch {
                panel: self.timeframe.to_string(),
                member: member_tf.to_string(),
            });
        }
        sync::write(&self.members).push(member);
        Ok(())
    }

    /// Remove every member for `entity`; returns how many were removed.
    pub fn remove(&self, entity: &str) -> usize {
        let mut members = sync::write(&self.members);
        let before = members.len();
        members.retain(|m| m.entity != entity);
        before - members.len()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        sync::read(&self.members).len()
    }

    /// Check whether the panel has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate `(first, last)` across all members' observed ranges:
    /// the minimum first timestamp and the maximum last timestamp.
    pub fn range(&self) -> Option<(i64, i64)> {
        sync::read(&self.members)
            .iter()
            .filter_map(|m| {
                let base = m.indicator.base();
                Some((base.first_time()?, base.last_time()?))
            })
            .reduce(|(first_a, last_a), (first_b, last_b)| {
                (first_a.min(first_b), last_a.max(last_b))
            })
    }

    /// One batched recompute across all members from `from_time` to the
    /// aggregate last time. Returns the total number of indices written.
    pub fn compute_from(&self, from_time: i64) -> Result<usize, ChartError> {
        self.run(Some(from_time))
    }

    /// Heartbeat: continue every member from its own high-water mark in
    /// one batched pass.
    pub fn on_heartbeat(&self) -> Result<usize, ChartError> {
        self.run(None)
    }

    fn run(&self, explicit_from: Option<i64>) -> Result<usize, ChartError> {
        let members: Vec<PanelMember> = sync::read(&self.members).clone();
        let Some((first, last)) = self.range() else {
            return Ok(0);
        };
        let batch_from = explicit_from.unwrap_or(first).max(first);

        let mut written = 0;
        for member in &members {
            let computed = member.indicator.computed_time();
            let from = match explicit_from {
                Some(_) => batch_from,
                // Heartbeat continues from the member's own mark
                None if computed == i64::MIN => batch_from,
                None => computed,
            };
            let start = from.max(member.valid_from);
            if start > last.min(member.valid_to) {
                continue; // validity interval does not intersect the window
            }
            written += member.indicator.refresh_from(start)?;
        }
        debug!(
            from = batch_from,
            to = last,
            members = members.len(),
            written,
            "panel pass"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseSeries;
    use crate::indicator::{ComputeContext, Formula};
    use chart_core::{cols, Bar, IndicatorError};
    use chart_functions::FunctionKind;

    struct AverageFormula;

    impl Formula for AverageFormula {
        fn name(&self) -> &str {
            "avg2"
        }

        fn outputs(&self) -> &[&'static str] {
            &["avg"]
        }

        fn compute(
            &self,
            ctx: &mut ComputeContext<'_>,
            from: usize,
            len: usize,
        ) -> Result<(), IndicatorError> {
            for i in from..len {
                let v = ctx.function(cols::CLOSE, &FunctionKind::Average { period: 2 }, i)?;
                ctx.set_output("avg", i, v);
            }
            Ok(())
        }
    }

    fn entity(symbol: &str, closes: &[f64], start: i64) -> PanelMember {
        let base = BaseSeries::new(symbol, Timeframe::Daily);
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + (i as i64) * 1000, c, c + 1.0, c - 1.0, c, 100.0))
            .collect();
        base.load(&bars).unwrap();
        PanelMember {
            entity: symbol.to_string(),
            indicator: Indicator::spawn(base, format!("avg2-{symbol}"), Box::new(AverageFormula)),
            valid_from: i64::MIN,
            valid_to: i64::MAX,
        }
    }

    #[test]
    fn test_add_rejects_timeframe_mismatch() {
        let panel = PanelIndicator::new(Timeframe::Hour1);
        let member = entity("AAPL", &[1.0], 1000);

        assert!(matches!(
            panel.add(member),
            Err(IndicatorError::TimeframeMismatch { .. })
        ));
        assert!(panel.is_empty());
    }

    #[test]
    fn test_range_aggregates_members() {
        let panel = PanelIndicator::new(Timeframe::Daily);
        panel.add(entity("AAPL", &[1.0, 2.0], 1000)).unwrap();
        panel.add(entity("MSFT", &[1.0, 2.0, 3.0], 500)).unwrap();

        assert_eq!(panel.range(), Some((500, 2500)));
    }

    #[test]
    fn test_batched_compute() {
        let panel = PanelIndicator::new(Timeframe::Daily);
        let aapl = entity("AAPL", &[1.0, 2.0, 3.0], 1000);
        let msft = entity("MSFT", &[10.0, 20.0], 1000);
        let aapl_indicator = aapl.indicator.clone();
        panel.add(aapl).unwrap();
        panel.add(msft).unwrap();

        let written = panel.compute_from(0).unwrap();
        assert_eq!(written, 5);
        assert_eq!(aapl_indicator.output("avg", 2), 2.5);
    }

    #[test]
    fn test_heartbeat_continues_incrementally() {
        let panel = PanelIndicator::new(Timeframe::Daily);
        let member = entity("AAPL", &[1.0, 2.0], 1000);
        let indicator = member.indicator.clone();
        let base = indicator.base().clone();
        panel.add(member).unwrap();

        panel.compute_from(0).unwrap();
        assert_eq!(indicator.computed_time(), 2000);

        // Nothing new: heartbeat recomputes only the last (possibly
        // still-forming) bar per member
        let written = panel.on_heartbeat().unwrap();
        assert_eq!(written, 1);

        base.refresh(&[Bar::new(3000, 3.0, 4.0, 2.0, 3.0, 100.0)])
            .unwrap();
        assert_eq!(indicator.computed_time(), 3000);
    }

    #[test]
    fn test_remove_by_entity() {
        let panel = PanelIndicator::new(Timeframe::Daily);
        panel.add(entity("AAPL", &[1.0], 1000)).unwrap();
        panel.add(entity("MSFT", &[1.0], 1000)).unwrap();

        assert_eq!(panel.remove("AAPL"), 1);
        assert_eq!(panel.len(), 1);
        assert_eq!(panel.remove("AAPL"), 0);
    }
}
