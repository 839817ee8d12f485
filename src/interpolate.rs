//! Correction deltas derived from user-pinned anchors.
//!
//! An anchor pins the correction for one canonical timestamp. Between two
//! anchors the correction is interpolated linearly; outside the anchored range
//! it is clamped to the nearest anchor. With no anchors every file gets the
//! current default correction.

use chrono::{DateTime, FixedOffset, TimeDelta};
use retimer_common::time::{delta_from_nanos, delta_nanos, instant_nanos};
use std::collections::BTreeMap;

/// Ordered anchors plus the default correction.
#[derive(Debug, Clone, Default)]
pub struct DeltaInterpolator {
    anchors: BTreeMap<DateTime<FixedOffset>, TimeDelta>,
    default: TimeDelta,
}

impl DeltaInterpolator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_delta(&self) -> TimeDelta {
        self.default
    }

    pub fn set_default(&mut self, delta: TimeDelta) {
        self.default = delta;
    }

    /// Pin `delta` at `ts`, replacing any anchor at the same instant.
    pub fn lock(&mut self, ts: DateTime<FixedOffset>, delta: TimeDelta) -> Option<TimeDelta> {
        let previous = self.anchors.remove(&ts);
        self.anchors.insert(ts, delta);
        previous
    }

    pub fn unlock(&mut self, ts: DateTime<FixedOffset>) -> Option<TimeDelta> {
        self.anchors.remove(&ts)
    }

    pub fn is_locked(&self, ts: DateTime<FixedOffset>) -> bool {
        self.anchors.contains_key(&ts)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Anchors in ascending timestamp order.
    pub fn anchors(&self) -> impl Iterator<Item = (DateTime<FixedOffset>, TimeDelta)> + '_ {
        self.anchors.iter().map(|(ts, delta)| (*ts, *delta))
    }

    /// Drop every anchor and zero the default.
    pub fn clear(&mut self) {
        self.anchors.clear();
        self.default = TimeDelta::zero();
    }

    /// Correction for a file whose canonical timestamp is `ts`.
    pub fn effective_delta(&self, ts: DateTime<FixedOffset>) -> TimeDelta {
        let mut values = self.anchors.values();
        match (values.next(), self.anchors.len()) {
            (None, _) => return self.default,
            (Some(only), 1) => return *only,
            _ => {}
        }

        let upper = self.anchors.range(ts..).next();
        let lower = self.anchors.range(..ts).next_back();
        match (lower, upper) {
            (Some((t_lower, d_lower)), Some((t_upper, d_upper))) => {
                interpolate(ts, (*t_lower, *d_lower), (*t_upper, *d_upper))
            }
            (None, Some((_, first))) => *first,
            (Some((_, last)), None) => *last,
            (None, None) => self.default,
        }
    }
}

/// `d_lower + (d_upper - d_lower) * (ts - t_lower) / (t_upper - t_lower)`,
/// exact in nanoseconds, truncating toward zero.
fn interpolate(
    ts: DateTime<FixedOffset>,
    (t_lower, d_lower): (DateTime<FixedOffset>, TimeDelta),
    (t_upper, d_upper): (DateTime<FixedOffset>, TimeDelta),
) -> TimeDelta {
    let span = instant_nanos(&t_upper) - instant_nanos(&t_lower);
    if span <= 0 {
        return d_upper;
    }
    let elapsed = instant_nanos(&ts) - instant_nanos(&t_lower);
    let lower = delta_nanos(d_lower);
    let change = delta_nanos(d_upper) - lower;

    change
        .checked_mul(elapsed)
        .map(|scaled| lower + scaled / span)
        .and_then(delta_from_nanos)
        .unwrap_or(d_lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    #[test]
    fn test_no_anchors_uses_default() {
        let mut interp = DeltaInterpolator::new();
        assert_eq!(interp.effective_delta(ts("2020-01-01T00:00:00Z")), TimeDelta::zero());

        interp.set_default(TimeDelta::minutes(7));
        assert_eq!(interp.effective_delta(ts("1999-01-01T00:00:00Z")), TimeDelta::minutes(7));
        assert_eq!(interp.effective_delta(ts("2040-01-01T00:00:00Z")), TimeDelta::minutes(7));
    }

    #[test]
    fn test_single_anchor_is_constant() {
        let mut interp = DeltaInterpolator::new();
        interp.set_default(TimeDelta::minutes(7));
        interp.lock(ts("2020-06-01T10:00:00Z"), TimeDelta::hours(-2));

        assert_eq!(interp.effective_delta(ts("2019-01-01T00:00:00Z")), TimeDelta::hours(-2));
        assert_eq!(interp.effective_delta(ts("2021-01-01T00:00:00Z")), TimeDelta::hours(-2));
    }

    #[test]
    fn test_two_anchors_linear_inside_clamped_outside() {
        let mut interp = DeltaInterpolator::new();
        interp.lock(ts("2020-06-01T10:00:00Z"), TimeDelta::seconds(0));
        interp.lock(ts("2020-06-01T12:00:00Z"), TimeDelta::seconds(120));

        assert_eq!(interp.effective_delta(ts("2020-06-01T11:00:00Z")), TimeDelta::seconds(60));
        assert_eq!(interp.effective_delta(ts("2020-06-01T10:30:00Z")), TimeDelta::seconds(30));
        assert_eq!(interp.effective_delta(ts("2020-06-01T10:00:00Z")), TimeDelta::zero());
        assert_eq!(interp.effective_delta(ts("2020-06-01T12:00:00Z")), TimeDelta::seconds(120));
        assert_eq!(interp.effective_delta(ts("2020-06-01T09:00:00Z")), TimeDelta::zero());
        assert_eq!(interp.effective_delta(ts("2020-06-02T00:00:00Z")), TimeDelta::seconds(120));
    }

    #[test]
    fn test_interpolation_truncates() {
        let mut interp = DeltaInterpolator::new();
        interp.lock(ts("2020-06-01T00:00:00Z"), TimeDelta::zero());
        interp.lock(ts("2020-06-01T00:00:03Z"), TimeDelta::nanoseconds(1));

        assert_eq!(interp.effective_delta(ts("2020-06-01T00:00:01Z")), TimeDelta::zero());
        assert_eq!(interp.effective_delta(ts("2020-06-01T00:00:02Z")), TimeDelta::zero());

        interp.lock(ts("2020-06-01T00:00:03Z"), TimeDelta::nanoseconds(-3));
        assert_eq!(
            interp.effective_delta(ts("2020-06-01T00:00:02Z")),
            TimeDelta::nanoseconds(-2)
        );
    }

    #[test]
    fn test_keys_compare_by_instant() {
        let mut interp = DeltaInterpolator::new();
        interp.lock(ts("2020-06-01T10:00:00+02:00"), TimeDelta::hours(1));
        let previous = interp.lock(ts("2020-06-01T08:00:00Z"), TimeDelta::hours(3));

        assert_eq!(previous, Some(TimeDelta::hours(1)));
        assert_eq!(interp.len(), 1);
        assert!(interp.is_locked(ts("2020-06-01T09:00:00+01:00")));
        let (key, _) = interp.anchors().next().unwrap();
        assert_eq!(key.offset().local_minus_utc(), 0);

        assert_eq!(interp.unlock(ts("2020-06-01T10:00:00+02:00")), Some(TimeDelta::hours(3)));
        assert!(interp.is_empty());
    }

    #[test]
    fn test_three_anchors_pick_neighbours() {
        let mut interp = DeltaInterpolator::new();
        interp.lock(ts("2020-01-01T00:00:00Z"), TimeDelta::zero());
        interp.lock(ts("2020-01-01T01:00:00Z"), TimeDelta::minutes(60));
        interp.lock(ts("2020-01-01T02:00:00Z"), TimeDelta::minutes(-60));

        assert_eq!(
            interp.effective_delta(ts("2020-01-01T00:30:00Z")),
            TimeDelta::minutes(30)
        );
        assert_eq!(
            interp.effective_delta(ts("2020-01-01T01:30:00Z")),
            TimeDelta::zero()
        );
        assert_eq!(
            interp.effective_delta(ts("2020-01-01T01:00:00Z")),
            TimeDelta::minutes(60)
        );
    }

    #[test]
    fn test_clear() {
        let mut interp = DeltaInterpolator::new();
        interp.set_default(TimeDelta::seconds(4));
        interp.lock(ts("2020-01-01T00:00:00Z"), TimeDelta::zero());
        interp.clear();
        assert!(interp.is_empty());
        assert_eq!(interp.default_delta(), TimeDelta::zero());
    }
}
