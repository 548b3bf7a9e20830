//! # High/Low Tide Events
//!
//! Finds the turning points of a synthesized series and places them on the
//! hourly grid of a site's forecast table.
//!
//! ## Detection
//! A sample is a high (low) tide when it is strictly greater (less) than every
//! other sample within `±min_separation` samples. The window is clipped at the
//! series ends and the two end samples themselves are never turning points.
//! Two hours is the default separation: real turning points are spaced by
//! roughly six hours, so anything closer is synthesis ripple.
//!
//! ## Snapping
//! Each event lands in the hourly slot nearest to its (local) timestamp. The
//! slot keeps the event's exact time, so the table can show `14:37` in the
//! `15:00` row. When two events compete for one slot the one further from the
//! mean wins.

use crate::{TideEvent, TideKind, TideSeries};
use chrono::{Duration, NaiveDateTime};
use tracing::debug;

/// Default minimum spacing between turning points, in minutes.
pub const MIN_SEPARATION_MINUTES: i64 = 120;

/// Express a separation in minutes as a sample count at the given step.
pub fn separation_in_samples(minutes: i64, step: Duration) -> usize {
    let step_ms = step.num_milliseconds();
    if step_ms <= 0 || minutes <= 0 {
        return 0;
    }
    (Duration::minutes(minutes).num_milliseconds() / step_ms) as usize
}

/// Default two-hour separation expressed in samples of the given step.
pub fn default_min_separation(step: Duration) -> usize {
    separation_in_samples(MIN_SEPARATION_MINUTES, step)
}

/// Detect high and low tides in `series`, in time order.
///
/// Event timestamps are shifted from the series' UTC basis to local time by
/// subtracting `utc_offset_hours`. Non-finite samples are never events, so an
/// all-NaN series gives an empty list.
pub fn detect_events(
    series: &TideSeries,
    min_separation: usize,
    utc_offset_hours: i64,
) -> Vec<TideEvent> {
    let heights = &series.heights;
    let n = heights.len();
    if n < 3 {
        return Vec::new();
    }
    let order = min_separation.max(1);
    let offset = Duration::hours(utc_offset_hours);

    let mut events = Vec::new();
    for i in 1..n - 1 {
        let value = heights[i];
        if !value.is_finite() {
            continue;
        }
        let rising = value > heights[i - 1];
        let falling = value < heights[i - 1];
        let kind = if rising && value > heights[i + 1] {
            TideKind::High
        } else if falling && value < heights[i + 1] {
            TideKind::Low
        } else {
            continue;
        };

        let lo = i.saturating_sub(order);
        let hi = (i + order).min(n - 1);
        let dominant = (lo..=hi).filter(|&j| j != i).all(|j| match kind {
            TideKind::High => value > heights[j],
            TideKind::Low => value < heights[j],
        });
        if dominant {
            events.push(TideEvent {
                time: series.timestamp(i).naive_utc() - offset,
                height: value,
                kind,
            });
        }
    }

    debug!(count = events.len(), "detected tide events");
    events
}

/// High and low tide columns aligned with an hourly index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventSlots {
    pub high: Vec<Option<TideEvent>>,
    pub low: Vec<Option<TideEvent>>,
}

impl EventSlots {
    fn empty(len: usize) -> Self {
        Self {
            high: vec![None; len],
            low: vec![None; len],
        }
    }

    /// Exact high tide times, `None` where no high tide falls in the slot.
    pub fn high_times(&self) -> Vec<Option<NaiveDateTime>> {
        self.high.iter().map(|e| e.map(|e| e.time)).collect()
    }

    /// Exact low tide times, `None` where no low tide falls in the slot.
    pub fn low_times(&self) -> Vec<Option<NaiveDateTime>> {
        self.low.iter().map(|e| e.map(|e| e.time)).collect()
    }
}

/// Snap events onto `slots`, an ascending time index.
///
/// Events more than half a slot spacing beyond either end of the index are
/// dropped. Equidistant events go to the earlier slot. On collision, the event
/// with the larger absolute height is kept; ties keep the earlier event.
pub fn snap_events(events: &[TideEvent], slots: &[NaiveDateTime]) -> EventSlots {
    let mut out = EventSlots::empty(slots.len());
    let (Some(&first), Some(&last)) = (slots.first(), slots.last()) else {
        return out;
    };
    let (head_tolerance, tail_tolerance) = match slots.len() {
        1 => (Duration::minutes(30), Duration::minutes(30)),
        n => ((slots[1] - slots[0]) / 2, (slots[n - 1] - slots[n - 2]) / 2),
    };

    for event in events {
        if event.time < first - head_tolerance || event.time > last + tail_tolerance {
            continue;
        }
        let slot = nearest_slot(slots, event.time);
        let column = match event.kind {
            TideKind::High => &mut out.high,
            TideKind::Low => &mut out.low,
        };
        let keep_existing = matches!(
            column[slot],
            Some(existing) if existing.height.abs() >= event.height.abs()
        );
        if keep_existing {
            debug!(slot = %slots[slot], "slot collision, keeping existing event");
        } else {
            column[slot] = Some(*event);
        }
    }
    out
}

fn nearest_slot(slots: &[NaiveDateTime], time: NaiveDateTime) -> usize {
    let upper = slots.partition_point(|&s| s < time);
    if upper == 0 {
        return 0;
    }
    if upper >= slots.len() {
        return slots.len() - 1;
    }
    if time - slots[upper - 1] <= slots[upper] - time {
        upper - 1
    } else {
        upper
    }
}
