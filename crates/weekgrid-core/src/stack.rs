use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::trace;

use crate::event::{Event, EventId};
use crate::window::{SlotGeometry, Window, WindowDay};

/// Malformed events (`end <= start`) and events with nothing inside the band
/// render this many slots high.
pub const MIN_VISIBLE_SLOTS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleDayPlacement {
    pub event_id: EventId,
    pub day: NaiveDate,
    pub day_index: usize,
    pub top: f64,
    pub height: f64,
    pub clipped_top: bool,
    pub clipped_bottom: bool,
}

/// Orders one column's events by end time and converts them to offsets.
/// Same-day collisions are left to the renderer; only the order is given.
#[tracing::instrument(skip_all, fields(day = %day.date, events = events.len()))]
pub fn stack_day(
    events: &[&Event],
    day: &WindowDay,
    window: &Window,
    geometry: &SlotGeometry,
) -> Vec<SingleDayPlacement> {
    let mut ordered = events.to_vec();
    ordered.sort_by(|a, b| {
        a.end
            .cmp(&b.end)
            .then_with(|| a.start.cmp(&b.start))
            .then_with(|| a.id.cmp(&b.id))
    });

    let band_start = window.band_start(day.date);
    let total = geometry.total_height;
    let min_height = (f64::from(MIN_VISIBLE_SLOTS) * geometry.cell_height).min(total);

    ordered
        .into_iter()
        .map(|event| {
            let start = minutes(window.local(event.start) - band_start);
            let end = minutes(window.local(event.end) - band_start);
            let raw_top = geometry.minutes_to_units(start);
            let raw_bottom = geometry.minutes_to_units(end);

            let mut top = raw_top.clamp(0.0, total);
            let bottom = raw_bottom.clamp(0.0, total);
            let mut height = bottom - top;
            let clipped_top = raw_top < 0.0;
            let clipped_bottom = raw_bottom > total || raw_top > total;

            if event.is_malformed() || height <= 0.0 {
                trace!(id = %event.id, "clamping to minimum visible height");
                height = min_height;
                top = top.min(total - min_height).max(0.0);
            }

            SingleDayPlacement {
                event_id: event.id.clone(),
                day: day.date,
                day_index: day.index,
                top,
                height,
                clipped_top,
                clipped_bottom,
            }
        })
        .collect()
}

fn minutes(delta: Duration) -> f64 {
    delta.num_seconds() as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::holiday::NoHolidays;
    use crate::window::WindowConfig;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, d, h, m, 0)
            .single()
            .expect("valid instant")
    }

    fn setup() -> (Window, SlotGeometry) {
        let config = WindowConfig {
            included_days: vec![0, 1, 2, 3, 4],
            start_hour: 9,
            end_hour: 17,
            step_minutes: 30,
            ..WindowConfig::default()
        };
        let window = Window::build(
            NaiveDate::from_ymd_opt(2022, 3, 21).expect("date"),
            &config,
            &NoHolidays,
        );
        let geometry = SlotGeometry::with_cell_height(&window, 1.0);
        (window, geometry)
    }

    fn stack(events: &[Event]) -> Vec<SingleDayPlacement> {
        let (window, geometry) = setup();
        let refs = events.iter().collect::<Vec<_>>();
        stack_day(&refs, &window.days[0], &window, &geometry)
    }

    #[test]
    fn offsets_in_slot_units() {
        let placements = stack(&[Event::new("x", at(21, 10, 0), at(21, 10, 30))]);
        assert_eq!(placements[0].top, 2.0);
        assert_eq!(placements[0].height, 1.0);
        assert!(!placements[0].clipped_top);
        assert!(!placements[0].clipped_bottom);
    }

    #[test]
    fn orders_by_end_ascending() {
        let placements = stack(&[
            Event::new("late", at(21, 9, 0), at(21, 12, 0)),
            Event::new("early", at(21, 11, 0), at(21, 11, 30)),
        ]);
        let ids = placements.iter().map(|p| p.event_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn clips_to_visible_band() {
        let placements = stack(&[
            Event::new("before", at(21, 8, 0), at(21, 10, 0)),
            Event::new("after", at(21, 16, 0), at(21, 18, 0)),
        ]);
        let before = &placements[0];
        assert_eq!(before.top, 0.0);
        assert_eq!(before.height, 2.0);
        assert!(before.clipped_top);

        let after = &placements[1];
        assert_eq!(after.top, 14.0);
        assert_eq!(after.height, 2.0);
        assert!(after.clipped_bottom);
        assert!(after.top + after.height <= 16.0);
    }

    #[test]
    fn malformed_and_outside_events_get_one_slot() {
        let placements = stack(&[
            Event::new("zero", at(21, 16, 50), at(21, 16, 50)),
            Event::new("dawn", at(21, 6, 0), at(21, 7, 0)),
        ]);
        let dawn = placements
            .iter()
            .find(|p| p.event_id.as_str() == "dawn")
            .expect("dawn placed");
        assert_eq!(dawn.top, 0.0);
        assert_eq!(dawn.height, 1.0);
        assert!(dawn.clipped_top);

        let zero = placements
            .iter()
            .find(|p| p.event_id.as_str() == "zero")
            .expect("zero placed");
        assert_eq!(zero.height, 1.0);
        assert_eq!(zero.top, 15.0);
    }
}
