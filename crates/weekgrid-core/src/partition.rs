use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::trace;

use crate::event::Event;
use crate::window::Window;

/// Events split relative to a window. Every window day has a bucket in
/// `single_day`, possibly empty.
#[derive(Debug, Clone, Default)]
pub struct Partition<'a> {
    pub multi_day: Vec<&'a Event>,
    pub single_day: BTreeMap<NaiveDate, Vec<&'a Event>>,
}

impl Partition<'_> {
    pub fn len(&self) -> usize {
        self.multi_day.len() + self.single_day.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Local calendar-day span of an event: `end.date - start.date`.
pub fn day_span(window: &Window, event: &Event) -> i64 {
    let start = window.local_date(event.start);
    let end = window.local_date(event.end);
    (end - start).num_days()
}

/// True when `[start.date, end.date]` contains `day`.
pub fn is_active_on(window: &Window, event: &Event, day: NaiveDate) -> bool {
    let start = window.local_date(event.start);
    let end = window.local_date(event.end);
    start <= day && day <= end
}

#[tracing::instrument(skip_all, fields(days = window.days.len()))]
pub fn partition<'a, I>(events: I, window: &Window) -> Partition<'a>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut out = Partition {
        multi_day: Vec::new(),
        single_day: window.days.iter().map(|day| (day.date, Vec::new())).collect(),
    };

    if window.is_empty() {
        return out;
    }

    for event in events {
        if day_span(window, event) >= 1 {
            if window
                .days
                .iter()
                .any(|day| is_active_on(window, event, day.date))
            {
                out.multi_day.push(event);
            } else {
                trace!(id = %event.id, "multi-day event outside window");
            }
            continue;
        }

        let start_date = window.local_date(event.start);
        match out.single_day.get_mut(&start_date) {
            Some(bucket) => bucket.push(event),
            None => trace!(id = %event.id, %start_date, "event outside window"),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::holiday::NoHolidays;
    use crate::window::WindowConfig;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, d, h, m, 0)
            .single()
            .expect("valid instant")
    }

    fn workweek() -> Window {
        let config = WindowConfig {
            included_days: vec![0, 1, 2, 3, 4],
            ..WindowConfig::default()
        };
        Window::build(
            NaiveDate::from_ymd_opt(2022, 3, 23).expect("date"),
            &config,
            &NoHolidays,
        )
    }

    #[test]
    fn splits_single_and_multi_day() {
        let window = workweek();
        let events = vec![
            Event::new("single", at(21, 10, 0), at(21, 10, 30)),
            Event::new("multi", at(22, 0, 0), at(24, 23, 59)),
            Event::new("overnight", at(23, 22, 0), at(24, 2, 0)),
        ];

        let parts = partition(&events, &window);
        let multi = parts.multi_day.iter().map(|e| e.id.as_str()).collect::<Vec<_>>();
        assert_eq!(multi, vec!["multi", "overnight"]);
        assert_eq!(parts.single_day.len(), 5);
        assert_eq!(parts.single_day[&window.days[0].date].len(), 1);
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn drops_events_outside_window() {
        let window = workweek();
        let events = vec![
            Event::new("weekend", at(26, 10, 0), at(26, 11, 0)),
            Event::new("last-week", at(14, 0, 0), at(18, 12, 0)),
        ];
        let parts = partition(&events, &window);
        assert!(parts.is_empty());
    }

    #[test]
    fn malformed_event_stays_single_day() {
        let window = workweek();
        let events = vec![Event::new("backwards", at(22, 12, 0), at(21, 9, 0))];
        let parts = partition(&events, &window);
        assert!(parts.multi_day.is_empty());
        assert_eq!(parts.single_day[&window.days[1].date].len(), 1);
    }

    #[test]
    fn multi_day_crossing_hidden_weekend_is_kept() {
        let config = WindowConfig {
            included_days: vec![0, 1, 2, 3, 4],
            ..WindowConfig::default()
        };
        let window = Window::build(
            NaiveDate::from_ymd_opt(2022, 3, 30).expect("date"),
            &config,
            &NoHolidays,
        );
        let events = vec![Event::new("weekend", at(26, 9, 0), at(28, 9, 0))];
        let parts = partition(&events, &window);
        assert_eq!(parts.multi_day.len(), 1);
    }
}
