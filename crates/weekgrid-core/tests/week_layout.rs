use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use weekgrid_core::event::{Event, ResourceKey, ResourceKeys};
use weekgrid_core::holiday::{HolidaySet, NoHolidays};
use weekgrid_core::layout::{LayoutOptions, layout_week};
use weekgrid_core::resource::Resource;
use weekgrid_core::window::{Window, WindowConfig};

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 3, day, hour, minute, 0)
        .single()
        .expect("valid instant")
}

fn workweek(reference_day: u32, step_minutes: u32) -> Window {
    let config = WindowConfig {
        included_days: vec![0, 1, 2, 3, 4],
        start_hour: 9,
        end_hour: 17,
        step_minutes,
        ..WindowConfig::default()
    };
    Window::build(
        NaiveDate::from_ymd_opt(2022, 3, reference_day).expect("date"),
        &config,
        &NoHolidays,
    )
}

fn all_day(from: u32, to: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    (at(from, 0, 0), at(to, 23, 59))
}

#[test]
fn single_day_event_sits_in_slot_units() {
    let window = workweek(23, 30);
    let events = vec![Event::new("x", at(21, 10, 0), at(21, 10, 30))];
    let layout = layout_week(&events, &window, &[], &LayoutOptions::default());

    let grid = &layout.grids[0];
    let monday = grid.single_day_for(window.days[0].date);
    assert_eq!(monday.len(), 1);

    let cell = layout.geometry.cell_height;
    assert_eq!(monday[0].top / cell, 2.0);
    assert_eq!(monday[0].height / cell, 1.0);
    assert!(grid.multi_day.is_empty());
}

#[test]
fn overlapping_multi_day_events_get_distinct_lanes() {
    let window = workweek(23, 60);
    let (y_start, y_end) = all_day(21, 23);
    let (z_start, z_end) = all_day(22, 24);
    let events = vec![
        Event::new("y", y_start, y_end),
        Event::new("z", z_start, z_end),
    ];
    let layout = layout_week(&events, &window, &[], &LayoutOptions::default());
    let grid = &layout.grids[0];

    let by_id = grid
        .multi_day
        .iter()
        .map(|p| (p.event_id.as_str().to_string(), p.clone()))
        .collect::<BTreeMap<_, _>>();
    let y = &by_id["y"];
    let z = &by_id["z"];

    assert_ne!(y.lane, z.lane);
    assert_eq!(y.span_days, 3);
    assert_eq!(z.span_days, 3);
    assert!(!y.clipped_start && !y.clipped_end);
    assert!(!z.clipped_start && !z.clipped_end);
}

#[test]
fn event_from_previous_week_is_clipped_at_start() {
    let window = workweek(23, 60);
    let events = vec![Event::new("w", at(18, 9, 0), at(22, 17, 0))];
    let layout = layout_week(&events, &window, &[], &LayoutOptions::default());
    let placement = &layout.grids[0].multi_day[0];

    assert!(placement.clipped_start);
    assert!(!placement.clipped_end);
    assert_eq!(placement.start_day_index, 0);
    assert_eq!(placement.span_days, 2);
}

#[test]
fn empty_input_gives_empty_columns() {
    let window = workweek(23, 60);
    let layout = layout_week(&[], &window, &[], &LayoutOptions::default());
    let grid = &layout.grids[0];

    assert!(grid.multi_day.is_empty());
    assert_eq!(grid.single_day.len(), window.days.len());
    assert!(grid.single_day.values().all(Vec::is_empty));
}

#[test]
fn every_visible_event_is_placed_once() {
    let window = workweek(23, 30);
    let mut events = Vec::new();
    for day in 21..=25 {
        for hour in [8, 10, 12, 16] {
            events.push(Event::new(
                format!("s-{day}-{hour}").as_str(),
                at(day, hour, 15),
                at(day, hour + 1, 0),
            ));
        }
    }
    events.push(Event::new("m-1", at(19, 9, 0), at(22, 9, 0)));
    events.push(Event::new("m-2", at(23, 9, 0), at(29, 9, 0)));
    events.push(Event::new("gone", at(28, 9, 0), at(28, 10, 0)));

    let layout = layout_week(&events, &window, &[], &LayoutOptions::default());
    let grid = &layout.grids[0];
    assert_eq!(grid.placement_count(), 20 + 2);

    let mut seen = grid
        .multi_day
        .iter()
        .map(|p| p.event_id.clone())
        .chain(grid.single_day.values().flatten().map(|p| p.event_id.clone()))
        .collect::<Vec<_>>();
    let before = seen.len();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), before);
}

#[test]
fn concurrently_active_events_never_share_a_lane() {
    let window = workweek(23, 60);
    let spans = [(19, 22), (21, 22), (22, 25), (23, 24), (24, 30), (21, 21), (25, 26)];
    let events = spans
        .iter()
        .enumerate()
        .map(|(i, (from, to))| {
            let start = at(*from, 8, 0);
            let end = at(*to, 8, 0) + Duration::hours(if from == to { 20 } else { 0 });
            Event::new(format!("e{i}").as_str(), start, end)
        })
        .collect::<Vec<_>>();

    let layout = layout_week(&events, &window, &[], &LayoutOptions::default());
    let placements = &layout.grids[0].multi_day;

    for day in 0..window.days.len() {
        let mut lanes = placements
            .iter()
            .filter(|p| p.covers(day))
            .map(|p| p.lane)
            .collect::<Vec<_>>();
        let count = lanes.len();
        lanes.sort_unstable();
        lanes.dedup();
        assert_eq!(lanes.len(), count, "lane shared on day {day}");
    }
}

#[test]
fn layout_is_idempotent() {
    let window = workweek(23, 30);
    let events = vec![
        Event::new("a", at(21, 9, 0), at(23, 12, 0)),
        Event::new("b", at(22, 11, 0), at(22, 12, 0)),
        Event::new("c", at(24, 16, 0), at(24, 18, 0)),
    ];
    let options = LayoutOptions::default();
    let first = layout_week(&events, &window, &[], &options);
    let second = layout_week(&events, &window, &[], &options);
    assert_eq!(first, second);
}

#[test]
fn resources_see_only_their_events() {
    let window = workweek(23, 60);
    let events = vec![
        Event::new("ana-only", at(21, 10, 0), at(21, 11, 0))
            .with_resources(ResourceKeys::One(ResourceKey::new("1"))),
        Event::new("shared", at(22, 10, 0), at(24, 11, 0)).with_resources(ResourceKeys::Many(
            vec![ResourceKey::new("1"), ResourceKey::new("2")],
        )),
        Event::new("nobody", at(23, 10, 0), at(23, 11, 0)),
    ];
    let resources = vec![Resource::new("1", "Ana"), Resource::new("2", "Bo")];
    let layout = layout_week(&events, &window, &resources, &LayoutOptions::default());

    assert_eq!(layout.grids.len(), 2);
    assert_eq!(layout.grids[0].placement_count(), 2);
    assert_eq!(layout.grids[1].placement_count(), 1);
    assert_eq!(layout.grids[1].multi_day[0].event_id.as_str(), "shared");
}

#[test]
fn holidays_are_marked_but_still_laid_out() {
    let config = WindowConfig::default();
    let holidays = HolidaySet::parse_list("2022-03-25, 2022-03-27").expect("holidays");
    let window = Window::build(
        NaiveDate::from_ymd_opt(2022, 3, 23).expect("date"),
        &config,
        &holidays,
    );
    let marked = window
        .days
        .iter()
        .filter(|day| day.holiday)
        .map(|day| day.date.format("%a").to_string())
        .collect::<Vec<_>>();
    assert_eq!(marked, vec!["Fri", "Sun"]);

    let events = vec![Event::new("friday", at(25, 10, 0), at(25, 11, 0))];
    let layout = layout_week(&events, &window, &[], &LayoutOptions::default());
    assert_eq!(layout.grids[0].placement_count(), 1);
}

fn new_york_day(reference: NaiveDate) -> Window {
    let config = WindowConfig {
        start_hour: 0,
        end_hour: 24,
        step_minutes: 60,
        timezone: chrono_tz::America::New_York,
        ..WindowConfig::default()
    };
    Window::build(reference, &config, &NoHolidays)
}

fn utc(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("rfc3339 instant")
}

#[test]
fn days_follow_the_window_timezone() {
    let window = new_york_day(NaiveDate::from_ymd_opt(2022, 3, 23).expect("date"));
    let events = vec![Event::new(
        "evening",
        utc("2022-03-21T23:30:00Z"),
        utc("2022-03-22T00:30:00Z"),
    )];
    let layout = layout_week(&events, &window, &[], &LayoutOptions::default());
    let grid = &layout.grids[0];

    assert!(grid.multi_day.is_empty());
    let monday = grid.single_day_for(window.days[0].date);
    assert_eq!(monday.len(), 1);
    assert!(grid.single_day_for(window.days[1].date).is_empty());

    let cell = layout.geometry.cell_height;
    assert_eq!(monday[0].top / cell, 19.5);
    assert_eq!(monday[0].height / cell, 1.0);
}

#[test]
fn dst_change_week_keeps_wall_clock_positions() {
    let window = new_york_day(NaiveDate::from_ymd_opt(2022, 3, 13).expect("date"));
    assert_eq!(
        window.range().expect("range").start,
        utc("2022-03-07T05:00:00Z")
    );

    let events = vec![
        Event::new("sat-late", utc("2022-03-13T02:00:00Z"), utc("2022-03-13T03:00:00Z")),
        Event::new("sun-morning", utc("2022-03-13T13:00:00Z"), utc("2022-03-13T14:00:00Z")),
    ];
    let layout = layout_week(&events, &window, &[], &LayoutOptions::default());
    let grid = &layout.grids[0];
    let cell = layout.geometry.cell_height;

    assert!(grid.multi_day.is_empty());

    let saturday = grid.single_day_for(window.days[5].date);
    assert_eq!(saturday.len(), 1);
    assert_eq!(saturday[0].event_id.as_str(), "sat-late");
    assert_eq!(saturday[0].top / cell, 21.0);

    let sunday = grid.single_day_for(window.days[6].date);
    assert_eq!(sunday.len(), 1);
    assert_eq!(sunday[0].top / cell, 9.0);
    assert_eq!(sunday[0].height / cell, 1.0);
}
