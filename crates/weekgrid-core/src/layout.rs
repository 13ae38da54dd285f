use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::event::Event;
use crate::lanes::{DEFAULT_LANE_HEIGHT, MultiDayPlacement, assign_lanes, header_height, lane_count};
use crate::partition::partition;
use crate::resource::{Resource, resource_views};
use crate::stack::{SingleDayPlacement, stack_day};
use crate::window::{Slot, SlotGeometry, Window, WindowDay};

pub const DEFAULT_GRID_HEIGHT: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    pub grid_height: f64,
    pub lane_height: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            grid_height: DEFAULT_GRID_HEIGHT,
            lane_height: DEFAULT_LANE_HEIGHT,
        }
    }
}

/// Placements for one grid, i.e. one resource or the implicit one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLayout {
    pub resource: Option<Resource>,
    pub multi_day: Vec<MultiDayPlacement>,
    pub single_day: BTreeMap<NaiveDate, Vec<SingleDayPlacement>>,
    pub lanes: usize,
    pub header_height: f64,
}

impl GridLayout {
    pub fn placement_count(&self) -> usize {
        self.multi_day.len() + self.single_day.values().map(Vec::len).sum::<usize>()
    }

    pub fn single_day_for(&self, date: NaiveDate) -> &[SingleDayPlacement] {
        self.single_day.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekLayout {
    pub days: Vec<WindowDay>,
    pub slots: Vec<Slot>,
    pub geometry: SlotGeometry,
    pub grids: Vec<GridLayout>,
}

/// Runs partition, lane assignment and stacking for one event set.
pub fn layout_grid<'a, I>(
    events: I,
    window: &Window,
    geometry: &SlotGeometry,
    lane_height: f64,
) -> GridLayout
where
    I: IntoIterator<Item = &'a Event>,
{
    let parts = partition(events, window);
    let multi_day = assign_lanes(&parts.multi_day, window);

    let single_day = window
        .days
        .iter()
        .map(|day| {
            let bucket = parts
                .single_day
                .get(&day.date)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            (day.date, stack_day(bucket, day, window, geometry))
        })
        .collect::<BTreeMap<_, _>>();

    GridLayout {
        resource: None,
        lanes: lane_count(&multi_day),
        header_height: header_height(&multi_day, lane_height),
        multi_day,
        single_day,
    }
}

/// Lays out the whole week, one grid per resource. Pure: the same inputs
/// always give the same output.
#[tracing::instrument(skip_all, fields(events = events.len(), resources = resources.len()))]
pub fn layout_week(
    events: &[Event],
    window: &Window,
    resources: &[Resource],
    options: &LayoutOptions,
) -> WeekLayout {
    let geometry = SlotGeometry::fit(window, options.grid_height);

    let grids = resource_views(events, resources)
        .into_iter()
        .map(|(resource, filtered)| {
            let mut grid = layout_grid(filtered, window, &geometry, options.lane_height);
            grid.resource = resource.cloned();
            debug!(
                resource = resource.map(|r| r.key.as_str()).unwrap_or("-"),
                placements = grid.placement_count(),
                lanes = grid.lanes,
                "laid out grid"
            );
            grid
        })
        .collect::<Vec<_>>();

    info!(
        days = window.days.len(),
        slots = window.slots.len(),
        grids = grids.len(),
        "week layout ready"
    );

    WeekLayout {
        days: window.days.clone(),
        slots: window.slots.clone(),
        geometry,
        grids,
    }
}
