//! Lane assignment for events spanning more than one calendar day.
//!
//! Lanes are handed out day by day, in window order. A day's candidates are
//! the events whose first visible column is that day; events that started
//! before the window are candidates of the first column. Within a day,
//! candidates ending later go first so long runs keep low lanes.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, trace};

use crate::event::{Event, EventId};
use crate::window::Window;

/// Vertical offset of lane 0 inside the day header.
pub const HEADER_BASE: f64 = 45.0;

pub const DEFAULT_LANE_HEIGHT: f64 = 28.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiDayPlacement {
    pub event_id: EventId,
    pub lane: usize,
    pub start_day_index: usize,
    pub span_days: usize,
    pub clipped_start: bool,
    pub clipped_end: bool,
}

impl MultiDayPlacement {
    pub fn end_day_index(&self) -> usize {
        self.start_day_index + self.span_days - 1
    }

    pub fn covers(&self, day_index: usize) -> bool {
        self.start_day_index <= day_index && day_index <= self.end_day_index()
    }

    pub fn top(&self, lane_height: f64) -> f64 {
        self.lane as f64 * lane_height + HEADER_BASE
    }
}

/// Lanes in use, i.e. one past the highest lane index.
pub fn lane_count(placements: &[MultiDayPlacement]) -> usize {
    placements.iter().map(|p| p.lane + 1).max().unwrap_or(0)
}

/// Header height shared by every column so the multi-day rows line up.
pub fn header_height(placements: &[MultiDayPlacement], lane_height: f64) -> f64 {
    lane_count(placements) as f64 * lane_height + HEADER_BASE
}

struct Candidate<'a> {
    event: &'a Event,
    start: NaiveDate,
    end: NaiveDate,
    first_col: usize,
    last_col: usize,
}

#[tracing::instrument(skip_all, fields(events = events.len()))]
pub fn assign_lanes(events: &[&Event], window: &Window) -> Vec<MultiDayPlacement> {
    let (Some(first_day), Some(last_day)) = (window.first_day(), window.last_day()) else {
        return Vec::new();
    };

    let mut by_column: Vec<Vec<Candidate<'_>>> = window.days.iter().map(|_| Vec::new()).collect();
    for event in events {
        let start = window.local_date(event.start);
        let end = window.local_date(event.end).max(start);
        let first_col = window.days.iter().position(|day| day.date >= start);
        let last_col = window.days.iter().rposition(|day| day.date <= end);
        match (first_col, last_col) {
            (Some(first_col), Some(last_col)) if first_col <= last_col => {
                by_column[first_col].push(Candidate {
                    event,
                    start,
                    end,
                    first_col,
                    last_col,
                });
            }
            _ => trace!(id = %event.id, "multi-day event touches no column"),
        }
    }

    let mut placed: Vec<MultiDayPlacement> = Vec::new();
    for (col, mut candidates) in by_column.into_iter().enumerate() {
        if candidates.is_empty() {
            continue;
        }
        candidates.sort_by(|a, b| {
            b.event
                .end
                .cmp(&a.event.end)
                .then_with(|| a.event.start.cmp(&b.event.start))
                .then_with(|| a.event.id.cmp(&b.event.id))
        });

        let carried = placed
            .iter()
            .filter(|p| p.start_day_index < col && p.end_day_index() >= col)
            .collect::<Vec<_>>();
        let mut taken = carried.iter().map(|p| p.lane).collect::<BTreeSet<_>>();
        let base = carried.len();

        for (i, candidate) in candidates.into_iter().enumerate() {
            let mut lane = base + i;
            while taken.contains(&lane) {
                lane += 1;
            }
            if lane != base + i {
                trace!(id = %candidate.event.id, wanted = base + i, lane, "lane bumped past occupied lane");
            }
            taken.insert(lane);

            placed.push(MultiDayPlacement {
                event_id: candidate.event.id.clone(),
                lane,
                start_day_index: candidate.first_col,
                span_days: (candidate.last_col - candidate.first_col + 1).max(1),
                clipped_start: candidate.start < first_day,
                clipped_end: candidate.end > last_day,
            });
        }
    }

    debug!(
        placements = placed.len(),
        lanes = lane_count(&placed),
        "assigned multi-day lanes"
    );
    placed
}
