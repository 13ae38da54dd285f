//! Visible window: the ordered day columns and the per-day slot band.
//!
//! Slot times are shared by every column; a column applies them to its own
//! date when rendering. The band is `[start_hour, end_hour)` and the last
//! slot keeps whatever is left of it when `step` does not divide the band.

use chrono::{
  DateTime,
  Duration,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{
  debug,
  warn
};

use crate::datetime::{
  add_days,
  local_to_utc,
  start_of_week
};
use crate::holiday::HolidayPredicate;

/// Floor for a slot cell when the grid height is shared out.
pub const MIN_CELL_HEIGHT: f64 = 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
  pub week_start:    Weekday,
  /// Offsets from the first day of the week, each in `0..=6`.
  pub included_days: Vec<u8>,
  pub start_hour:    u32,
  pub end_hour:      u32,
  pub step_minutes:  u32,
  pub timezone:      Tz
}

impl Default for WindowConfig {
  fn default() -> Self {
    Self {
      week_start:    Weekday::Mon,
      included_days: (0..7).collect(),
      start_hour:    9,
      end_hour:      17,
      step_minutes:  60,
      timezone:      chrono_tz::UTC
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
  Serialize,
)]
pub struct WindowDay {
  pub index:   usize,
  pub date:    NaiveDate,
  pub holiday: bool
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
  Serialize,
)]
pub struct Slot {
  pub start:   NaiveTime,
  /// Visible length, shorter than the step for a trailing partial slot.
  pub minutes: u32
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
  Serialize,
)]
pub struct DateRange {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>
}

#[derive(
  Debug, Clone, Copy, PartialEq,
  Serialize,
)]
pub struct SlotGeometry {
  pub slot_count:    usize,
  pub step_minutes:  u32,
  pub band_minutes:  u32,
  pub cell_height:   f64,
  pub minute_height: f64,
  pub total_height:  f64
}

impl SlotGeometry {
  /// Shares `grid_height` between the slots, never below
  /// [`MIN_CELL_HEIGHT`] per cell.
  pub fn fit(
    window: &Window,
    grid_height: f64
  ) -> Self {
    let slots = window.slots.len().max(1);
    let cell_height = (grid_height
      / slots as f64)
      .max(MIN_CELL_HEIGHT);
    Self::with_cell_height(
      window,
      cell_height
    )
  }

  pub fn with_cell_height(
    window: &Window,
    cell_height: f64
  ) -> Self {
    let step = window.step_minutes;
    let minute_height = if step == 0 {
      0.0
    } else {
      cell_height / f64::from(step)
    };
    let mut geometry = Self {
      slot_count: window.slots.len(),
      step_minutes: step,
      band_minutes: window.band_minutes(),
      cell_height,
      minute_height,
      total_height: 0.0
    };
    geometry.total_height = geometry
      .minutes_to_units(f64::from(
        geometry.band_minutes
      ));
    geometry
  }

  /// Scales minutes through the cell height first so whole slots map to
  /// exact multiples of it.
  pub fn minutes_to_units(
    &self,
    minutes: f64
  ) -> f64 {
    if self.step_minutes == 0 {
      return 0.0;
    }
    minutes * self.cell_height
      / f64::from(self.step_minutes)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Window {
  pub reference_date: NaiveDate,
  pub timezone:       Tz,
  pub days:           Vec<WindowDay>,
  pub slots:          Vec<Slot>,
  pub start_hour:     u32,
  pub end_hour:       u32,
  pub step_minutes:   u32
}

impl Window {
  #[tracing::instrument(skip(config, holidays))]
  pub fn build(
    reference_date: NaiveDate,
    config: &WindowConfig,
    holidays: &dyn HolidayPredicate
  ) -> Self {
    let week_start = start_of_week(
      reference_date,
      config.week_start
    );

    let mut offsets =
      config.included_days.clone();
    offsets.retain(|offset| {
      if *offset > 6 {
        warn!(
          offset,
          "ignoring weekday offset outside 0..=6"
        );
        false
      } else {
        true
      }
    });
    offsets.sort_unstable();
    offsets.dedup();

    let days = offsets
      .iter()
      .enumerate()
      .map(|(index, offset)| {
        let date = add_days(
          week_start,
          i64::from(*offset)
        );
        WindowDay {
          index,
          date,
          holiday: holidays
            .is_holiday(date)
        }
      })
      .collect::<Vec<_>>();

    let slots = build_slots(
      config.start_hour,
      config.end_hour,
      config.step_minutes
    );

    debug!(
      %week_start,
      days = days.len(),
      slots = slots.len(),
      "built window"
    );

    Self {
      reference_date,
      timezone: config.timezone,
      days,
      slots,
      start_hour: config.start_hour,
      end_hour: config.end_hour,
      step_minutes: config.step_minutes
    }
  }

  /// No columns or no visible band; every layout pass is a no-op.
  pub fn is_empty(&self) -> bool {
    self.days.is_empty()
      || self.slots.is_empty()
  }

  pub fn first_day(
    &self
  ) -> Option<NaiveDate> {
    self.days.first().map(|d| d.date)
  }

  pub fn last_day(
    &self
  ) -> Option<NaiveDate> {
    self.days.last().map(|d| d.date)
  }

  /// Minutes covered by the band, zero when the hours are inverted.
  pub fn band_minutes(&self) -> u32 {
    let end = self.end_hour.min(24) * 60;
    let start =
      self.start_hour.saturating_mul(60);
    end.saturating_sub(start)
  }

  pub fn local(
    &self,
    instant: DateTime<Utc>
  ) -> NaiveDateTime {
    instant
      .with_timezone(&self.timezone)
      .naive_local()
  }

  pub fn local_date(
    &self,
    instant: DateTime<Utc>
  ) -> NaiveDate {
    self.local(instant).date()
  }

  /// Local start of the band on `date`.
  pub fn band_start(
    &self,
    date: NaiveDate
  ) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
      + Duration::hours(i64::from(
        self.start_hour
      ))
  }

  /// UTC span from the start of the first day to the end of the last one,
  /// used as the event fetch query.
  pub fn range(
    &self
  ) -> Option<DateRange> {
    let first = self.first_day()?;
    let last = self.last_day()?;
    let start = local_to_utc(
      self.timezone,
      first.and_time(NaiveTime::MIN)
    );
    let end = local_to_utc(
      self.timezone,
      add_days(last, 1)
        .and_time(NaiveTime::MIN)
    ) - Duration::milliseconds(1);
    Some(DateRange { start, end })
  }
}

fn build_slots(
  start_hour: u32,
  end_hour: u32,
  step_minutes: u32
) -> Vec<Slot> {
  if step_minutes == 0 {
    warn!(
      "slot step is zero; no slots"
    );
    return Vec::new();
  }

  let start =
    start_hour.saturating_mul(60);
  let end = end_hour.min(24) * 60;
  let mut slots = Vec::new();
  let mut minute = start;
  while minute < end {
    let Some(time) =
      NaiveTime::from_num_seconds_from_midnight_opt(
        minute * 60,
        0
      )
    else {
      break;
    };
    slots.push(Slot {
      start:   time,
      minutes: step_minutes
        .min(end - minute)
    });
    let Some(next) =
      minute.checked_add(step_minutes)
    else {
      break;
    };
    minute = next;
  }
  slots
}
