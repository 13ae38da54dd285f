use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::event::{Event, EventId};
use crate::layout::{GridLayout, WeekLayout};
use crate::window::{Window, WindowDay};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Text week grid: a lane table for multi-day events, then one row per
    /// single-day placement in column order.
    #[tracing::instrument(skip_all, fields(grids = layout.grids.len()))]
    pub fn write_week<W: Write>(
        &self,
        mut out: W,
        layout: &WeekLayout,
        window: &Window,
        events: &[Event],
    ) -> anyhow::Result<()> {
        let by_id: HashMap<&EventId, &Event> = events.iter().map(|e| (&e.id, e)).collect();
        let title = |id: &EventId| {
            by_id
                .get(id)
                .map(|event| event.title())
                .unwrap_or_else(|| id.to_string())
        };

        if layout.days.is_empty() {
            writeln!(out, "No visible days.")?;
            return Ok(());
        }

        for (idx, grid) in layout.grids.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            if let Some(resource) = &grid.resource {
                writeln!(out, "{}", self.paint(resource.display_name(), "1"))?;
            }

            self.write_lanes(&mut out, grid, &layout.days, &title)?;
            writeln!(out)?;
            self.write_single_day(&mut out, grid, &layout.days, window, &by_id)?;
        }

        Ok(())
    }

    fn write_lanes<W: Write>(
        &self,
        out: &mut W,
        grid: &GridLayout,
        days: &[WindowDay],
        title: &dyn Fn(&EventId) -> String,
    ) -> anyhow::Result<()> {
        let mut headers = vec!["Lane".to_string()];
        headers.extend(days.iter().map(|day| self.day_label(day)));

        let mut rows = Vec::with_capacity(grid.lanes);
        for lane in 0..grid.lanes {
            let mut row = vec![lane.to_string()];
            row.extend(std::iter::repeat_n(String::new(), days.len()));

            for placement in grid.multi_day.iter().filter(|p| p.lane == lane) {
                let first = placement.start_day_index + 1;
                let last = placement.end_day_index() + 1;
                for cell in &mut row[first..=last.min(days.len())] {
                    *cell = "--".to_string();
                }
                let mut label = title(&placement.event_id);
                if placement.clipped_start {
                    label = format!("<{label}");
                }
                row[first] = self.paint(&label, "36");
                if placement.clipped_end && last <= days.len() {
                    row[last] = format!("{}>", strip_ansi(&row[last]));
                }
            }
            rows.push(row);
        }

        write_table(out, headers, rows)
    }

    fn write_single_day<W: Write>(
        &self,
        out: &mut W,
        grid: &GridLayout,
        days: &[WindowDay],
        window: &Window,
        by_id: &HashMap<&EventId, &Event>,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "Day".to_string(),
            "Time".to_string(),
            "Top".to_string(),
            "Height".to_string(),
            "Event".to_string(),
        ];

        let mut rows = Vec::new();
        for day in days {
            for placement in grid.single_day_for(day.date) {
                let (time, name) = match by_id.get(&placement.event_id) {
                    Some(event) => (
                        format!(
                            "{}-{}",
                            window.local(event.start).format("%H:%M"),
                            window.local(event.end).format("%H:%M")
                        ),
                        event.title(),
                    ),
                    None => (String::new(), placement.event_id.to_string()),
                };
                let mut time = time;
                if placement.clipped_top {
                    time = format!("^{time}");
                }
                if placement.clipped_bottom {
                    time = format!("{time}v");
                }
                rows.push(vec![
                    self.day_label(day),
                    time,
                    format!("{:.1}", placement.top),
                    format!("{:.1}", placement.height),
                    name,
                ]);
            }
        }

        if rows.is_empty() {
            writeln!(out, "No single-day events.")?;
            return Ok(());
        }
        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all)]
    pub fn write_days<W: Write>(&self, mut out: W, days: &[WindowDay]) -> anyhow::Result<()> {
        let headers = vec!["#".to_string(), "Date".to_string(), "Day".to_string(), "Holiday".to_string()];
        let rows = days
            .iter()
            .map(|day| {
                vec![
                    day.index.to_string(),
                    day.date.format("%Y-%m-%d").to_string(),
                    day.date.format("%a").to_string(),
                    if day.holiday {
                        self.paint("yes", "31")
                    } else {
                        String::new()
                    },
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    #[tracing::instrument(skip_all)]
    pub fn write_slots<W: Write>(&self, mut out: W, layout: &WeekLayout) -> anyhow::Result<()> {
        let headers = vec!["Start".to_string(), "Minutes".to_string(), "Height".to_string()];
        let rows = layout
            .slots
            .iter()
            .map(|slot| {
                vec![
                    slot.start.format("%H:%M").to_string(),
                    slot.minutes.to_string(),
                    format!(
                        "{:.1}",
                        layout.geometry.minutes_to_units(f64::from(slot.minutes))
                    ),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    fn day_label(&self, day: &WindowDay) -> String {
        let label = day.date.format("%a %m-%d").to_string();
        if day.holiday {
            self.paint(&format!("{label}*"), "31")
        } else {
            label
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(header).as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        let visible_width = UnicodeWidthStr::width(strip_ansi(header).as_str());
        let padding = widths[idx].saturating_sub(visible_width);
        write!(writer, "{}{} ", header, " ".repeat(padding))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::holiday::HolidaySet;
    use crate::layout::{LayoutOptions, layout_week};
    use crate::window::WindowConfig;

    #[test]
    fn strips_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }

    #[test]
    fn week_text_marks_holidays_and_continuations() {
        let config = WindowConfig {
            included_days: vec![0, 1, 2, 3, 4],
            ..WindowConfig::default()
        };
        let holidays = HolidaySet::parse_list("2022-03-25").expect("holidays");
        let window = Window::build(
            NaiveDate::from_ymd_opt(2022, 3, 23).expect("date"),
            &config,
            &holidays,
        );
        let at = |d: u32, h: u32| {
            Utc.with_ymd_and_hms(2022, 3, d, h, 0, 0)
                .single()
                .expect("instant")
        };
        let events = vec![
            Event::new("trip", at(23, 9), at(30, 9)).with_title("Trip"),
            Event::new("sync", at(21, 10), at(21, 11)).with_title("Sync"),
        ];
        let layout = layout_week(&events, &window, &[], &LayoutOptions::default());

        let mut buf = Vec::new();
        Renderer::plain()
            .write_week(&mut buf, &layout, &window, &events)
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");

        assert!(text.contains("Fri 03-25*"));
        assert!(text.contains("Trip"));
        assert!(text.contains("-->"));
        assert!(text.contains("10:00-11:00"));
        assert!(text.contains("Sync"));
    }
}
