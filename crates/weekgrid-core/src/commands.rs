use std::io::{self, Write};

use anyhow::{Context, anyhow};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{parse_reference_date, today_in};
use crate::layout::{WeekLayout, layout_week};
use crate::render::Renderer;
use crate::state::{EventSource, FetchCoordinator, SchedulerState};
use crate::window::Window;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "week", "export", "days", "slots", "commands", "show", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// A laid out week plus the state it was computed from.
#[derive(Debug)]
pub struct WeekView {
    pub window: Window,
    pub state: SchedulerState,
    pub layout: WeekLayout,
}

#[derive(Debug, Serialize)]
struct ExportPayload<'a> {
    reference_date: chrono::NaiveDate,
    timezone: String,
    layout: &'a WeekLayout,
}

#[instrument(skip(source, cfg, renderer, inv))]
pub fn dispatch<S>(
    source: &S,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()>
where
    S: EventSource + ?Sized,
{
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    let mut out = io::stdout().lock();
    match command {
        "week" => {
            let view = build_week(source, cfg, &inv.command_args)?;
            renderer.write_week(&mut out, &view.layout, &view.window, &view.state.events)
        }
        "export" => cmd_export(&mut out, source, cfg, &inv.command_args),
        "days" => {
            let window = build_window(cfg, &inv.command_args)?;
            renderer.write_days(&mut out, &window.days)
        }
        "slots" => {
            let view = build_week(source, cfg, &inv.command_args)?;
            renderer.write_slots(&mut out, &view.layout)
        }
        "commands" => cmd_commands(&mut out),
        "show" => cmd_show(&mut out, cfg),
        "help" => cmd_help(&mut out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Builds the visible window for the optional date argument.
#[instrument(skip(cfg, args))]
pub fn build_window(cfg: &Config, args: &[String]) -> anyhow::Result<Window> {
    let window_config = cfg.window_config();
    let today = today_in(window_config.timezone);
    let reference_date = match args.first() {
        Some(raw) => parse_reference_date(raw, today)?,
        None => today,
    };
    if args.len() > 1 {
        warn!(extra = ?&args[1..], "ignoring extra arguments");
    }

    let holidays = cfg.holidays()?;
    Ok(Window::build(reference_date, &window_config, &holidays))
}

/// Window, fetch and layout for one invocation.
#[instrument(skip(source, cfg, args))]
pub fn build_week<S>(source: &S, cfg: &Config, args: &[String]) -> anyhow::Result<WeekView>
where
    S: EventSource + ?Sized,
{
    let window = build_window(cfg, args)?;
    let initial = SchedulerState::new(window.reference_date);
    let state = match window.range() {
        Some(range) => FetchCoordinator::new().refresh(source, range, &initial),
        None => {
            warn!("no visible days; skipping event fetch");
            initial
        }
    };

    let resources = cfg.resources();
    let layout = layout_week(&state.events, &window, &resources, &cfg.layout_options());
    info!(
        reference_date = %window.reference_date,
        events = state.events.len(),
        grids = layout.grids.len(),
        "week built"
    );

    Ok(WeekView {
        window,
        state,
        layout,
    })
}

#[instrument(skip(out, source, cfg, args))]
fn cmd_export<W, S>(out: &mut W, source: &S, cfg: &Config, args: &[String]) -> anyhow::Result<()>
where
    W: Write,
    S: EventSource + ?Sized,
{
    info!("command export");
    let view = build_week(source, cfg, args)?;
    let payload = ExportPayload {
        reference_date: view.window.reference_date,
        timezone: view.window.timezone.name().to_string(),
        layout: &view.layout,
    };
    let text = serde_json::to_string_pretty(&payload).context("failed to serialize layout")?;
    writeln!(out, "{text}")?;
    Ok(())
}

fn cmd_commands<W: Write>(out: &mut W) -> anyhow::Result<()> {
    for command in known_command_names() {
        writeln!(out, "{command}")?;
    }
    Ok(())
}

fn cmd_show<W: Write>(out: &mut W, cfg: &Config) -> anyhow::Result<()> {
    let mut entries = cfg.iter().collect::<Vec<_>>();
    entries.sort();
    for (k, v) in entries {
        writeln!(out, "{k}={v}")?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Commands: week [DATE], export [DATE], days [DATE], slots [DATE], commands, show, help, version"
    )?;
    writeln!(
        out,
        "DATE: today, tomorrow, yesterday, a weekday name, +3d, -1w or YYYY-MM-DD"
    )?;
    Ok(())
}
