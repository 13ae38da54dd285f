use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Weekday;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::datetime::{
  parse_timezone,
  parse_week_start,
  project_timezone
};
use crate::holiday::HolidaySet;
use crate::layout::{
  DEFAULT_GRID_HEIGHT,
  LayoutOptions
};
use crate::lanes::DEFAULT_LANE_HEIGHT;
use crate::resource::{
  DEFAULT_RESOURCE_FIELD,
  Resource,
  parse_resource_list
};
use crate::window::WindowConfig;

const RC_ENV_VAR: &str = "WEEKGRID_RC";
const RC_FILE_NAME: &str =
  ".weekgridrc";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::defaults();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading weekgridrc");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no weekgridrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  /// Built-in values only, no file lookup.
  pub fn defaults() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      (
        "data.location",
        "~/.weekgrid/events.jsonl"
      ),
      ("default.command", "week"),
      ("color", "on"),
      ("week.start", "monday"),
      ("week.days", "0,1,2,3,4,5,6"),
      ("day.start_hour", "9"),
      ("day.end_hour", "17"),
      ("day.step", "60"),
      (
        "resource.field",
        DEFAULT_RESOURCE_FIELD
      ),
      (
        "timezone",
        project_timezone().name()
      )
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    Config {
      map,
      loaded_files: vec![]
    }
  }

  /// Parses rc text as if it were a file in `base_dir`.
  pub fn load_str(
    &mut self,
    text: &str,
    base_dir: &Path
  ) -> anyhow::Result<()> {
    self.load_lines(
      text,
      base_dir,
      Path::new("<inline>")
    )
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  /// Window settings, sanitized: bad values fall back to defaults with a
  /// warning instead of failing.
  #[tracing::instrument(skip(self))]
  pub fn window_config(
    &self
  ) -> WindowConfig {
    let defaults =
      WindowConfig::default();

    let week_start = self
      .get("week.start")
      .and_then(|raw| {
        let parsed =
          parse_week_start(&raw);
        if parsed.is_none() {
          warn!(value = %raw, "invalid week.start; using default");
        }
        parsed
      })
      .unwrap_or(defaults.week_start);

    let included_days = self
      .get("week.days")
      .map(|raw| {
        parse_included_days(
          &raw, week_start
        )
      })
      .unwrap_or(
        defaults.included_days.clone()
      );

    let mut config = WindowConfig {
      week_start,
      included_days,
      start_hour: self.get_u32(
        "day.start_hour",
        defaults.start_hour
      ),
      end_hour: self.get_u32(
        "day.end_hour",
        defaults.end_hour
      ),
      step_minutes: self.get_u32(
        "day.step",
        defaults.step_minutes
      ),
      timezone: *project_timezone()
    };

    if let Some(raw) =
      self.get("timezone")
      && let Some(tz) = parse_timezone(
        &raw,
        "config:timezone"
      )
    {
      config.timezone = tz;
    }

    sanitize_window_config(
      &mut config
    );
    config
  }

  pub fn layout_options(
    &self
  ) -> LayoutOptions {
    LayoutOptions {
      grid_height: self.get_f64(
        "grid.height",
        DEFAULT_GRID_HEIGHT
      ),
      lane_height: self.get_f64(
        "grid.lane_height",
        DEFAULT_LANE_HEIGHT
      )
    }
  }

  pub fn holidays(
    &self
  ) -> anyhow::Result<HolidaySet> {
    match self.get("holidays") {
      | Some(raw)
        if !raw.trim().is_empty() =>
      {
        HolidaySet::parse_list(&raw)
          .context(
            "invalid holidays setting"
          )
      }
      | _ => Ok(HolidaySet::default())
    }
  }

  pub fn resources(
    &self
  ) -> Vec<Resource> {
    self
      .get("resources")
      .map(|raw| {
        parse_resource_list(&raw)
      })
      .unwrap_or_default()
  }

  pub fn resource_field(
    &self
  ) -> String {
    self
      .get("resource.field")
      .filter(|v| !v.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_RESOURCE_FIELD
          .to_string()
      })
  }

  fn get_u32(
    &self,
    key: &str,
    default: u32
  ) -> u32 {
    match self.get(key) {
      | None => default,
      | Some(raw) => {
        match raw.trim().parse::<u32>()
        {
          | Ok(value) => value,
          | Err(err) => {
            warn!(key, value = %raw, error = %err, "invalid number; using default");
            default
          }
        }
      }
    }
  }

  fn get_f64(
    &self,
    key: &str,
    default: f64
  ) -> f64 {
    match self.get(key) {
      | None => default,
      | Some(raw) => {
        match raw.trim().parse::<f64>()
        {
          | Ok(value)
            if value.is_finite()
              && value > 0.0 =>
          {
            value
          }
          | _ => {
            warn!(key, value = %raw, "invalid length; using default");
            default
          }
        }
      }
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    self.load_lines(
      &text, &base_dir, &path
    )
  }

  fn load_lines(
    &mut self,
    text: &str,
    base_dir: &Path,
    path: &Path
  ) -> anyhow::Result<()> {
    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

fn sanitize_window_config(
  config: &mut WindowConfig
) {
  if config.start_hour > 24 {
    warn!(
      start_hour = config.start_hour,
      "day.start_hour above 24"
    );
    config.start_hour = 24;
  }
  if config.end_hour > 24 {
    warn!(
      end_hour = config.end_hour,
      "day.end_hour above 24"
    );
    config.end_hour = 24;
  }
  if config.start_hour
    >= config.end_hour
  {
    warn!(
      start_hour = config.start_hour,
      end_hour = config.end_hour,
      "empty day band; no slots will be shown"
    );
  }
  if config.step_minutes == 0 {
    warn!(
      "day.step must be positive; \
       using 60"
    );
    config.step_minutes = 60;
  }
}

/// `week.days` accepts offsets from the week start (`0..=6`) or weekday
/// names, comma or space separated.
fn parse_included_days(
  raw: &str,
  week_start: Weekday
) -> Vec<u8> {
  let mut out = Vec::new();
  for token in raw
    .split(|c: char| {
      c == ',' || c.is_whitespace()
    })
    .filter(|t| !t.is_empty())
  {
    let offset = match token
      .parse::<u8>()
    {
      | Ok(n) => Some(n),
      | Err(_) => {
        parse_week_start(token).map(
          |day| {
            let from = week_start
              .num_days_from_monday();
            let to = day
              .num_days_from_monday();
            ((7 + to - from) % 7) as u8
          }
        )
      }
    };
    match offset {
      | Some(n) => out.push(n),
      | None => {
        warn!(token, "ignoring unknown week.days entry")
      }
    }
  }
  out
}

#[tracing::instrument(skip(
  cfg,
  override_path
))]
pub fn resolve_events_path(
  cfg: &Config,
  override_path: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(path) = override_path {
    return Ok(path.to_path_buf());
  }
  let value = cfg
    .get("data.location")
    .ok_or_else(|| {
      anyhow!(
        "data.location is not set"
      )
    })?;
  Ok(expand_tilde(Path::new(&value)))
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory"
    );
    return Ok(None);
  };
  let candidate =
    home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
