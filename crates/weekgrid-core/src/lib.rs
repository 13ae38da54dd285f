pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod event;
pub mod holiday;
pub mod lanes;
pub mod layout;
pub mod partition;
pub mod render;
pub mod resource;
pub mod stack;
pub mod state;
pub mod window;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use event::{
  Event,
  EventId,
  ResourceKey,
  ResourceKeys
};
pub use holiday::{
  HolidayPredicate,
  HolidaySet,
  NoHolidays
};
pub use layout::{
  GridLayout,
  LayoutOptions,
  WeekLayout,
  layout_week
};
pub use resource::Resource;
pub use window::{
  SlotGeometry,
  Window,
  WindowConfig
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting weekgrid"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  if !needs_events(&inv.command) {
    return commands::dispatch(
      &state::NoEvents,
      &cfg,
      &renderer,
      inv
    );
  }

  let events_path =
    config::resolve_events_path(
      &cfg,
      cli.events.as_deref()
    )
    .context(
      "failed to resolve events \
       file"
    )?;

  let store =
    datastore::DataStore::open(
      &events_path,
      &cfg.resource_field()
    )
    .with_context(|| {
      format!(
        "failed to open events at {}",
        events_path.display()
      )
    })?;

  commands::dispatch(
    &store, &cfg, &renderer, inv
  )?;

  info!("done");
  Ok(())
}

fn needs_events(command: &str) -> bool {
  matches!(
    command,
    "week" | "export"
  )
}
