pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod grid;
pub mod layout;
pub mod navigation;
pub mod render;
pub mod snapshot;
pub mod ticker;
pub mod time_model;
pub mod timeline;
pub mod view_window;

use std::ffi::OsString;
use std::io;

use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting jobgrid CLI"
  );
  debug!(
    view = %cli.view,
    date = ?cli.date,
    now = ?cli.now,
    "requested view"
  );

  let mut session =
    commands::Session::open(&cli)?;
  let renderer =
    render::Renderer::new(cli.format);
  let mut out = io::stdout().lock();

  commands::dispatch(
    &mut session,
    &renderer,
    cli.command,
    &mut out
  )?;

  info!("done");
  Ok(())
}
