use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::render::OutputFormat;
use crate::view_window::ViewMode;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "jobgrid",
    version,
    about = "Job dispatch calendar: time grid layout and navigation",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Path to jobgrid.toml.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// JSON job snapshot: `{jobs, staff, capabilities}` or a bare job array.
    #[arg(long = "jobs", global = true)]
    pub jobs: Option<PathBuf>,

    #[arg(long = "view", value_parser = parse_view, default_value = "week", global = true)]
    pub view: ViewMode,

    /// Anchor date, YYYY-MM-DD. Defaults to today.
    #[arg(long = "date", global = true)]
    pub date: Option<String>,

    /// Pin the clock, "YYYY-MM-DD HH:MM".
    #[arg(long = "now", global = true)]
    pub now: Option<String>,

    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Days and title of the current window.
    Window,
    /// Card rectangles for the day and week grids.
    Layout,
    /// Position of the current-time marker.
    Now,
    /// Full draw list for the current view.
    Grid,
    /// Apply navigation events (next, prev, today, view:month, zoom:DATE, select:DATE).
    Nav {
        #[arg(required = true)]
        events: Vec<String>,
    },
    /// Resolve a click at grid coordinates.
    Hit {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
        #[arg(long)]
        double: bool,
    },
    /// Run the indicator ticker and print each tick.
    Watch {
        #[arg(long, default_value_t = 3)]
        ticks: usize,
        /// Override the configured refresh period.
        #[arg(long)]
        every: Option<u64>,
    },
}

fn parse_view(raw: &str) -> Result<ViewMode, String> {
    raw.parse::<ViewMode>()
}

/// Env var holding a full filter directive. `RUST_LOG` is read when it is unset.
pub const LOG_ENV_VAR: &str = "JOBGRID_LOG";

/// Filter directive for the `-v`/`-q` counts. Our crates follow the flags;
/// dependencies stay at `warn` unless `-vvv` asks for everything.
pub fn log_directives(verbose: u8, quiet: u8) -> String {
    let ours = match (quiet, verbose) {
        (2.., _) => return "error".to_string(),
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, _) => return "trace".to_string(),
    };
    format!("warn,jobgrid_core={ours},jobgrid_shared={ours}")
}

fn env_filter(verbose: u8, quiet: u8) -> anyhow::Result<EnvFilter> {
    for var in [LOG_ENV_VAR, EnvFilter::DEFAULT_ENV] {
        if let Ok(raw) = std::env::var(var)
            && !raw.trim().is_empty()
        {
            return EnvFilter::try_new(&raw).map_err(|e| anyhow!("invalid {var} filter {raw:?}: {e}"));
        }
    }
    EnvFilter::try_new(log_directives(verbose, quiet))
        .map_err(|e| anyhow!("invalid log filter: {e}"))
}

/// Logs go to stderr so command output on stdout stays parseable.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let filter = env_filter(verbose, quiet)?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .without_time()
        .compact()
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already installed");
    }

    Ok(())
}
