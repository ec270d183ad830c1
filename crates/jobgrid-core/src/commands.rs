use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::cli::{Command, GlobalCli};
use crate::config::CalendarConfig;
use crate::datetime::{Clock, FixedClock, SystemClock, parse_date, parse_date_time, resolve_timezone};
use crate::grid::{CalendarGrid, GridFrame, GridInput};
use crate::navigation::{NavEvent, NavigationController, ViewState};
use crate::render::Renderer;
use crate::snapshot::Snapshot;
use crate::ticker::IndicatorTicker;
use crate::view_window::{ViewMode, ViewWindow};

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Everything a command needs: resolved config, loaded jobs, the clock
/// and the starting view.
pub struct Session {
    pub config: CalendarConfig,
    pub snapshot: Snapshot,
    pub grid: CalendarGrid,
    pub clock: SharedClock,
    pub state: ViewState,
}

impl Session {
    #[instrument(skip_all)]
    pub fn open(cli: &GlobalCli) -> anyhow::Result<Self> {
        let config = CalendarConfig::load(cli.config.as_deref())?;
        let snapshot = Snapshot::load_optional(cli.jobs.as_deref())?;

        let clock: SharedClock = match cli.now.as_deref() {
            Some(raw) => Arc::new(FixedClock(
                parse_date_time(raw).with_context(|| format!("invalid --now value {raw:?}"))?,
            )),
            None => Arc::new(SystemClock::new(resolve_timezone(
                config.timezone.as_deref(),
            ))),
        };

        let anchor = cli
            .date
            .as_deref()
            .map(parse_date)
            .transpose()
            .context("invalid --date value")?;

        Self::new(config, snapshot, clock, cli.view, anchor)
    }

    pub fn new(
        config: CalendarConfig,
        snapshot: Snapshot,
        clock: SharedClock,
        view: ViewMode,
        anchor: Option<NaiveDate>,
    ) -> anyhow::Result<Self> {
        let grid = CalendarGrid::from_config(&config).context("invalid day view settings")?;
        let state = ViewState::new(view, anchor.unwrap_or_else(|| clock.today()));

        debug!(
            view = %state.view,
            anchor = %state.anchor_date,
            jobs = snapshot.jobs.len(),
            "calendar session ready"
        );

        Ok(Self {
            config,
            snapshot,
            grid,
            clock,
            state,
        })
    }

    pub fn window(&self) -> ViewWindow {
        self.state.window(self.grid.week_start())
    }

    pub fn frame(&self) -> GridFrame {
        self.grid.compose(&GridInput {
            state: self.state,
            jobs: &self.snapshot.jobs,
            staff: &self.snapshot.staff,
            capabilities: self.snapshot.capabilities,
            now: self.clock.now(),
        })
    }
}

#[instrument(skip(session, renderer, out))]
pub fn dispatch<W: Write>(
    session: &mut Session,
    renderer: &Renderer,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Window => renderer.print_window(out, &session.window()),
        Command::Layout => cmd_layout(session, renderer, out),
        Command::Now => cmd_now(session, renderer, out),
        Command::Grid => renderer.print_frame(out, &session.frame()),
        Command::Nav { events } => cmd_nav(session, renderer, &events, out),
        Command::Hit { x, y, double } => cmd_hit(session, renderer, x, y, double, out),
        Command::Watch { ticks, every } => cmd_watch(session, renderer, ticks, every, out),
    }
}

fn cmd_layout<W: Write>(session: &Session, renderer: &Renderer, out: &mut W) -> anyhow::Result<()> {
    let window = session.window();
    if !window.view.is_timed() {
        info!("month view has no hour grid; showing the week around the anchor");
    }
    let days = if window.view.is_timed() {
        window.days
    } else {
        session.state.with_view(ViewMode::Week).window(session.grid.week_start()).days
    };

    let (rects, report) = session
        .grid
        .engine()
        .compute_with_report(&session.snapshot.jobs, &days);
    renderer.print_layout(out, &rects, &report)
}

fn cmd_now<W: Write>(session: &Session, renderer: &Renderer, out: &mut W) -> anyhow::Result<()> {
    let frame = session.frame();
    renderer.print_indicator(out, &frame.indicator)
}

fn cmd_nav<W: Write>(
    session: &mut Session,
    renderer: &Renderer,
    events: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    let events = events
        .iter()
        .map(|raw| raw.parse::<NavEvent>())
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse navigation events")?;

    let mut nav = NavigationController::new(session.state, Arc::clone(&session.clock));
    for event in events {
        let state = nav.apply(event);
        renderer.print_state(out, &state)?;
    }

    session.state = nav.state();
    renderer.print_window(out, &session.window())
}

fn cmd_hit<W: Write>(
    session: &Session,
    renderer: &Renderer,
    x: f64,
    y: f64,
    double: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    let frame = session.frame();
    let hit = frame.hit_test(x, y);
    let dispatch = frame
        .action_for_click(x, y, double)
        .map(|action| action.dispatch(&frame));

    debug!(x, y, double, ?hit, "resolved grid click");
    renderer.print_hit(out, hit.as_ref(), dispatch.as_ref())
}

fn cmd_watch<W: Write>(
    session: &Session,
    renderer: &Renderer,
    ticks: usize,
    every: Option<u64>,
    out: &mut W,
) -> anyhow::Result<()> {
    if ticks == 0 {
        return Err(anyhow!("watch needs at least one tick"));
    }

    let period = every
        .map(Duration::from_secs)
        .unwrap_or_else(|| session.config.refresh_interval());
    let ticker = IndicatorTicker::new(period);
    let window = session.window();
    let model = *session.grid.engine().model();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to start the ticker runtime")?;

    runtime.block_on(async {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ticker.spawn_indicator(
            Arc::clone(&session.clock),
            window.days,
            model,
            move |indicator| {
                let _ = tx.send(indicator);
            },
        );

        let mut seen = 0;
        while seen < ticks {
            let Some(indicator) = rx.recv().await else {
                break;
            };
            seen += 1;
            renderer.print_indicator(&mut *out, &indicator)?;
            out.flush()?;
        }

        handle.stop().await;
        info!(ticks = seen, "indicator watch finished");
        Ok::<(), anyhow::Error>(())
    })
}
