//! Render boundary of the calendar.
//!
//! `CalendarGrid` runs the window, layout and indicator engines for one
//! `ViewState` and flattens the result into draw instructions. A
//! renderer only has to paint `GridFrame::ops` in order; everything
//! positional is already resolved.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use jobgrid_shared::{Capabilities, Job, JobStatus, Staff};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::CalendarConfig;
use crate::error::Result;
use crate::layout::{JobRectangle, LayoutEngine, LayoutReport, PeriodStats};
use crate::navigation::{NavEvent, ViewState};
use crate::time_model::{ClockTime, TimeModel};
use crate::timeline::{Indicator, TimelineIndicator};
use crate::view_window::{DayColumn, ViewMode, ViewWindow};

pub const UNASSIGNED_COLOR: &str = "#7f8691";
const HEADER_HEIGHT: f64 = 24.0;
const CHIP_HEIGHT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardAction {
    Move,
    Extend,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chip {
    pub job_id: String,
    pub label: String,
    pub status: JobStatus,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    HourLine {
        top: f64,
        label: String,
    },
    DayHeader {
        day_index: usize,
        left: f64,
        width: f64,
        label: String,
        is_today: bool,
        is_selected: bool,
    },
    Card {
        rect: JobRectangle,
        title: String,
        subtitle: String,
        status: JobStatus,
        color: String,
        actions: Vec<CardAction>,
    },
    Cell {
        day_index: usize,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        label: String,
        outside: bool,
        is_today: bool,
        is_selected: bool,
        chips: Vec<Chip>,
        overflow: Option<String>,
    },
    NowLine {
        day_index: usize,
        left: f64,
        width: f64,
        top: f64,
        label: String,
    },
}

/// Everything one render pass needs.
#[derive(Debug, Clone)]
pub struct GridInput<'a> {
    pub state: ViewState,
    pub jobs: &'a [Job],
    pub staff: &'a [Staff],
    pub capabilities: Capabilities,
    pub now: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridFrame {
    pub view: ViewMode,
    pub title: String,
    pub days: Vec<DayColumn>,
    pub header_labels: Vec<String>,
    pub width: f64,
    pub height: f64,
    pub column_width: f64,
    pub cell_height: f64,
    pub indicator: Indicator,
    pub rects: Vec<JobRectangle>,
    pub ops: Vec<DrawOp>,
    pub stats: PeriodStats,
    pub report: LayoutReport,
    #[serde(skip)]
    model: TimeModel,
    #[serde(skip)]
    snap_minutes: u32,
    #[serde(skip)]
    default_duration_minutes: u32,
    #[serde(skip)]
    can_create: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "hit", rename_all = "snake_case")]
pub enum GridHit {
    Job { job_id: String },
    Slot { date: NaiveDate, time: ClockTime },
    Day { date: NaiveDate },
}

/// User gestures the render boundary reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum GridAction {
    Next,
    Previous,
    Today,
    SetView(ViewMode),
    ZoomToWeek(NaiveDate),
    OpenJob(String),
    EditJob(String),
    CreateAt { date: NaiveDate, time: ClockTime },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", content = "value", rename_all = "snake_case")]
pub enum JobIntent {
    Open(String),
    Edit(String),
    Create(Job),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "target", content = "value", rename_all = "snake_case")]
pub enum Dispatch {
    Navigate(NavEvent),
    Job(JobIntent),
}

impl GridAction {
    pub fn into_nav_event(self) -> Option<NavEvent> {
        match self {
            GridAction::Next => Some(NavEvent::Next),
            GridAction::Previous => Some(NavEvent::Previous),
            GridAction::Today => Some(NavEvent::Today),
            GridAction::SetView(view) => Some(NavEvent::SetView(view)),
            GridAction::ZoomToWeek(date) => Some(NavEvent::ZoomToWeek(date)),
            GridAction::OpenJob(_) | GridAction::EditJob(_) | GridAction::CreateAt { .. } => None,
        }
    }

    /// Navigation gestures go to the controller, job gestures to the
    /// job collaborator.
    pub fn dispatch(self, frame: &GridFrame) -> Dispatch {
        match self {
            GridAction::OpenJob(job_id) => Dispatch::Job(JobIntent::Open(job_id)),
            GridAction::EditJob(job_id) => Dispatch::Job(JobIntent::Edit(job_id)),
            GridAction::CreateAt { date, time } => {
                Dispatch::Job(JobIntent::Create(frame.draft_job(date, time)))
            }
            GridAction::Next => Dispatch::Navigate(NavEvent::Next),
            GridAction::Previous => Dispatch::Navigate(NavEvent::Previous),
            GridAction::Today => Dispatch::Navigate(NavEvent::Today),
            GridAction::SetView(view) => Dispatch::Navigate(NavEvent::SetView(view)),
            GridAction::ZoomToWeek(date) => Dispatch::Navigate(NavEvent::ZoomToWeek(date)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalendarGrid {
    engine: LayoutEngine,
    week_start: Weekday,
    chip_limit: usize,
    snap_minutes: u32,
}

impl CalendarGrid {
    pub fn new(
        engine: LayoutEngine,
        week_start: Weekday,
        chip_limit: usize,
        snap_minutes: u32,
    ) -> Self {
        Self {
            engine,
            week_start,
            chip_limit: chip_limit.max(1),
            snap_minutes: snap_minutes.max(1),
        }
    }

    pub fn from_config(config: &CalendarConfig) -> Result<Self> {
        let engine = LayoutEngine::new(config.time_model()?, config.layout_options());
        Ok(Self::new(
            engine,
            config.week_start(),
            config.policies.chip_limit,
            config.policies.click_snap_minutes,
        ))
    }

    pub fn engine(&self) -> &LayoutEngine {
        &self.engine
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    #[instrument(skip_all, fields(view = %input.state.view, anchor = %input.state.anchor_date))]
    pub fn compose(&self, input: &GridInput<'_>) -> GridFrame {
        let window = input.state.window(self.week_start);
        let model = *self.engine.model();
        let column_width = self.engine.column_width();
        let today = input.now.date();
        let colors = staff_colors(input.staff);
        let names = staff_names(input.staff);
        let stats = self.engine.period_stats(input.jobs, &window.days);
        let indicator = TimelineIndicator::compute(input.now, &window.days, &model);

        let mut frame = GridFrame {
            view: window.view,
            title: window.title.clone(),
            days: window.days.clone(),
            header_labels: Vec::new(),
            width: column_width * window.days.len().min(7) as f64,
            height: 0.0,
            column_width,
            cell_height: self.cell_height(),
            indicator,
            rects: Vec::new(),
            ops: Vec::new(),
            stats,
            report: LayoutReport::default(),
            model,
            snap_minutes: self.snap_minutes,
            default_duration_minutes: self.engine.options().default_duration(),
            can_create: input.capabilities.can_create,
        };

        if window.view.is_timed() {
            self.compose_timed(&mut frame, &window, input, &colors, &names, today);
        } else {
            self.compose_month(&mut frame, &window, input, &colors, today);
        }

        debug!(
            ops = frame.ops.len(),
            rects = frame.rects.len(),
            indicator = frame.indicator.visible,
            "composed grid frame"
        );
        frame
    }

    fn cell_height(&self) -> f64 {
        HEADER_HEIGHT + (self.chip_limit as f64 + 1.0) * CHIP_HEIGHT
    }

    fn compose_timed(
        &self,
        frame: &mut GridFrame,
        window: &ViewWindow,
        input: &GridInput<'_>,
        colors: &HashMap<&str, &str>,
        names: &HashMap<&str, &str>,
        today: NaiveDate,
    ) {
        let model = frame.model;
        frame.height = model.grid_height();
        frame.header_labels = window
            .days
            .iter()
            .map(|day| day.date.format("%a %-d").to_string())
            .collect();

        for row in model.hour_rows() {
            frame.ops.push(DrawOp::HourLine {
                top: row.top,
                label: row.label,
            });
        }

        for (day, label) in window.days.iter().zip(&frame.header_labels) {
            frame.ops.push(DrawOp::DayHeader {
                day_index: day.index,
                left: day.index as f64 * frame.column_width,
                width: frame.column_width,
                label: label.clone(),
                is_today: day.date == today,
                is_selected: input.state.selected_date == Some(day.date),
            });
        }

        let (rects, report) = self.engine.compute_with_report(input.jobs, &window.days);
        let by_id: HashMap<&str, &Job> =
            input.jobs.iter().map(|job| (job.id.as_str(), job)).collect();

        for rect in &rects {
            let Some(job) = by_id.get(rect.job_id.as_str()) else {
                continue;
            };
            frame.ops.push(DrawOp::Card {
                rect: rect.clone(),
                title: job.display_title(),
                subtitle: card_subtitle(job, rect, names),
                status: job.status,
                color: job_color(job, colors),
                actions: card_actions(job, input.capabilities),
            });
        }

        if frame.indicator.visible {
            frame.ops.push(DrawOp::NowLine {
                day_index: frame.indicator.day_index,
                left: frame.indicator.day_index as f64 * frame.column_width,
                width: frame.column_width,
                top: frame.indicator.top,
                label: frame.indicator.label.clone(),
            });
        }

        frame.rects = rects;
        frame.report = report;
    }

    fn compose_month(
        &self,
        frame: &mut GridFrame,
        window: &ViewWindow,
        input: &GridInput<'_>,
        colors: &HashMap<&str, &str>,
        today: NaiveDate,
    ) {
        frame.header_labels = window.weekday_labels();
        frame.height = window.row_count() as f64 * frame.cell_height;

        let by_id: HashMap<&str, &Job> =
            input.jobs.iter().map(|job| (job.id.as_str(), job)).collect();

        for bucket in self.engine.month_buckets(input.jobs, &window.days) {
            let row = bucket.index / 7;
            let col = bucket.index % 7;
            let total = bucket.chips.len();

            let chips = bucket
                .chips
                .into_iter()
                .take(self.chip_limit)
                .map(|chip| {
                    let color = by_id
                        .get(chip.job_id.as_str())
                        .map(|job| job_color(job, colors))
                        .unwrap_or_else(|| UNASSIGNED_COLOR.to_string());
                    let label = match chip.start_time {
                        Some(start) => format!("{start} {}", chip.title),
                        None => chip.title.clone(),
                    };
                    Chip {
                        job_id: chip.job_id,
                        label,
                        status: chip.status,
                        color,
                    }
                })
                .collect::<Vec<_>>();
            let overflow = (total > self.chip_limit)
                .then(|| format!("+{} more", total - self.chip_limit));

            frame.ops.push(DrawOp::Cell {
                day_index: bucket.index,
                left: col as f64 * frame.column_width,
                top: row as f64 * frame.cell_height,
                width: frame.column_width,
                height: frame.cell_height,
                label: bucket.date.day().to_string(),
                outside: !bucket.is_current_month,
                is_today: bucket.date == today,
                is_selected: input.state.selected_date == Some(bucket.date),
                chips,
                overflow,
            });
        }
    }
}

impl GridFrame {
    pub fn hit_test(&self, x: f64, y: f64) -> Option<GridHit> {
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }
        if x >= self.width || y >= self.height {
            return None;
        }

        let col = (x / self.column_width).floor() as usize;
        if self.view == ViewMode::Month {
            let row = (y / self.cell_height).floor() as usize;
            return self
                .days
                .get(row * 7 + col)
                .map(|day| GridHit::Day { date: day.date });
        }

        // Later cards paint over earlier ones.
        if let Some(rect) = self.rects.iter().rev().find(|rect| {
            x >= rect.left
                && x < rect.left + rect.width
                && y >= rect.top
                && y < rect.top + rect.height
        }) {
            return Some(GridHit::Job {
                job_id: rect.job_id.clone(),
            });
        }

        let day = self.days.get(col)?;
        let time = self.model.from_offset_snapped(y, self.snap_minutes).ok()?;
        Some(GridHit::Slot {
            date: day.date,
            time,
        })
    }

    /// Maps a click to the gesture it stands for. Empty slots only turn
    /// into a create gesture for users allowed to create jobs.
    pub fn action_for_click(&self, x: f64, y: f64, double: bool) -> Option<GridAction> {
        match self.hit_test(x, y)? {
            GridHit::Job { job_id } if double => Some(GridAction::EditJob(job_id)),
            GridHit::Job { job_id } => Some(GridAction::OpenJob(job_id)),
            GridHit::Day { date } => Some(GridAction::ZoomToWeek(date)),
            GridHit::Slot { date, time } if self.can_create => {
                Some(GridAction::CreateAt { date, time })
            }
            GridHit::Slot { .. } => None,
        }
    }

    fn draft_job(&self, date: NaiveDate, time: ClockTime) -> Job {
        let end = time.plus_minutes(self.default_duration_minutes);
        let mut job = Job::new(
            Uuid::new_v4().to_string(),
            String::new(),
            date.format("%Y-%m-%d").to_string(),
        );
        job.start_time = Some(time.to_string());
        job.end_time = Some(end.to_string());
        job
    }
}

fn staff_colors(staff: &[Staff]) -> HashMap<&str, &str> {
    staff
        .iter()
        .filter_map(|member| {
            member
                .color
                .as_deref()
                .filter(|color| !color.trim().is_empty())
                .map(|color| (member.id.as_str(), color))
        })
        .collect()
}

fn staff_names(staff: &[Staff]) -> HashMap<&str, &str> {
    staff
        .iter()
        .map(|member| (member.id.as_str(), member.name.as_str()))
        .collect()
}

fn job_color(job: &Job, colors: &HashMap<&str, &str>) -> String {
    job.assignee
        .as_deref()
        .and_then(|id| colors.get(id))
        .map(|color| color.to_string())
        .unwrap_or_else(|| UNASSIGNED_COLOR.to_string())
}

fn card_subtitle(job: &Job, rect: &JobRectangle, names: &HashMap<&str, &str>) -> String {
    let times = if rect.fallback {
        "time unavailable".to_string()
    } else {
        let start = job.start_time.as_deref().unwrap_or_default().trim();
        match job.end_time.as_deref().map(str::trim) {
            Some(end) if !end.is_empty() => format!("{start}-{end}"),
            _ => start.to_string(),
        }
    };

    match job.assignee.as_deref().and_then(|id| names.get(id)) {
        Some(name) => format!("{times} {name}"),
        None => times,
    }
}

fn card_actions(job: &Job, caps: Capabilities) -> Vec<CardAction> {
    if job.status.is_closed() {
        return Vec::new();
    }
    [
        (caps.can_move, CardAction::Move),
        (caps.can_extend, CardAction::Extend),
        (caps.can_cancel, CardAction::Cancel),
    ]
    .into_iter()
    .filter_map(|(allowed, action)| allowed.then_some(action))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn now() -> NaiveDateTime {
        date(2024, 6, 10).and_hms_opt(14, 5, 0).expect("valid time")
    }

    fn grid() -> CalendarGrid {
        CalendarGrid::from_config(&CalendarConfig::default()).expect("default grid")
    }

    fn jobs() -> Vec<Job> {
        let mut a = Job::new("a", "Boiler service", "2024-06-10").with_times("09:00", "10:00");
        a.assignee = Some("s1".to_string());
        let b = Job::new("b", "Leak check", "2024-06-10").with_times("09:30", "10:30");
        let mut c = Job::new("c", "Final inspection", "2024-06-10").with_times("10:00", "11:00");
        c.status = JobStatus::Completed;
        let quote = Job::new("q", "Quote visit", "2024-06-10");
        vec![a, b, c, quote]
    }

    fn staff() -> Vec<Staff> {
        vec![Staff {
            id: "s1".to_string(),
            name: "Ana".to_string(),
            color: Some("#2f80ed".to_string()),
        }]
    }

    fn input<'a>(state: ViewState, jobs: &'a [Job], staff: &'a [Staff]) -> GridInput<'a> {
        GridInput {
            state,
            jobs,
            staff,
            capabilities: Capabilities::all(),
            now: now(),
        }
    }

    #[test]
    fn week_frame_draws_cards_and_now_line() {
        let jobs = jobs();
        let staff = staff();
        let state = ViewState::new(ViewMode::Week, date(2024, 6, 10));
        let frame = grid().compose(&input(state, &jobs, &staff));

        assert_eq!(frame.title, "Jun 9 - Jun 15, 2024");
        assert_eq!(frame.header_labels[1], "Mon 10");
        assert_eq!(frame.rects.len(), 3);
        assert_eq!(frame.report.skipped_unscheduled, 1);
        assert_eq!(frame.width, 980.0);
        assert_eq!(frame.height, 1140.0);

        let cards = frame
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Card {
                    rect,
                    subtitle,
                    color,
                    actions,
                    ..
                } => Some((rect.job_id.as_str(), subtitle, color, actions)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(cards.len(), 3);
        let (_, subtitle, color, actions) = cards[0];
        assert_eq!(subtitle, "09:00-10:00 Ana");
        assert_eq!(color, "#2f80ed");
        assert_eq!(
            actions,
            &vec![CardAction::Move, CardAction::Extend, CardAction::Cancel]
        );
        let completed = cards.iter().find(|card| card.0 == "c").expect("card c");
        assert!(completed.3.is_empty());

        let now_line = frame.ops.iter().find_map(|op| match op {
            DrawOp::NowLine { day_index, top, .. } => Some((*day_index, *top)),
            _ => None,
        });
        assert_eq!(now_line, Some((1, 545.0)));
    }

    #[test]
    fn capabilities_gate_card_actions() {
        let jobs = jobs();
        let state = ViewState::new(ViewMode::Day, date(2024, 6, 10));
        let mut grid_input = input(state, &jobs, &[]);
        grid_input.capabilities = Capabilities {
            can_extend: true,
            ..Capabilities::default()
        };
        let frame = grid().compose(&grid_input);
        for op in &frame.ops {
            if let DrawOp::Card { actions, status, .. } = op {
                if status.is_closed() {
                    assert!(actions.is_empty());
                } else {
                    assert_eq!(actions, &vec![CardAction::Extend]);
                }
            }
        }
    }

    #[test]
    fn month_frame_lists_chips_with_overflow() {
        let mut jobs = jobs();
        jobs.push(Job::new("z", "Zone survey", "2024-06-10"));
        let state = ViewState::new(ViewMode::Month, date(2024, 6, 10));
        let frame = grid().compose(&input(state, &jobs, &[]));

        assert_eq!(frame.title, "June 2024");
        assert_eq!(frame.header_labels.len(), 7);
        assert!(frame.rects.is_empty());

        let june_10 = frame
            .ops
            .iter()
            .find_map(|op| match op {
                DrawOp::Cell {
                    label,
                    outside: false,
                    chips,
                    overflow,
                    ..
                } if label == "10" => Some((chips.clone(), overflow.clone())),
                _ => None,
            })
            .expect("june 10 cell");
        assert_eq!(june_10.0.len(), 3);
        assert_eq!(june_10.0[0].label, "09:00 Boiler service");
        assert_eq!(june_10.1.as_deref(), Some("+2 more"));
    }

    #[test]
    fn month_click_zooms_into_the_week() {
        let jobs = jobs();
        let state = ViewState::new(ViewMode::Month, date(2024, 6, 10));
        let frame = grid().compose(&input(state, &jobs, &[]));

        // Row 2, column 3 of June 2024 is Wednesday the 12th.
        let x = 3.5 * frame.column_width;
        let y = 2.5 * frame.cell_height;
        let action = frame.action_for_click(x, y, false).expect("action");
        assert_eq!(action, GridAction::ZoomToWeek(date(2024, 6, 12)));

        let Dispatch::Navigate(event) = action.dispatch(&frame) else {
            panic!("expected navigation");
        };
        let next = state.zoom_to_week(date(2024, 6, 12));
        assert_eq!(event, NavEvent::ZoomToWeek(date(2024, 6, 12)));
        assert_eq!(next.view, ViewMode::Week);
        assert_eq!(GridAction::Today.into_nav_event(), Some(NavEvent::Today));
        assert_eq!(GridAction::OpenJob("a".to_string()).into_nav_event(), None);
    }

    #[test]
    fn timed_clicks_hit_cards_and_slots() {
        let jobs = jobs();
        let state = ViewState::new(ViewMode::Week, date(2024, 6, 10));
        let frame = grid().compose(&input(state, &jobs, &[]));

        let card = frame.rects.iter().find(|rect| rect.job_id == "b").expect("b");
        let hit = frame.hit_test(card.left + 1.0, card.top + 1.0);
        assert_eq!(
            hit,
            Some(GridHit::Job {
                job_id: "b".to_string()
            })
        );
        assert_eq!(
            frame.action_for_click(card.left + 1.0, card.top + 1.0, true),
            Some(GridAction::EditJob("b".to_string()))
        );

        // Thursday at 13:40 snaps down to 13:30.
        let y = frame.model.to_offset_str("13:40").expect("offset");
        let action = frame
            .action_for_click(4.5 * frame.column_width, y, false)
            .expect("create");
        assert_eq!(
            action,
            GridAction::CreateAt {
                date: date(2024, 6, 13),
                time: ClockTime::parse("13:30").expect("time"),
            }
        );
        let Dispatch::Job(JobIntent::Create(draft)) = action.dispatch(&frame) else {
            panic!("expected draft job");
        };
        assert_eq!(draft.scheduled_date, "2024-06-13");
        assert_eq!(draft.start_time.as_deref(), Some("13:30"));
        assert_eq!(draft.end_time.as_deref(), Some("14:30"));
        assert!(Uuid::parse_str(&draft.id).is_ok());

        assert_eq!(frame.hit_test(-1.0, 10.0), None);
        assert_eq!(frame.hit_test(10.0, frame.height + 1.0), None);
    }

    #[test]
    fn create_needs_the_capability() {
        let jobs = jobs();
        let state = ViewState::new(ViewMode::Day, date(2024, 6, 11));
        let mut grid_input = input(state, &jobs, &[]);
        grid_input.capabilities = Capabilities::default();
        let frame = grid().compose(&grid_input);
        assert_eq!(frame.action_for_click(10.0, 100.0, false), None);
        assert!(!frame.indicator.visible);
    }
}
