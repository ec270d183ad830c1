use std::collections::BTreeMap;

use chrono::NaiveDate;
use jobgrid_shared::{
  Job,
  JobStatus
};
use serde::Serialize;
use tracing::{
  debug,
  trace,
  warn
};

use crate::config::StatusVisibility;
use crate::datetime::parse_date;
use crate::error::CalendarError;
use crate::time_model::{
  ClockTime,
  TimeModel
};
use crate::view_window::{
  DayColumn,
  index_in_days
};

pub const DEFAULT_COLUMN_WIDTH: f64 =
  140.0;
pub const MIN_HEIGHT: f64 = 29.0;
pub const DEFAULT_DURATION_MINUTES: u32 =
  60;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
  pub column_width:             f64,
  pub min_height:               f64,
  pub default_duration_minutes: u32,
  pub visibility:               StatusVisibility
}

impl Default for LayoutOptions {
  fn default() -> Self {
    Self {
      column_width:
        DEFAULT_COLUMN_WIDTH,
      min_height:               MIN_HEIGHT,
      default_duration_minutes:
        DEFAULT_DURATION_MINUTES,
      visibility:
        StatusVisibility::default()
    }
  }
}

impl LayoutOptions {
  fn column_width(&self) -> f64 {
    positive_or(
      self.column_width,
      DEFAULT_COLUMN_WIDTH
    )
  }

  fn min_height(&self) -> f64 {
    positive_or(
      self.min_height,
      MIN_HEIGHT
    )
  }

  pub(crate) fn default_duration(&self) -> u32 {
    if self.default_duration_minutes == 0
    {
      DEFAULT_DURATION_MINUTES
    } else {
      self.default_duration_minutes
    }
  }
}

fn positive_or(
  value: f64,
  fallback: f64
) -> f64 {
  if value.is_finite() && value > 0.0 {
    value
  } else {
    fallback
  }
}

/// Screen rectangle of one job card,
/// relative to the top-left corner of
/// the first day column.
#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct JobRectangle {
  pub job_id:     String,
  pub day_index:  usize,
  pub top:        f64,
  pub left:       f64,
  pub width:      f64,
  pub height:     f64,
  pub lane:       usize,
  pub lane_count: usize,
  /// Set when part of the geometry is
  /// a substituted default.
  pub fallback:   bool
}

#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct LayoutReport {
  pub placed:              usize,
  pub hidden:              usize,
  pub skipped_bad_date:    usize,
  pub out_of_window:       usize,
  pub skipped_unscheduled: usize,
  pub fallbacks:           usize,
  pub degenerate:          usize
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct JobChip {
  pub job_id:     String,
  pub title:      String,
  pub start_time: Option<ClockTime>,
  pub status:     JobStatus
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct DayBucket {
  pub date:             NaiveDate,
  pub index:            usize,
  pub is_current_month: bool,
  pub chips:            Vec<JobChip>
}

#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct PeriodStats {
  pub total:       usize,
  pub pending:     usize,
  pub in_progress: usize,
  pub completed:   usize,
  pub cancelled:   usize,
  pub unscheduled: usize
}

impl PeriodStats {
  fn push(&mut self, job: &Job) {
    self.total =
      self.total.saturating_add(1);
    let slot = match job.status {
      | JobStatus::Pending => {
        &mut self.pending
      }
      | JobStatus::InProgress => {
        &mut self.in_progress
      }
      | JobStatus::Completed => {
        &mut self.completed
      }
      | JobStatus::Cancelled => {
        &mut self.cancelled
      }
    };
    *slot = slot.saturating_add(1);
    if job.is_unscheduled() {
      self.unscheduled =
        self.unscheduled.saturating_add(1);
    }
  }
}

struct TimedJob<'a> {
  job:   &'a Job,
  start: ClockTime,
  end:   ClockTime
}

#[derive(Debug, Clone, Copy)]
struct Extent {
  top:    f64,
  height: f64
}

#[derive(Default)]
struct DaySlot<'a> {
  timed:     Vec<TimedJob<'a>>,
  fallbacks: Vec<&'a Job>
}

/// Places jobs on the day and week
/// grids. Every call is a pure function
/// of its inputs.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
  model:   TimeModel,
  options: LayoutOptions
}

impl LayoutEngine {
  pub fn new(
    model: TimeModel,
    options: LayoutOptions
  ) -> Self {
    Self { model, options }
  }

  pub fn model(&self) -> &TimeModel {
    &self.model
  }

  pub fn options(&self) -> &LayoutOptions {
    &self.options
  }

  pub fn column_width(&self) -> f64 {
    self.options.column_width()
  }

  pub fn compute(
    &self,
    jobs: &[Job],
    days: &[DayColumn]
  ) -> Vec<JobRectangle> {
    self
      .compute_with_report(jobs, days)
      .0
  }

  #[tracing::instrument(
    skip_all,
    fields(jobs = jobs.len(), days = days.len())
  )]
  pub fn compute_with_report(
    &self,
    jobs: &[Job],
    days: &[DayColumn]
  ) -> (Vec<JobRectangle>, LayoutReport)
  {
    let mut report =
      LayoutReport::default();
    let mut slots: BTreeMap<
      usize,
      DaySlot<'_>
    > = BTreeMap::new();

    for job in jobs {
      let Some(index) = self
        .day_index_for(job, days, &mut report)
      else {
        continue;
      };

      let Some(raw_start) = job
        .start_time
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
      else {
        debug!(job_id = %job.id, "job has no start time; left off the hour grid");
        report.skipped_unscheduled += 1;
        continue;
      };

      let slot =
        slots.entry(index).or_default();
      match ClockTime::parse(raw_start) {
        | Ok(start) => {
          let end =
            self.resolve_end(job, start);
          slot.timed.push(TimedJob {
            job,
            start,
            end
          });
        }
        | Err(error) => {
          warn!(
            job_id = %job.id,
            %error,
            "unparseable start time; \
             drawing fallback card"
          );
          slot.fallbacks.push(job);
        }
      }
    }

    let mut rects = Vec::new();
    for (day_index, mut slot) in slots {
      slot.timed.sort_by(|a, b| {
        a.start
          .cmp(&b.start)
          .then(a.end.cmp(&b.end))
          .then_with(|| {
            a.job.id.cmp(&b.job.id)
          })
      });

      let lanes = assign_lanes(&slot.timed);
      let lane_count = lanes
        .iter()
        .copied()
        .max()
        .map(|lane| lane + 1)
        .unwrap_or(1);
      trace!(
        day_index,
        jobs = slot.timed.len(),
        lane_count,
        "assigned lanes"
      );

      for (timed, lane) in
        slot.timed.iter().zip(lanes)
      {
        let rect = self.timed_rect(
          timed, day_index, lane,
          lane_count
        );
        rects.push(self.sanitize(
          rect,
          &mut report
        ));
        report.placed += 1;
      }

      for job in slot.fallbacks {
        report.fallbacks += 1;
        report.placed += 1;
        let rect = self
          .fallback_rect(job, day_index);
        rects.push(self.sanitize(
          rect,
          &mut report
        ));
      }
    }

    debug!(
      placed = report.placed,
      hidden = report.hidden,
      skipped_bad_date =
        report.skipped_bad_date,
      out_of_window = report.out_of_window,
      skipped_unscheduled =
        report.skipped_unscheduled,
      fallbacks = report.fallbacks,
      degenerate = report.degenerate,
      "layout computed"
    );
    (rects, report)
  }

  /// Day membership for month view.
  /// Unscheduled jobs are included.
  pub fn month_buckets(
    &self,
    jobs: &[Job],
    days: &[DayColumn]
  ) -> Vec<DayBucket> {
    let mut buckets = days
      .iter()
      .map(|day| {
        DayBucket {
          date:             day.date,
          index:            day.index,
          is_current_month: day
            .is_current_month,
          chips:            Vec::new()
        }
      })
      .collect::<Vec<_>>();

    let mut report =
      LayoutReport::default();
    for job in jobs {
      let Some(index) = self
        .day_index_for(job, days, &mut report)
      else {
        continue;
      };
      let start_time = job
        .start_time
        .as_deref()
        .and_then(|raw| {
          ClockTime::parse(raw).ok()
        });
      if let Some(bucket) =
        buckets.get_mut(index)
      {
        bucket.chips.push(JobChip {
          job_id: job.id.clone(),
          title: job.display_title(),
          start_time,
          status: job.status
        });
      }
    }

    for bucket in &mut buckets {
      bucket.chips.sort_by(|a, b| {
        match (a.start_time, b.start_time) {
          | (Some(x), Some(y)) => x.cmp(&y),
          | (Some(_), None) => {
            std::cmp::Ordering::Less
          }
          | (None, Some(_)) => {
            std::cmp::Ordering::Greater
          }
          | (None, None) => {
            std::cmp::Ordering::Equal
          }
        }
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| {
          a.job_id.cmp(&b.job_id)
        })
      });
    }

    buckets
  }

  pub fn period_stats(
    &self,
    jobs: &[Job],
    days: &[DayColumn]
  ) -> PeriodStats {
    let mut stats = PeriodStats::default();
    let mut report =
      LayoutReport::default();
    for job in jobs {
      if self
        .day_index_for(job, days, &mut report)
        .is_some()
      {
        stats.push(job);
      }
    }
    stats
  }

  fn day_index_for(
    &self,
    job: &Job,
    days: &[DayColumn],
    report: &mut LayoutReport
  ) -> Option<usize> {
    if !self.options.visibility.allows(job.status)
    {
      trace!(job_id = %job.id, status = job.status.as_key(), "status hidden");
      report.hidden += 1;
      return None;
    }

    let date =
      match parse_date(&job.scheduled_date)
      {
        | Ok(date) => date,
        | Err(error) => {
          warn!(job_id = %job.id, %error, "skipping job with bad date");
          report.skipped_bad_date += 1;
          return None;
        }
      };

    let index = index_in_days(days, date);
    if index.is_none() {
      trace!(job_id = %job.id, %date, "job outside view window");
      report.out_of_window += 1;
    }
    index
  }

  fn resolve_end(
    &self,
    job: &Job,
    start: ClockTime
  ) -> ClockTime {
    let fallback = start.plus_minutes(
      self.options.default_duration()
    );
    let Some(raw_end) = job
      .end_time
      .as_deref()
      .filter(|raw| !raw.trim().is_empty())
    else {
      return fallback;
    };

    match ClockTime::parse(raw_end) {
      | Ok(end) if end > start => end,
      | Ok(end) => {
        warn!(
          job_id = %job.id,
          start = %start,
          end = %end,
          "end time not after start; \
           using default duration"
        );
        fallback
      }
      | Err(error) => {
        warn!(
          job_id = %job.id,
          %error,
          "unparseable end time; using \
           default duration"
        );
        fallback
      }
    }
  }

  /// Drawn vertical span of a timed
  /// job. The card starts at its start
  /// offset and is cut at the grid
  /// bottom; the minimum height applies
  /// only where it fits. A job starting
  /// at or past the last visible minute
  /// is pinned to the bottom edge.
  fn extent(
    &self,
    timed: &TimedJob<'_>
  ) -> Extent {
    let min_height =
      self.options.min_height();
    let grid_height =
      self.model.grid_height();

    let top =
      self.model.to_offset(timed.start);
    let available = grid_height - top;
    if available <= 0.0 {
      let height =
        min_height.min(grid_height);
      trace!(
        job_id = %timed.job.id,
        "job starts past the grid; \
         pinned to the bottom edge"
      );
      return Extent {
        top: grid_height - height,
        height
      };
    }

    let natural =
      self.model.to_offset(timed.end) - top;
    Extent {
      top,
      height: natural
        .max(min_height)
        .min(available)
    }
  }

  fn timed_rect(
    &self,
    timed: &TimedJob<'_>,
    day_index: usize,
    lane: usize,
    lane_count: usize
  ) -> JobRectangle {
    let column_width =
      self.options.column_width();
    let extent = self.extent(timed);
    let width =
      column_width / lane_count as f64;
    JobRectangle {
      job_id: timed.job.id.clone(),
      day_index,
      top: extent.top,
      left: day_index as f64 * column_width
        + lane as f64 * width,
      width,
      height: extent.height,
      lane,
      lane_count,
      fallback: false
    }
  }

  fn fallback_rect(
    &self,
    job: &Job,
    day_index: usize
  ) -> JobRectangle {
    let column_width =
      self.options.column_width();
    JobRectangle {
      job_id: job.id.clone(),
      day_index,
      top: 0.0,
      left: day_index as f64 * column_width,
      width: column_width,
      height: self.options.min_height(),
      lane: 0,
      lane_count: 1,
      fallback: true
    }
  }

  /// Final guard: no rectangle leaves
  /// the engine with a NaN, infinite or
  /// negative field.
  fn sanitize(
    &self,
    mut rect: JobRectangle,
    report: &mut LayoutReport
  ) -> JobRectangle {
    let column_width =
      self.options.column_width();
    let left_default =
      rect.day_index as f64 * column_width;
    let job_id = rect.job_id.clone();

    let repaired = [
      repair(
        &mut rect.top,
        0.0,
        "top",
        &job_id
      ),
      repair(
        &mut rect.left,
        left_default,
        "left",
        &job_id
      ),
      repair(
        &mut rect.width,
        column_width,
        "width",
        &job_id
      ),
      repair(
        &mut rect.height,
        self.options.min_height(),
        "height",
        &job_id
      )
    ]
    .contains(&true);

    if repaired {
      rect.fallback = true;
      report.degenerate += 1;
    }
    rect
  }
}

fn repair(
  value: &mut f64,
  fallback: f64,
  field: &'static str,
  job_id: &str
) -> bool {
  let degenerate = !value.is_finite()
    || *value < 0.0
    || (matches!(field, "width" | "height")
      && *value == 0.0);
  if degenerate {
    let error =
      CalendarError::DegenerateGeometry {
        job_id: job_id.to_string(),
        field,
        value: *value
      };
    warn!(%error, fallback, "repairing rectangle");
    *value = fallback;
  }
  degenerate
}

/// Interval partitioning over jobs
/// sorted by start: each job takes the
/// first lane that is free by its start
/// time, else opens a new one.
fn assign_lanes(
  jobs: &[TimedJob<'_>]
) -> Vec<usize> {
  let mut lane_ends: Vec<ClockTime> =
    Vec::new();
  jobs
    .iter()
    .map(|job| {
      if let Some(lane) = lane_ends
        .iter()
        .position(|end| *end <= job.start)
      {
        lane_ends[lane] = job.end;
        lane
      } else {
        lane_ends.push(job.end);
        lane_ends.len() - 1
      }
    })
    .collect()
}
