use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::Context;
use chrono::Weekday;
use jobgrid_shared::JobStatus;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::datetime::parse_week_start;
use crate::error::Result;
use crate::layout::LayoutOptions;
use crate::time_model::TimeModel;

const CONFIG_FILE_NAME: &str =
  "jobgrid.toml";
const CONFIG_ENV_VAR: &str =
  "JOBGRID_CONFIG";
const MAX_PIXELS_PER_HOUR: f64 = 600.0;
const MAX_COLUMN_WIDTH: f64 = 2000.0;

fn default_true() -> bool {
  true
}

fn default_week_start() -> String {
  "sunday".to_string()
}

fn default_chip_limit() -> usize {
  3
}

fn default_click_snap_minutes() -> u32
{
  15
}

fn default_hour_start() -> u32 {
  5
}

fn default_hour_end() -> u32 {
  23
}

fn default_pixels_per_hour() -> f64 {
  60.0
}

fn default_column_width() -> f64 {
  140.0
}

fn default_min_job_height() -> f64 {
  29.0
}

fn default_duration_minutes() -> u32 {
  60
}

fn default_refresh_seconds() -> u64 {
  60
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct CalendarConfig {
  #[serde(default)]
  pub timezone:   Option<String>,
  #[serde(default)]
  pub policies:   CalendarPolicies,
  #[serde(default)]
  pub day_view:   DayViewConfig,
  #[serde(default)]
  pub visibility: StatusVisibility,
  #[serde(default)]
  pub indicator:  IndicatorConfig
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct CalendarPolicies {
  #[serde(default = "default_week_start")]
  pub week_start:         String,
  #[serde(default = "default_chip_limit")]
  pub chip_limit:         usize,
  #[serde(
    default = "default_click_snap_minutes"
  )]
  pub click_snap_minutes: u32
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct DayViewConfig {
  #[serde(default = "default_hour_start")]
  pub hour_start:               u32,
  #[serde(default = "default_hour_end")]
  pub hour_end:                 u32,
  #[serde(
    default = "default_pixels_per_hour"
  )]
  pub pixels_per_hour:          f64,
  #[serde(
    default = "default_column_width"
  )]
  pub column_width:             f64,
  #[serde(
    default = "default_min_job_height"
  )]
  pub min_job_height:           f64,
  #[serde(
    default = "default_duration_minutes"
  )]
  pub default_duration_minutes: u32
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct StatusVisibility {
  #[serde(default = "default_true")]
  pub pending:     bool,
  #[serde(default = "default_true")]
  pub in_progress: bool,
  #[serde(default = "default_true")]
  pub completed:   bool,
  #[serde(default = "default_true")]
  pub cancelled:   bool
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct IndicatorConfig {
  #[serde(
    default = "default_refresh_seconds"
  )]
  pub refresh_seconds: u64
}

impl Default for CalendarConfig {
  fn default() -> Self {
    Self {
      timezone:   None,
      policies:
        CalendarPolicies::default(),
      day_view: DayViewConfig::default(),
      visibility:
        StatusVisibility::default(),
      indicator:
        IndicatorConfig::default()
    }
  }
}

impl Default for CalendarPolicies {
  fn default() -> Self {
    Self {
      week_start: default_week_start(),
      chip_limit: default_chip_limit(),
      click_snap_minutes:
        default_click_snap_minutes()
    }
  }
}

impl Default for DayViewConfig {
  fn default() -> Self {
    Self {
      hour_start:
        default_hour_start(),
      hour_end: default_hour_end(),
      pixels_per_hour:
        default_pixels_per_hour(),
      column_width:
        default_column_width(),
      min_job_height:
        default_min_job_height(),
      default_duration_minutes:
        default_duration_minutes()
    }
  }
}

impl Default for StatusVisibility {
  fn default() -> Self {
    Self {
      pending:     true,
      in_progress: true,
      completed:   true,
      cancelled:   true
    }
  }
}

impl Default for IndicatorConfig {
  fn default() -> Self {
    Self {
      refresh_seconds:
        default_refresh_seconds()
    }
  }
}

impl StatusVisibility {
  pub fn allows(
    &self,
    status: JobStatus
  ) -> bool {
    match status {
      | JobStatus::Pending => {
        self.pending
      }
      | JobStatus::InProgress => {
        self.in_progress
      }
      | JobStatus::Completed => {
        self.completed
      }
      | JobStatus::Cancelled => {
        self.cancelled
      }
    }
  }
}

impl CalendarConfig {
  /// Loads the first config file found
  /// along the lookup chain, or the
  /// defaults when there is none.
  #[tracing::instrument(skip(
    override_path
  ))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_config_path(override_path)
    else {
      info!(
        "no jobgrid.toml found; using \
         defaults"
      );
      return Ok(Self::default());
    };

    info!(config = %path.display(), "loading calendar config");
    let raw = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    Self::from_toml_str(&raw)
      .with_context(|| {
        format!(
          "failed to parse {}",
          path.display()
        )
      })
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let mut config =
      toml::from_str::<Self>(raw)?;
    config.sanitize();
    info!(
      timezone = ?config.timezone,
      week_start = %config.policies.week_start,
      hour_start = config.day_view.hour_start,
      hour_end = config.day_view.hour_end,
      "loaded calendar config"
    );
    Ok(config)
  }

  pub fn sanitize(&mut self) {
    if self
      .policies
      .week_start
      .trim()
      .is_empty()
    {
      self.policies.week_start =
        default_week_start();
    }

    if self.policies.chip_limit == 0 {
      warn!(
        "chip_limit must be positive; \
         using default"
      );
      self.policies.chip_limit =
        default_chip_limit();
    }

    if self.policies.click_snap_minutes
      == 0
      || self.policies.click_snap_minutes
        > 60
    {
      warn!(
        snap = self
          .policies
          .click_snap_minutes,
        "click_snap_minutes out of \
         range; using default"
      );
      self.policies.click_snap_minutes =
        default_click_snap_minutes();
    }

    let day_view = &mut self.day_view;
    if day_view.hour_start > 23 {
      warn!(
        hour_start = day_view.hour_start,
        "hour_start past 23; clamping"
      );
      day_view.hour_start = 23;
    }
    if day_view.hour_end > 23 {
      warn!(
        hour_end = day_view.hour_end,
        "hour_end past 23; clamping"
      );
      day_view.hour_end = 23;
    }
    if day_view.hour_end
      < day_view.hour_start
    {
      warn!(
        hour_start = day_view.hour_start,
        hour_end = day_view.hour_end,
        "hour_end before hour_start; \
         collapsing window"
      );
      day_view.hour_end =
        day_view.hour_start;
    }

    sanitize_size(
      &mut day_view.pixels_per_hour,
      default_pixels_per_hour(),
      MAX_PIXELS_PER_HOUR,
      "pixels_per_hour"
    );
    sanitize_size(
      &mut day_view.column_width,
      default_column_width(),
      MAX_COLUMN_WIDTH,
      "column_width"
    );
    sanitize_size(
      &mut day_view.min_job_height,
      default_min_job_height(),
      MAX_PIXELS_PER_HOUR,
      "min_job_height"
    );

    if day_view.default_duration_minutes
      == 0
    {
      day_view.default_duration_minutes =
        default_duration_minutes();
    }

    if self.indicator.refresh_seconds == 0
    {
      self.indicator.refresh_seconds =
        default_refresh_seconds();
    }
  }

  pub fn week_start(&self) -> Weekday {
    parse_week_start(
      &self.policies.week_start
    )
  }

  pub fn time_model(
    &self
  ) -> Result<TimeModel> {
    TimeModel::new(
      self.day_view.hour_start,
      self.day_view.hour_end,
      self.day_view.pixels_per_hour
    )
  }

  pub fn layout_options(
    &self
  ) -> LayoutOptions {
    LayoutOptions {
      column_width:             self
        .day_view
        .column_width,
      min_height:               self
        .day_view
        .min_job_height,
      default_duration_minutes: self
        .day_view
        .default_duration_minutes,
      visibility:               self
        .visibility
        .clone()
    }
  }

  pub fn refresh_interval(
    &self
  ) -> Duration {
    Duration::from_secs(
      self.indicator.refresh_seconds
    )
  }
}

fn sanitize_size(
  value: &mut f64,
  fallback: f64,
  max: f64,
  field: &'static str
) {
  if !value.is_finite() || *value <= 0.0
  {
    warn!(
      field,
      value = *value,
      fallback,
      "non-positive size in config; \
       using default"
    );
    *value = fallback;
  } else if *value > max {
    warn!(
      field,
      value = *value,
      max,
      "oversized value in config; \
       clamping"
    );
    *value = max;
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  let candidates = std::env::current_dir()
    .ok()
    .map(|dir| dir.join(CONFIG_FILE_NAME))
    .into_iter()
    .chain(dirs::config_dir().map(
      |dir| {
        dir
          .join("jobgrid")
          .join(CONFIG_FILE_NAME)
      }
    ));

  for candidate in candidates {
    debug!(candidate = %candidate.display(), "checking config candidate");
    if candidate.exists() {
      return Some(candidate);
    }
  }

  None
}
