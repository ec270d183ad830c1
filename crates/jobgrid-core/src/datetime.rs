use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  NaiveDateTime,
  Utc,
  Weekday
};
use chrono_tz::Tz;

use crate::error::{
  CalendarError,
  Result
};

const TIMEZONE_ENV_VAR: &str =
  "JOBGRID_TIMEZONE";

/// Source of "now" for the calendar,
/// already shifted into the dispatch
/// timezone.
pub trait Clock {
  fn now(&self) -> NaiveDateTime;

  fn today(&self) -> NaiveDate {
    self.now().date()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
  timezone: Tz
}

impl SystemClock {
  pub fn new(timezone: Tz) -> Self {
    Self { timezone }
  }

  pub fn timezone(&self) -> Tz {
    self.timezone
  }
}

impl Clock for SystemClock {
  fn now(&self) -> NaiveDateTime {
    Utc::now()
      .with_timezone(&self.timezone)
      .naive_local()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
  fn now(&self) -> NaiveDateTime {
    self.0
  }
}

impl<C: Clock + ?Sized> Clock
  for std::sync::Arc<C>
{
  fn now(&self) -> NaiveDateTime {
    (**self).now()
  }
}

/// Picks the dispatch timezone: the
/// configured id, then the env var,
/// then UTC.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "jobgrid.toml")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured dispatch timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

pub fn parse_date(
  raw: &str
) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(
    raw.trim(),
    "%Y-%m-%d"
  )
  .map_err(|_| {
    CalendarError::InvalidDate(
      raw.to_string()
    )
  })
}

pub fn parse_date_time(
  raw: &str
) -> Result<NaiveDateTime> {
  let trimmed = raw.trim();
  ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
    .iter()
    .find_map(|format| {
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
      .ok()
    })
    .ok_or_else(|| {
      CalendarError::InvalidDate(
        raw.to_string()
      )
    })
}

pub fn parse_week_start(
  raw: &str
) -> Weekday {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "monday" | "mon" => Weekday::Mon,
    | "saturday" | "sat" => {
      Weekday::Sat
    }
    | _ => Weekday::Sun
  }
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

/// First day of the month `months`
/// away from `date`.
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let index = date.year() as i64 * 12
    + i64::from(date.month0())
    + i64::from(months);
  let year = index.div_euclid(12);
  let month = index.rem_euclid(12) as u32
    + 1;

  i32::try_from(year)
    .ok()
    .and_then(|year| {
      NaiveDate::from_ymd_opt(
        year, month, 1
      )
    })
    .unwrap_or(date)
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

pub fn end_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  add_days(
    start_of_week(day, week_start),
    6
  )
}
