use std::fmt;
use std::sync::OnceLock;

use chrono::{
  NaiveTime,
  Timelike
};
use regex::Regex;
use serde::{
  Serialize,
  Serializer
};

use crate::error::{
  CalendarError,
  Result
};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Wall-clock time at minute
/// resolution. `24:00` is allowed so a
/// job can end exactly at midnight.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct ClockTime {
  minutes: u16
}

impl ClockTime {
  pub const END_OF_DAY: Self = Self {
    minutes: MINUTES_PER_DAY
  };

  pub fn from_hm(
    hour: u32,
    minute: u32
  ) -> Option<Self> {
    if hour == 24 && minute == 0 {
      return Some(Self::END_OF_DAY);
    }
    if hour > 23 || minute > 59 {
      return None;
    }
    Some(Self {
      minutes: (hour * 60 + minute)
        as u16
    })
  }

  pub fn from_minutes(
    minutes: u32
  ) -> Self {
    Self {
      minutes: minutes
        .min(u32::from(MINUTES_PER_DAY))
        as u16
    }
  }

  pub fn parse(
    raw: &str
  ) -> Result<Self> {
    let captures = clock_regex()
      .and_then(|re| re.captures(raw.trim()))
      .ok_or_else(|| {
        CalendarError::InvalidTimeFormat(
          raw.to_string()
        )
      })?;

    let hour = captures
      .name("hour")
      .and_then(|m| {
        m.as_str().parse::<u32>().ok()
      });
    let minute = captures
      .name("minute")
      .and_then(|m| {
        m.as_str().parse::<u32>().ok()
      });

    match (hour, minute) {
      | (Some(hour), Some(minute)) => {
        Self::from_hm(hour, minute)
          .ok_or_else(|| {
            CalendarError::InvalidTimeFormat(
              raw.to_string()
            )
          })
      }
      | _ => {
        Err(
          CalendarError::InvalidTimeFormat(
            raw.to_string()
          )
        )
      }
    }
  }

  pub fn minutes(self) -> u32 {
    u32::from(self.minutes)
  }

  pub fn hour(self) -> u32 {
    self.minutes() / 60
  }

  pub fn minute(self) -> u32 {
    self.minutes() % 60
  }

  pub fn plus_minutes(
    self,
    minutes: u32
  ) -> Self {
    Self::from_minutes(
      self
        .minutes()
        .saturating_add(minutes)
    )
  }
}

impl From<NaiveTime> for ClockTime {
  fn from(time: NaiveTime) -> Self {
    Self {
      minutes: (time.hour() * 60
        + time.minute())
        as u16
    }
  }
}

impl fmt::Display for ClockTime {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:02}:{:02}",
      self.hour(),
      self.minute()
    )
  }
}

impl Serialize for ClockTime {
  fn serialize<S: Serializer>(
    &self,
    serializer: S
  ) -> std::result::Result<S::Ok, S::Error>
  {
    serializer
      .collect_str(&self.to_string())
  }
}

fn clock_regex() -> Option<&'static Regex>
{
  static CLOCK_RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  CLOCK_RE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<hour>\d{1,2}):(?P<minute>\d{2})$"
      )
      .ok()
    })
    .as_ref()
}

/// Maps wall-clock time onto the
/// vertical axis of the day and week
/// grids.
///
/// The visible window is made of one
/// row per hour, from `start_hour` up
/// to and including `end_hour`, so the
/// bottom edge of the grid is
/// `(end_hour + 1):00`.
#[derive(
  Debug, Clone, Copy, PartialEq,
)]
pub struct TimeModel {
  start_hour:      u32,
  end_hour:        u32,
  pixels_per_hour: f64
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct HourRow {
  pub hour:  u32,
  pub label: String,
  pub top:   f64
}

impl TimeModel {
  pub fn new(
    start_hour: u32,
    end_hour: u32,
    pixels_per_hour: f64
  ) -> Result<Self> {
    if end_hour > 23 {
      return Err(
        CalendarError::InvalidTimeModel(
          format!(
            "end hour {end_hour} is \
             past 23"
          )
        )
      );
    }
    if start_hour > end_hour {
      return Err(
        CalendarError::InvalidTimeModel(
          format!(
            "start hour {start_hour} is \
             after end hour {end_hour}"
          )
        )
      );
    }
    if !pixels_per_hour.is_finite()
      || pixels_per_hour <= 0.0
    {
      return Err(
        CalendarError::InvalidTimeModel(
          format!(
            "pixels per hour must be \
             positive, got \
             {pixels_per_hour}"
          )
        )
      );
    }
    if !(pixels_per_hour
      * f64::from(MINUTES_PER_DAY))
    .is_finite()
    {
      return Err(
        CalendarError::InvalidTimeModel(
          format!(
            "pixels per hour \
             {pixels_per_hour} overflows \
             the grid"
          )
        )
      );
    }

    Ok(Self {
      start_hour,
      end_hour,
      pixels_per_hour
    })
  }

  pub fn start_hour(&self) -> u32 {
    self.start_hour
  }

  pub fn end_hour(&self) -> u32 {
    self.end_hour
  }

  pub fn pixels_per_hour(&self) -> f64 {
    self.pixels_per_hour
  }

  pub fn hour_count(&self) -> u32 {
    self.end_hour - self.start_hour + 1
  }

  pub fn grid_height(&self) -> f64 {
    f64::from(self.hour_count())
      * self.pixels_per_hour
  }

  fn window_start(&self) -> u32 {
    self.start_hour * 60
  }

  fn window_end(&self) -> u32 {
    (self.end_hour + 1) * 60
  }

  /// Pixel offset of `time` from the
  /// top of the grid. Times before the
  /// window pin to 0, times after it
  /// pin to the grid height.
  pub fn to_offset(
    &self,
    time: ClockTime
  ) -> f64 {
    let minutes = time
      .minutes()
      .clamp(
        self.window_start(),
        self.window_end()
      );
    f64::from(
      minutes - self.window_start()
    ) / 60.0
      * self.pixels_per_hour
  }

  pub fn to_offset_str(
    &self,
    raw: &str
  ) -> Result<f64> {
    ClockTime::parse(raw)
      .map(|time| self.to_offset(time))
  }

  pub fn from_offset(
    &self,
    pixels: f64
  ) -> Result<ClockTime> {
    if !pixels.is_finite() {
      return Err(
        CalendarError::InvalidTimeFormat(
          pixels.to_string()
        )
      );
    }

    let clamped = pixels
      .clamp(0.0, self.grid_height());
    // Absorb float error so an exact
    // round trip lands on the minute.
    let minutes = (clamped
      / self.pixels_per_hour
      * 60.0
      + 1e-9)
      .floor() as u32;

    Ok(ClockTime::from_minutes(
      (self.window_start() + minutes)
        .min(self.window_end())
    ))
  }

  pub fn from_offset_snapped(
    &self,
    pixels: f64,
    snap_minutes: u32
  ) -> Result<ClockTime> {
    let time = self.from_offset(pixels)?;
    let step = snap_minutes.max(1);
    let snapped =
      (time.minutes() / step) * step;
    Ok(ClockTime::from_minutes(
      snapped.max(self.window_start())
    ))
  }

  pub fn hour_rows(&self) -> Vec<HourRow> {
    (self.start_hour..=self.end_hour)
      .map(|hour| {
        HourRow {
          hour,
          label: format!("{hour:02}:00"),
          top: f64::from(
            hour - self.start_hour
          ) * self.pixels_per_hour
        }
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn model() -> TimeModel {
    TimeModel::new(5, 23, 60.0)
      .expect("valid model")
  }

  #[test]
  fn parses_clock_strings() {
    assert_eq!(
      ClockTime::parse("09:30")
        .expect("09:30")
        .minutes(),
      570
    );
    assert_eq!(
      ClockTime::parse("7:05")
        .expect("7:05")
        .to_string(),
      "07:05"
    );
    assert_eq!(
      ClockTime::parse("24:00")
        .expect("24:00"),
      ClockTime::END_OF_DAY
    );
  }

  #[test]
  fn rejects_malformed_clock_strings() {
    for raw in [
      "25:99", "12:60", "24:01", "",
      "9", "ab:cd", "09:3", "-1:00",
      "09:30:00"
    ] {
      assert!(
        matches!(
          ClockTime::parse(raw),
          Err(
            CalendarError::InvalidTimeFormat(
              _
            )
          )
        ),
        "{raw:?} should be rejected"
      );
    }
  }

  #[test]
  fn offsets_follow_pixels_per_hour() {
    let model = model();
    assert_eq!(
      model
        .to_offset_str("05:00")
        .expect("offset"),
      0.0
    );
    assert_eq!(
      model
        .to_offset_str("14:05")
        .expect("offset"),
      545.0
    );
    assert_eq!(model.grid_height(), 1140.0);
    assert_eq!(model.hour_count(), 19);
  }

  #[test]
  fn offsets_clamp_outside_window() {
    let model = model();
    assert_eq!(
      model
        .to_offset_str("03:15")
        .expect("offset"),
      0.0
    );
    assert_eq!(
      model.to_offset(
        ClockTime::END_OF_DAY
      ),
      model.grid_height()
    );

    let narrow =
      TimeModel::new(8, 17, 50.0)
        .expect("valid model");
    assert_eq!(
      narrow
        .to_offset_str("21:00")
        .expect("offset"),
      narrow.grid_height()
    );
  }

  #[test]
  fn from_offset_inverts_to_offset() {
    let model =
      TimeModel::new(5, 23, 45.0)
        .expect("valid model");
    for raw in [
      "05:00", "06:17", "12:59",
      "18:45", "23:59"
    ] {
      let time = ClockTime::parse(raw)
        .expect("valid time");
      let back = model
        .from_offset(
          model.to_offset(time)
        )
        .expect("inverse");
      assert_eq!(back, time, "{raw}");
    }
  }

  #[test]
  fn from_offset_clamps_and_rejects_nan(
  ) {
    let model = model();
    assert_eq!(
      model
        .from_offset(-40.0)
        .expect("clamped")
        .to_string(),
      "05:00"
    );
    assert_eq!(
      model
        .from_offset(1e9)
        .expect("clamped"),
      ClockTime::END_OF_DAY
    );
    assert!(
      model.from_offset(f64::NAN).is_err()
    );
  }

  #[test]
  fn snapped_offsets_floor_to_step() {
    let model = model();
    let time = model
      .from_offset_snapped(
        model
          .to_offset_str("10:44")
          .expect("offset"),
        15
      )
      .expect("snapped");
    assert_eq!(time.to_string(), "10:30");
  }

  #[test]
  fn rejects_degenerate_models() {
    assert!(
      TimeModel::new(5, 23, 0.0).is_err()
    );
    assert!(
      TimeModel::new(5, 23, f64::NAN)
        .is_err()
    );
    assert!(
      TimeModel::new(5, 23, 1e308).is_err()
    );
    assert!(
      TimeModel::new(10, 9, 60.0).is_err()
    );
    assert!(
      TimeModel::new(0, 24, 60.0).is_err()
    );
  }

  #[test]
  fn hour_rows_cover_window() {
    let rows = model().hour_rows();
    assert_eq!(rows.len(), 19);
    assert_eq!(rows[0].label, "05:00");
    assert_eq!(rows[18].label, "23:00");
    assert_eq!(rows[18].top, 1080.0);
  }
}
