use chrono::NaiveDateTime;
use serde::Serialize;

use crate::time_model::{
  ClockTime,
  TimeModel
};
use crate::view_window::{
  DayColumn,
  index_in_days
};

/// Position of the "now" marker.
#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct Indicator {
  pub visible:   bool,
  pub day_index: usize,
  pub top:       f64,
  pub label:     String
}

impl Indicator {
  fn hidden(label: String) -> Self {
    Self {
      visible: false,
      day_index: 0,
      top: 0.0,
      label
    }
  }
}

pub struct TimelineIndicator;

impl TimelineIndicator {
  pub fn compute(
    now: NaiveDateTime,
    days: &[DayColumn],
    model: &TimeModel
  ) -> Indicator {
    let time = ClockTime::from(now.time());
    let label = time.to_string();

    let Some(day_index) =
      index_in_days(days, now.date())
    else {
      tracing::trace!(
        now = %now,
        "now is outside the view window"
      );
      return Indicator::hidden(label);
    };

    Indicator {
      visible: true,
      day_index,
      top: model.to_offset(time),
      label
    }
  }
}
