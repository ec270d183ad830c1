use std::fmt;
use std::str::FromStr;

use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  add_days,
  end_of_week,
  first_day_of_month,
  last_day_of_month,
  start_of_week
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  Day,
  Week,
  Month
}

impl ViewMode {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Day => "day",
      | Self::Week => "week",
      | Self::Month => "month"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "day" | "d" => Some(Self::Day),
      | "week" | "w" => Some(Self::Week),
      | "month" | "m" => {
        Some(Self::Month)
      }
      | _ => None
    }
  }

  /// Day and week views place jobs on
  /// the hour grid; month view only
  /// buckets them per day.
  pub fn is_timed(self) -> bool {
    !matches!(self, Self::Month)
  }
}

impl fmt::Display for ViewMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl FromStr for ViewMode {
  type Err = String;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::from_key(s).ok_or_else(|| {
      format!(
        "unknown view {s:?}; expected \
         day, week or month"
      )
    })
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct DayColumn {
  pub date:             NaiveDate,
  pub index:            usize,
  pub is_current_month: bool
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct ViewWindow {
  pub view:   ViewMode,
  pub anchor: NaiveDate,
  pub days:   Vec<DayColumn>,
  pub title:  String
}

impl ViewWindow {
  #[tracing::instrument(level = "debug")]
  pub fn compute(
    anchor: NaiveDate,
    view: ViewMode,
    week_start: Weekday
  ) -> Self {
    let (start, end) = window_bounds(
      anchor, view, week_start
    );
    let span =
      (end - start).num_days().max(0);

    let days = (0..=span)
      .map(|offset| {
        let date =
          add_days(start, offset);
        DayColumn {
          date,
          index: offset as usize,
          is_current_month: view
            != ViewMode::Month
            || date.month() == anchor.month()
        }
      })
      .collect::<Vec<_>>();

    let title = window_title(
      anchor, view, week_start
    );
    tracing::debug!(
      view = %view,
      anchor = %anchor,
      days = days.len(),
      title = %title,
      "computed view window"
    );

    Self {
      view,
      anchor,
      days,
      title
    }
  }

  pub fn first_date(&self) -> NaiveDate {
    self
      .days
      .first()
      .map(|day| day.date)
      .unwrap_or(self.anchor)
  }

  pub fn last_date(&self) -> NaiveDate {
    self
      .days
      .last()
      .map(|day| day.date)
      .unwrap_or(self.anchor)
  }

  pub fn contains(
    &self,
    date: NaiveDate
  ) -> bool {
    self.index_of(date).is_some()
  }

  pub fn index_of(
    &self,
    date: NaiveDate
  ) -> Option<usize> {
    index_in_days(&self.days, date)
  }

  pub fn row_count(&self) -> usize {
    self.days.len().div_ceil(7)
  }

  pub fn weekday_labels(
    &self
  ) -> Vec<String> {
    self
      .days
      .iter()
      .take(7)
      .map(|day| {
        day.date.format("%a").to_string()
      })
      .collect()
  }
}

/// Days are contiguous, so the column
/// is a plain offset from the first.
pub fn index_in_days(
  days: &[DayColumn],
  date: NaiveDate
) -> Option<usize> {
  let first = days.first()?.date;
  let offset =
    (date - first).num_days();
  if offset < 0 {
    return None;
  }
  let offset = offset as usize;
  (offset < days.len()).then_some(offset)
}

fn window_bounds(
  anchor: NaiveDate,
  view: ViewMode,
  week_start: Weekday
) -> (NaiveDate, NaiveDate) {
  match view {
    | ViewMode::Day => (anchor, anchor),
    | ViewMode::Week => {
      (
        start_of_week(anchor, week_start),
        end_of_week(anchor, week_start)
      )
    }
    | ViewMode::Month => {
      let first = first_day_of_month(
        anchor.year(),
        anchor.month()
      );
      let last = last_day_of_month(
        anchor.year(),
        anchor.month()
      );
      (
        start_of_week(first, week_start),
        end_of_week(last, week_start)
      )
    }
  }
}

fn window_title(
  anchor: NaiveDate,
  view: ViewMode,
  week_start: Weekday
) -> String {
  match view {
    | ViewMode::Day => {
      anchor
        .format("%A, %B %-d, %Y")
        .to_string()
    }
    | ViewMode::Week => {
      let start =
        start_of_week(anchor, week_start);
      let end =
        end_of_week(anchor, week_start);
      if start.year() == end.year() {
        format!(
          "{} - {}",
          start.format("%b %-d"),
          end.format("%b %-d, %Y")
        )
      } else {
        format!(
          "{} - {}",
          start.format("%b %-d, %Y"),
          end.format("%b %-d, %Y")
        )
      }
    }
    | ViewMode::Month => {
      anchor.format("%B %Y").to_string()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn assert_contiguous(
    window: &ViewWindow
  ) {
    for (idx, pair) in
      window.days.windows(2).enumerate()
    {
      assert_eq!(
        add_days(pair[0].date, 1),
        pair[1].date,
        "gap after index {idx}"
      );
    }
    for (idx, day) in
      window.days.iter().enumerate()
    {
      assert_eq!(day.index, idx);
    }
  }

  #[test]
  fn week_of_june_10_runs_sunday_to_saturday(
  ) {
    let window = ViewWindow::compute(
      date(2024, 6, 10),
      ViewMode::Week,
      Weekday::Sun
    );
    let dates = window
      .days
      .iter()
      .map(|day| day.date)
      .collect::<Vec<_>>();
    assert_eq!(dates.len(), 7);
    assert_eq!(dates[0], date(2024, 6, 9));
    assert_eq!(dates[6], date(2024, 6, 15));
    assert_eq!(
      window.title,
      "Jun 9 - Jun 15, 2024"
    );
    assert_eq!(
      window.weekday_labels(),
      vec![
        "Sun", "Mon", "Tue", "Wed",
        "Thu", "Fri", "Sat"
      ]
    );
  }

  #[test]
  fn day_view_is_the_anchor_alone() {
    let window = ViewWindow::compute(
      date(2024, 6, 10),
      ViewMode::Day,
      Weekday::Sun
    );
    assert_eq!(window.days.len(), 1);
    assert_eq!(
      window.days[0].date,
      date(2024, 6, 10)
    );
    assert_eq!(
      window.title,
      "Monday, June 10, 2024"
    );
  }

  #[test]
  fn month_view_pads_to_whole_weeks() {
    let window = ViewWindow::compute(
      date(2024, 6, 18),
      ViewMode::Month,
      Weekday::Sun
    );
    // June 2024 starts on a Saturday
    // and ends on a Sunday.
    assert_eq!(
      window.first_date(),
      date(2024, 5, 26)
    );
    assert_eq!(
      window.last_date(),
      date(2024, 7, 6)
    );
    assert_eq!(window.days.len(), 42);
    assert_eq!(window.title, "June 2024");
    assert!(!window.days[0].is_current_month);
    assert!(window.days[6].is_current_month);
    assert!(
      !window.days[41].is_current_month
    );
    assert_contiguous(&window);
  }

  #[test]
  fn february_can_fit_four_rows() {
    let window = ViewWindow::compute(
      date(2015, 2, 1),
      ViewMode::Month,
      Weekday::Sun
    );
    assert_eq!(window.days.len(), 28);
    assert_eq!(window.row_count(), 4);
    assert!(
      window
        .days
        .iter()
        .all(|day| day.is_current_month)
    );
  }

  #[test]
  fn windows_are_sorted_contiguous_multiples_of_seven(
  ) {
    let mut anchor = date(2023, 11, 3);
    for _ in 0..500 {
      for week_start in
        [Weekday::Sun, Weekday::Mon]
      {
        let day = ViewWindow::compute(
          anchor,
          ViewMode::Day,
          week_start
        );
        assert_eq!(day.days.len(), 1);

        let week = ViewWindow::compute(
          anchor,
          ViewMode::Week,
          week_start
        );
        assert_eq!(week.days.len(), 7);
        assert!(week.contains(anchor));
        assert_eq!(
          week.days[0].date.weekday(),
          week_start
        );
        assert_contiguous(&week);

        let month = ViewWindow::compute(
          anchor,
          ViewMode::Month,
          week_start
        );
        assert_eq!(month.days.len() % 7, 0);
        assert!(month.contains(anchor));
        assert_contiguous(&month);
        let in_month = month
          .days
          .iter()
          .filter(|day| {
            day.is_current_month
          })
          .count() as u32;
        assert_eq!(
          in_month,
          last_day_of_month(
            anchor.year(),
            anchor.month()
          )
          .day()
        );
      }
      anchor = add_days(anchor, 3);
    }
  }

  #[test]
  fn week_title_spans_years() {
    let window = ViewWindow::compute(
      date(2024, 12, 31),
      ViewMode::Week,
      Weekday::Sun
    );
    assert_eq!(
      window.title,
      "Dec 29, 2024 - Jan 4, 2025"
    );
  }

  #[test]
  fn index_of_rejects_dates_outside() {
    let window = ViewWindow::compute(
      date(2024, 6, 10),
      ViewMode::Week,
      Weekday::Sun
    );
    assert_eq!(
      window.index_of(date(2024, 6, 12)),
      Some(3)
    );
    assert_eq!(
      window.index_of(date(2024, 6, 8)),
      None
    );
    assert_eq!(
      window.index_of(date(2024, 6, 16)),
      None
    );
  }

  #[test]
  fn view_mode_parses_keys() {
    assert_eq!(
      "Week".parse::<ViewMode>(),
      Ok(ViewMode::Week)
    );
    assert!(
      "quarter".parse::<ViewMode>().is_err()
    );
  }
}
