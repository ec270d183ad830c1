use std::str::FromStr;

use chrono::{
  NaiveDate,
  Weekday
};
use serde::Serialize;
use tracing::info;

use crate::datetime::{
  Clock,
  add_days,
  parse_date,
  shift_months
};
use crate::error::CalendarError;
use crate::view_window::{
  ViewMode,
  ViewWindow
};

/// What the calendar is looking at.
/// Transitions build a new value; a
/// state is never edited in place.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct ViewState {
  pub view:          ViewMode,
  pub anchor_date:   NaiveDate,
  pub selected_date: Option<NaiveDate>
}

impl ViewState {
  pub fn new(
    view: ViewMode,
    anchor_date: NaiveDate
  ) -> Self {
    Self {
      view,
      anchor_date,
      selected_date: None
    }
  }

  #[must_use]
  pub fn next(self) -> Self {
    self.shifted(1)
  }

  #[must_use]
  pub fn previous(self) -> Self {
    self.shifted(-1)
  }

  fn shifted(self, step: i32) -> Self {
    let anchor_date = match self.view {
      | ViewMode::Day => {
        add_days(
          self.anchor_date,
          i64::from(step)
        )
      }
      | ViewMode::Week => {
        add_days(
          self.anchor_date,
          i64::from(step) * 7
        )
      }
      | ViewMode::Month => {
        shift_months(
          self.anchor_date,
          step
        )
      }
    };
    Self {
      anchor_date,
      ..self
    }
  }

  #[must_use]
  pub fn today(
    self,
    today: NaiveDate
  ) -> Self {
    Self {
      anchor_date: today,
      ..self
    }
  }

  #[must_use]
  pub fn with_view(
    self,
    view: ViewMode
  ) -> Self {
    Self { view, ..self }
  }

  /// Month cell click: week view, the
  /// clicked day as anchor and as
  /// selection, in one step.
  #[must_use]
  pub fn zoom_to_week(
    self,
    date: NaiveDate
  ) -> Self {
    Self {
      view:          ViewMode::Week,
      anchor_date:   date,
      selected_date: Some(date)
    }
  }

  #[must_use]
  pub fn select(
    self,
    date: NaiveDate
  ) -> Self {
    Self {
      selected_date: Some(date),
      ..self
    }
  }

  pub fn window(
    &self,
    week_start: Weekday
  ) -> ViewWindow {
    ViewWindow::compute(
      self.anchor_date,
      self.view,
      week_start
    )
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
#[serde(
  tag = "event",
  content = "value",
  rename_all = "snake_case"
)]
pub enum NavEvent {
  Next,
  Previous,
  Today,
  SetView(ViewMode),
  ZoomToWeek(NaiveDate),
  Select(NaiveDate)
}

impl FromStr for NavEvent {
  type Err = CalendarError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let invalid = || {
      CalendarError::InvalidNavEvent(
        s.to_string()
      )
    };
    let trimmed = s.trim();
    let (name, arg) = trimmed
      .split_once(':')
      .map(|(name, arg)| {
        (name, Some(arg))
      })
      .unwrap_or((trimmed, None));

    match (
      name.to_ascii_lowercase().as_str(),
      arg
    ) {
      | ("next", None) => Ok(Self::Next),
      | ("prev" | "previous", None) => {
        Ok(Self::Previous)
      }
      | ("today", None) => Ok(Self::Today),
      | ("view", Some(raw)) => {
        ViewMode::from_key(raw)
          .map(Self::SetView)
          .ok_or_else(invalid)
      }
      | ("zoom", Some(raw)) => {
        parse_date(raw)
          .map(Self::ZoomToWeek)
          .map_err(|_| invalid())
      }
      | ("select", Some(raw)) => {
        parse_date(raw)
          .map(Self::Select)
          .map_err(|_| invalid())
      }
      | _ => Err(invalid())
    }
  }
}

/// Owns the calendar's `ViewState`. All
/// changes go through its transition
/// methods.
#[derive(Debug, Clone)]
pub struct NavigationController<C> {
  state: ViewState,
  clock: C
}

impl<C: Clock> NavigationController<C> {
  pub fn new(
    state: ViewState,
    clock: C
  ) -> Self {
    Self { state, clock }
  }

  /// Starts on today's date.
  pub fn starting_today(
    view: ViewMode,
    clock: C
  ) -> Self {
    let today = clock.today();
    Self::new(
      ViewState::new(view, today),
      clock
    )
  }

  pub fn state(&self) -> ViewState {
    self.state
  }

  pub fn next(&mut self) -> ViewState {
    self.apply(NavEvent::Next)
  }

  pub fn previous(
    &mut self
  ) -> ViewState {
    self.apply(NavEvent::Previous)
  }

  pub fn today(&mut self) -> ViewState {
    self.apply(NavEvent::Today)
  }

  pub fn set_view(
    &mut self,
    view: ViewMode
  ) -> ViewState {
    self.apply(NavEvent::SetView(view))
  }

  pub fn zoom_to_week(
    &mut self,
    date: NaiveDate
  ) -> ViewState {
    self.apply(NavEvent::ZoomToWeek(date))
  }

  pub fn select_date(
    &mut self,
    date: NaiveDate
  ) -> ViewState {
    self.apply(NavEvent::Select(date))
  }

  pub fn apply(
    &mut self,
    event: NavEvent
  ) -> ViewState {
    let from = self.state;
    let to = match event {
      | NavEvent::Next => from.next(),
      | NavEvent::Previous => {
        from.previous()
      }
      | NavEvent::Today => {
        from.today(self.clock.today())
      }
      | NavEvent::SetView(view) => {
        from.with_view(view)
      }
      | NavEvent::ZoomToWeek(date) => {
        from.zoom_to_week(date)
      }
      | NavEvent::Select(date) => {
        from.select(date)
      }
    };

    info!(
      event = ?event,
      from = %from.anchor_date,
      to = %to.anchor_date,
      view = %to.view,
      "calendar navigation"
    );
    self.state = to;
    to
  }

  pub fn window(
    &self,
    week_start: Weekday
  ) -> ViewWindow {
    self.state.window(week_start)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::datetime::FixedClock;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn clock() -> FixedClock {
    FixedClock(
      date(2024, 6, 10)
        .and_hms_opt(14, 5, 0)
        .expect("valid time")
    )
  }

  #[test]
  fn steps_follow_the_view_unit() {
    let day = ViewState::new(
      ViewMode::Day,
      date(2024, 6, 10)
    );
    assert_eq!(
      day.next().anchor_date,
      date(2024, 6, 11)
    );
    assert_eq!(
      day.previous().anchor_date,
      date(2024, 6, 9)
    );

    let week = day.with_view(ViewMode::Week);
    assert_eq!(
      week.next().anchor_date,
      date(2024, 6, 17)
    );
    assert_eq!(
      week.previous().anchor_date,
      date(2024, 6, 3)
    );
  }

  #[test]
  fn month_steps_land_on_the_first() {
    let month = ViewState::new(
      ViewMode::Month,
      date(2024, 1, 31)
    );
    assert_eq!(
      month.next().anchor_date,
      date(2024, 2, 1)
    );
    assert_eq!(
      month.previous().anchor_date,
      date(2023, 12, 1)
    );
    assert_eq!(
      month.next().next().anchor_date,
      date(2024, 3, 1)
    );
  }

  #[test]
  fn set_view_keeps_the_anchor_week() {
    let mut nav = NavigationController::new(
      ViewState::new(
        ViewMode::Month,
        date(2024, 6, 12)
      ),
      clock()
    );
    let state = nav.set_view(ViewMode::Week);
    assert_eq!(state.anchor_date, date(2024, 6, 12));
    assert!(
      nav
        .window(Weekday::Sun)
        .contains(date(2024, 6, 12))
    );
  }

  #[test]
  fn zoom_to_week_sets_view_anchor_and_selection(
  ) {
    let mut nav =
      NavigationController::starting_today(
        ViewMode::Month,
        clock()
      );
    let month = nav.window(Weekday::Sun);

    for day in month.days.iter().map(|d| d.date) {
      let state = nav.zoom_to_week(day);
      assert_eq!(state.view, ViewMode::Week);
      assert_eq!(state.anchor_date, day);
      assert_eq!(state.selected_date, Some(day));
      assert!(
        nav.window(Weekday::Sun).contains(day)
      );
      nav.set_view(ViewMode::Month);
    }
  }

  #[test]
  fn today_returns_to_the_clock_date() {
    let mut nav = NavigationController::new(
      ViewState::new(
        ViewMode::Week,
        date(2023, 1, 1)
      ),
      clock()
    );
    nav.next();
    let state = nav.today();
    assert_eq!(state.anchor_date, date(2024, 6, 10));
    assert_eq!(state.view, ViewMode::Week);
  }

  #[test]
  fn transitions_leave_old_states_untouched(
  ) {
    let before = ViewState::new(
      ViewMode::Week,
      date(2024, 6, 10)
    );
    let after = before.zoom_to_week(date(2024, 7, 4));
    assert_eq!(before.anchor_date, date(2024, 6, 10));
    assert_eq!(before.selected_date, None);
    assert_ne!(before, after);
  }

  #[test]
  fn parses_nav_events() {
    assert_eq!(
      "next".parse::<NavEvent>(),
      Ok(NavEvent::Next)
    );
    assert_eq!(
      "prev".parse::<NavEvent>(),
      Ok(NavEvent::Previous)
    );
    assert_eq!(
      "view:month".parse::<NavEvent>(),
      Ok(NavEvent::SetView(ViewMode::Month))
    );
    assert_eq!(
      "zoom:2024-06-12".parse::<NavEvent>(),
      Ok(NavEvent::ZoomToWeek(date(2024, 6, 12)))
    );
    assert!("zoom:tomorrow".parse::<NavEvent>().is_err());
    assert!("sideways".parse::<NavEvent>().is_err());
  }
}
