use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Default,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  #[default]
  Pending,
  InProgress,
  Completed,
  Cancelled
}

impl JobStatus {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Pending => "pending",
      | Self::InProgress => "in_progress",
      | Self::Completed => "completed",
      | Self::Cancelled => "cancelled"
    }
  }

  pub fn is_closed(self) -> bool {
    matches!(
      self,
      Self::Completed | Self::Cancelled
    )
  }
}

/// A dispatch job as handed over by the
/// job store. Dates and times stay as
/// the raw strings the store produced;
/// parsing belongs to the consumer.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct Job {
  pub id:              String,
  #[serde(default)]
  pub title:           String,
  pub scheduled_date:  String,
  #[serde(default)]
  pub start_time:      Option<String>,
  #[serde(default)]
  pub end_time:        Option<String>,
  #[serde(default)]
  pub status:          JobStatus,
  #[serde(default)]
  pub time_extensions: f64,
  #[serde(default)]
  pub assignee:        Option<String>
}

impl Job {
  pub fn new(
    id: impl Into<String>,
    title: impl Into<String>,
    scheduled_date: impl Into<String>
  ) -> Self {
    Self {
      id:              id.into(),
      title:           title.into(),
      scheduled_date:  scheduled_date
        .into(),
      start_time:      None,
      end_time:        None,
      status:          JobStatus::Pending,
      time_extensions: 0.0,
      assignee:        None
    }
  }

  pub fn with_times(
    mut self,
    start: &str,
    end: &str
  ) -> Self {
    self.start_time =
      Some(start.to_string());
    self.end_time =
      Some(end.to_string());
    self
  }

  pub fn display_title(&self) -> String {
    let title = self.title.trim();
    if title.is_empty() {
      format!("Job {}", self.id)
    } else {
      title.to_string()
    }
  }

  /// Jobs without a start time have no
  /// place on the hour grid.
  pub fn is_unscheduled(&self) -> bool {
    self
      .start_time
      .as_deref()
      .map(|raw| raw.trim().is_empty())
      .unwrap_or(true)
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Staff {
  pub id:    String,
  pub name:  String,
  #[serde(default)]
  pub color: Option<String>
}

/// Action flags for the signed-in user.
#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
  #[serde(default)]
  pub can_move:   bool,
  #[serde(default)]
  pub can_extend: bool,
  #[serde(default)]
  pub can_cancel: bool,
  #[serde(default)]
  pub can_create: bool
}

impl Capabilities {
  pub fn all() -> Self {
    Self {
      can_move:   true,
      can_extend: true,
      can_cancel: true,
      can_create: true
    }
  }
}
