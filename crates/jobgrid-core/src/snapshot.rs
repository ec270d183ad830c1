use std::fs;
use std::path::Path;

use anyhow::Context;
use jobgrid_shared::{Capabilities, Job, Staff};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Jobs, staff and the user's capabilities as handed over by the job store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub staff: Vec<Staff>,
    #[serde(default)]
    pub capabilities: Capabilities,
}

/// File shape before individual records are decoded.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Full {
        #[serde(default)]
        jobs: Vec<Value>,
        #[serde(default)]
        staff: Vec<Value>,
        #[serde(default)]
        capabilities: Capabilities,
    },
    Jobs(Vec<Value>),
}

impl Snapshot {
    /// A bare job array is accepted too; it gets full capabilities.
    ///
    /// Records are decoded one by one. A malformed job or staff entry is
    /// logged and dropped, the rest of the file still loads.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let parsed: SnapshotFile = serde_json::from_str(raw).context("invalid snapshot json")?;
        Ok(match parsed {
            SnapshotFile::Full {
                jobs,
                staff,
                capabilities,
            } => Self {
                jobs: decode_records(jobs, "job"),
                staff: decode_records(staff, "staff"),
                capabilities,
            },
            SnapshotFile::Jobs(jobs) => Self {
                jobs: decode_records(jobs, "job"),
                staff: Vec::new(),
                capabilities: Capabilities::all(),
            },
        })
    }

    #[tracing::instrument(skip(path), fields(file = %path.display()))]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let snapshot = Self::from_json_str(&raw)
            .with_context(|| format!("failed parsing {}", path.display()))?;

        info!(
            jobs = snapshot.jobs.len(),
            staff = snapshot.staff.len(),
            "loaded job snapshot"
        );
        Ok(snapshot)
    }

    /// `None` yields an empty snapshot.
    pub fn load_optional(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                debug!("no job snapshot given, rendering an empty calendar");
                Ok(Self::default())
            }
        }
    }
}

fn decode_records<T: DeserializeOwned>(values: Vec<Value>, kind: &'static str) -> Vec<T> {
    let total = values.len();
    let records = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let id = value.get("id").map(Value::to_string);
            match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(error) => {
                    warn!(kind, index, id = ?id, %error, "dropping malformed record");
                    None
                }
            }
        })
        .collect::<Vec<T>>();

    let dropped = total - records.len();
    if dropped > 0 {
        warn!(kind, dropped, kept = records.len(), "snapshot had malformed records");
    }
    records
}

#[cfg(test)]
mod tests {
    use jobgrid_shared::JobStatus;

    use super::*;

    #[test]
    fn reads_full_snapshots() {
        let raw = r##"{
            "jobs": [
                {"id": "1", "title": "Boiler", "scheduledDate": "2024-06-10",
                 "startTime": "09:00", "endTime": "10:00", "status": "in_progress",
                 "assignee": "s1"}
            ],
            "staff": [{"id": "s1", "name": "Ana", "color": "#2f80ed"}],
            "capabilities": {"canMove": true}
        }"##;
        let snapshot = Snapshot::from_json_str(raw).expect("snapshot");
        assert_eq!(snapshot.jobs.len(), 1);
        assert_eq!(snapshot.jobs[0].status, JobStatus::InProgress);
        assert_eq!(snapshot.staff[0].color.as_deref(), Some("#2f80ed"));
        assert!(snapshot.capabilities.can_move);
        assert!(!snapshot.capabilities.can_create);
    }

    #[test]
    fn bare_arrays_get_every_capability() {
        let raw = r#"[{"id": "7", "scheduledDate": "2024-06-11"}]"#;
        let snapshot = Snapshot::from_json_str(raw).expect("snapshot");
        assert_eq!(snapshot.jobs[0].display_title(), "Job 7");
        assert!(snapshot.jobs[0].is_unscheduled());
        assert_eq!(snapshot.capabilities, Capabilities::all());
    }

    #[test]
    fn malformed_records_are_dropped_not_fatal() {
        let raw = r#"{
            "jobs": [
                {"id": "ok", "title": "Boiler", "scheduledDate": "2024-06-10",
                 "startTime": "09:00", "endTime": "10:00"},
                {"id": "held", "scheduledDate": "2024-06-10", "status": "on_hold"},
                {"id": "numeric", "scheduledDate": "2024-06-10", "startTime": 900},
                {"title": "no id", "scheduledDate": "2024-06-10"}
            ],
            "staff": [{"id": "s1", "name": "Ana"}, {"id": "s2"}],
            "capabilities": {"canCreate": true}
        }"#;
        let snapshot = Snapshot::from_json_str(raw).expect("snapshot");
        let ids = snapshot.jobs.iter().map(|job| job.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["ok"]);
        assert_eq!(snapshot.staff.len(), 1);
        assert!(snapshot.capabilities.can_create);

        let bare = r#"[{"id": "a", "scheduledDate": "2024-06-11"}, {"id": 5}]"#;
        let snapshot = Snapshot::from_json_str(bare).expect("bare snapshot");
        assert_eq!(snapshot.jobs.len(), 1);
        assert_eq!(snapshot.capabilities, Capabilities::all());
    }

    #[test]
    fn rejects_garbage() {
        assert!(Snapshot::from_json_str("{\"jobs\": 3}").is_err());
        assert!(Snapshot::from_json_str("[1, 2").is_err());
        assert!(Snapshot::from_json_str("   ").expect("empty").jobs.is_empty());
    }
}
