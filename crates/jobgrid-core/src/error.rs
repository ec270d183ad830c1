use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalendarError {
    #[error("invalid time format: {0:?} (expected HH:MM)")]
    InvalidTimeFormat(String),

    #[error("invalid time model: {0}")]
    InvalidTimeModel(String),

    #[error("invalid date: {0:?} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("degenerate geometry for job {job_id}: {field} = {value}")]
    DegenerateGeometry {
        job_id: String,
        field: &'static str,
        value: f64,
    },

    #[error("invalid navigation event: {0:?}")]
    InvalidNavEvent(String),
}

pub type Result<T> = std::result::Result<T, CalendarError>;
