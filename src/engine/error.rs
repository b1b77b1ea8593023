use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use crate::model::ConflictReport;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Malformed input, rejected before any evaluation runs.
    Validation(&'static str),
    LimitExceeded(&'static str),
    /// The proposal overflows capacity. An expected negative result the
    /// caller renders, not a fault.
    CapacityConflict(Box<ConflictReport>),
    /// The commit-time re-check failed after pre-validation had passed:
    /// a concurrent booking won the window. Already retried once.
    ConcurrencyConflict(Box<ConflictReport>),
    /// The slot-points view has no room in the requested slot.
    SlotConflict {
        date: NaiveDate,
        start_time: NaiveTime,
        max_points: u32,
        points_used: u32,
        points_needed: u32,
    },
    Store(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::CapacityConflict(report) => write!(
                f,
                "capacity conflict at {} ({} overflows)",
                report.minute_local,
                match report.failed_rule {
                    crate::model::FailedRule::Work => "work minutes",
                    crate::model::FailedRule::Forklifts => "forklifts",
                    crate::model::FailedRule::Docks => "docks",
                }
            ),
            EngineError::ConcurrencyConflict(report) => write!(
                f,
                "window was booked concurrently; conflict at {}",
                report.minute_local
            ),
            EngineError::SlotConflict {
                date,
                start_time,
                max_points,
                points_used,
                points_needed,
            } => write!(
                f,
                "slot {date} {start_time} full: {points_used}/{max_points} points used, {points_needed} requested"
            ),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// The conflict payload, when this error carries one.
    pub fn conflict_report(&self) -> Option<&ConflictReport> {
        match self {
            EngineError::CapacityConflict(r) | EngineError::ConcurrencyConflict(r) => Some(r),
            _ => None,
        }
    }
}
