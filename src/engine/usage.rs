use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::limits::{MAX_VALID_TIMESTAMP, MIN_VALID_TIMESTAMP};
use crate::model::{Appointment, CapacityShift, ResourceUsage};
use crate::observability;

/// Usage already committed at `minute` across non-cancelled appointments,
/// excluding the appointment being re-validated when an id is given.
pub fn usage_at(
    appointments: &[Appointment],
    minute: DateTime<Utc>,
    exclude: Option<Ulid>,
) -> ResourceUsage {
    let mut usage = ResourceUsage::default();
    for appt in appointments {
        if appt.is_cancelled() {
            continue;
        }
        if exclude == Some(appt.id) {
            continue;
        }
        if !appt.window.contains_instant(minute) {
            continue;
        }
        usage.work_minutes += appt.work_rate();
        usage.forklifts += appt.forklifts_needed;
        usage.docks += appt.docks_needed.unwrap_or(0);
    }
    usage
}

fn window_is_valid(start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start < end && start.timestamp() >= MIN_VALID_TIMESTAMP && end.timestamp() <= MAX_VALID_TIMESTAMP
}

/// Drop stored appointments that violate their own invariants. One bad
/// historical row must not block every future booking; skips are logged
/// and counted instead.
pub fn filter_valid_appointments(appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments
        .into_iter()
        .filter(|a| {
            let ok = window_is_valid(a.window.start, a.window.end);
            if !ok {
                tracing::warn!(id = %a.id, "skipping appointment with invalid window");
                metrics::counter!(observability::INTEGRITY_SKIPS_TOTAL, "entity" => "appointment")
                    .increment(1);
            }
            ok
        })
        .collect()
}

/// Same recovery for capacity shifts read from the store.
pub fn filter_valid_shifts(shifts: Vec<CapacityShift>) -> Vec<CapacityShift> {
    shifts
        .into_iter()
        .filter(|s| {
            let ok = window_is_valid(s.window.start, s.window.end);
            if !ok {
                tracing::warn!(id = %s.id, "skipping capacity shift with invalid window");
                metrics::counter!(observability::INTEGRITY_SKIPS_TOTAL, "entity" => "shift")
                    .increment(1);
            }
            ok
        })
        .collect()
}
