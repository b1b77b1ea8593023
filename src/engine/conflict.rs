use crate::limits::*;
use crate::model::{Appointment, BookingRequest, ConflictReport, FailedRule};
use crate::timezone;

use super::capacity::CapacityResolver;
use super::usage::usage_at;
use super::EngineError;

/// Tolerance for amortization rounding. Usage exactly equal to capacity is
/// allowed; the check is strictly greater-than.
pub(crate) const CONFLICT_EPSILON: f64 = 1e-6;

pub(crate) fn validate_request(req: &BookingRequest) -> Result<(), EngineError> {
    if req.window.start >= req.window.end {
        return Err(EngineError::Validation("appointment end must be after start"));
    }
    if req.window.start.timestamp() < MIN_VALID_TIMESTAMP
        || req.window.end.timestamp() > MAX_VALID_TIMESTAMP
    {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if req.window.duration_minutes() > MAX_APPOINTMENT_MINUTES {
        return Err(EngineError::LimitExceeded("appointment window too wide"));
    }
    if req.provider_name.trim().is_empty() {
        return Err(EngineError::Validation("provider name required"));
    }
    if req.provider_name.len() > MAX_PROVIDER_NAME_LEN {
        return Err(EngineError::LimitExceeded("provider name too long"));
    }
    if let Some(ref code) = req.dock_code
        && code.len() > MAX_DOCK_CODE_LEN
    {
        return Err(EngineError::LimitExceeded("dock code too long"));
    }
    Ok(())
}

/// Walk the proposed window minute by minute in ascending order and stop at
/// the first minute where committed usage plus the proposal's own
/// contribution overflows some resource. At a failing minute the rules are
/// checked in fixed priority order: work minutes, then forklifts, then
/// docks, and the first overflow names `failed_rule`.
///
/// Returns `None` when every minute fits.
pub fn evaluate(
    request: &BookingRequest,
    existing: &[Appointment],
    capacity: &dyn CapacityResolver,
) -> Option<ConflictReport> {
    let own_rate = request.work_rate();
    let own_docks = request.docks_needed.unwrap_or(0);

    for minute in request.window.minutes() {
        let limits = capacity.capacity_at(minute);
        let used = usage_at(existing, minute, request.id);

        let work_used = used.work_minutes + own_rate;
        let forklifts_used = used.forklifts + request.forklifts_needed;
        let docks_used = used.docks + own_docks;

        let failed = if work_used > limits.work_minutes_per_minute + CONFLICT_EPSILON {
            Some(FailedRule::Work)
        } else if limits.forklifts.is_some_and(|cap| forklifts_used > cap) {
            Some(FailedRule::Forklifts)
        } else if limits.docks.is_some_and(|cap| docks_used > cap) {
            Some(FailedRule::Docks)
        } else {
            None
        };

        if let Some(rule) = failed {
            return Some(ConflictReport {
                minute,
                minute_local: timezone::local_minute(minute),
                work_used: round2(work_used),
                work_available: limits.work_minutes_per_minute,
                forklifts_used,
                forklifts_available: limits.forklifts,
                docks_used,
                docks_available: limits.docks,
                failed_rule: rule,
            });
        }
    }
    None
}

pub(super) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
