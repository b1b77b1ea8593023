use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::timezone;

/// Half-open UTC window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end, "Window start must be before end");
        Self { start, end }
    }

    /// Whole-minute length, rounded up for ragged boundaries.
    pub fn duration_minutes(&self) -> i64 {
        let ms = (self.end - self.start).num_milliseconds();
        (ms + 59_999).div_euclid(60_000)
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    /// Iterate every whole minute of the window in ascending order, starting
    /// from the minute boundary containing `start`.
    pub fn minutes(&self) -> MinuteIter {
        MinuteIter {
            next: timezone::minute_floor(self.start),
            remaining: self.duration_minutes(),
        }
    }
}

pub struct MinuteIter {
    next: DateTime<Utc>,
    remaining: i64,
}

impl Iterator for MinuteIter {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<DateTime<Utc>> {
        if self.remaining <= 0 {
            return None;
        }
        let current = self.next;
        self.next += chrono::Duration::minutes(1);
        self.remaining -= 1;
        Some(current)
    }
}

/// A concrete declaration of available staff and machinery over a UTC range.
/// Outside every shift the warehouse has no capacity at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityShift {
    pub id: Ulid,
    pub window: Window,
    pub workers: u32,
    pub forklifts: u32,
    /// `None` means dock usage is not limited during this shift.
    pub docks: Option<u32>,
}

/// A recurring weekly capacity rule in abstract points, local warehouse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTemplate {
    pub id: Ulid,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_points: u32,
    pub active: bool,
}

/// A per-date exception to the weekly templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotOverride {
    pub id: Ulid,
    /// Local calendar date the override applies to.
    pub date: NaiveDate,
    /// Slot being overridden; `None` applies to every slot that day.
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub max_points: u32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentSize {
    S,
    M,
    L,
}

/// A booked delivery. Capacity accounting always uses the planned `window`;
/// `actual_start`/`actual_end` are floor check-in stamps for later analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub provider_id: Option<Ulid>,
    pub provider_name: String,
    pub window: Window,
    /// Total work-minutes over the whole window, amortized per minute.
    pub work_minutes_needed: u32,
    /// Forklifts held concurrently for the whole window.
    pub forklifts_needed: u32,
    /// `None` means the delivery does not occupy a dock.
    pub docks_needed: Option<u32>,
    pub dock_code: Option<String>,
    pub goods_type: Option<String>,
    pub units: Option<u32>,
    pub lines: Option<u32>,
    /// Soft cancellation marker; cancelled appointments never count as usage.
    pub cancelled_at: Option<DateTime<Utc>>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub size: AppointmentSize,
    pub points_used: u32,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }

    /// Work-minutes consumed per elapsed minute: the total spread evenly
    /// across the planned duration, never a lump sum in one minute.
    pub fn work_rate(&self) -> f64 {
        self.work_minutes_needed as f64 / self.window.duration_minutes() as f64
    }
}

/// What a caller proposes to book. `id` is set when re-validating an
/// existing appointment so it does not conflict with itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: Option<Ulid>,
    pub provider_id: Option<Ulid>,
    pub provider_name: String,
    pub window: Window,
    pub work_minutes_needed: u32,
    pub forklifts_needed: u32,
    pub docks_needed: Option<u32>,
    pub dock_code: Option<String>,
    pub goods_type: Option<String>,
    pub units: Option<u32>,
    pub lines: Option<u32>,
}

impl BookingRequest {
    pub fn work_rate(&self) -> f64 {
        self.work_minutes_needed as f64 / self.window.duration_minutes() as f64
    }
}

/// Capacity in effect at one minute. `None` means unconstrained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityLimits {
    pub work_minutes_per_minute: f64,
    pub forklifts: Option<u32>,
    pub docks: Option<u32>,
}

impl CapacityLimits {
    /// No shift in effect: nothing is available.
    pub const CLOSED: CapacityLimits = CapacityLimits {
        work_minutes_per_minute: 0.0,
        forklifts: Some(0),
        docks: Some(0),
    };
}

/// Usage already committed at one minute.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResourceUsage {
    pub work_minutes: f64,
    pub forklifts: u32,
    pub docks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedRule {
    Work,
    Forklifts,
    Docks,
}

/// The first offending minute of a rejected proposal, with the used/available
/// numbers a calendar UI renders. Field names are part of the JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    /// Offending minute as a UTC instant.
    pub minute: DateTime<Utc>,
    /// Same minute rendered as warehouse wall-clock time.
    pub minute_local: String,
    pub work_used: f64,
    pub work_available: f64,
    pub forklifts_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forklifts_available: Option<u32>,
    pub docks_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docks_available: Option<u32>,
    pub failed_rule: FailedRule,
}

/// Every committed mutation, flat. Stores apply these; the notify hub
/// broadcasts them to calendar views and notification senders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    AppointmentBooked { appointment: Appointment },
    AppointmentRescheduled { appointment: Appointment },
    AppointmentCancelled { id: Ulid, at: DateTime<Utc> },
    AppointmentCheckedIn { id: Ulid, at: DateTime<Utc> },
    AppointmentCheckedOut { id: Ulid, at: DateTime<Utc> },
    CheckInReverted { id: Ulid },
    ShiftCreated { shift: CapacityShift },
    ShiftUpdated { shift: CapacityShift },
    ShiftDeleted { id: Ulid },
    TemplateCreated { template: SlotTemplate },
    TemplateUpdated { template: SlotTemplate },
    TemplateDeleted { id: Ulid },
    OverrideSet { entry: SlotOverride },
    OverrideCleared { id: Ulid },
}

// ── Query result types ───────────────────────────────────────────

/// Live used/available numbers for one minute, for the capacity indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinuteSnapshot {
    pub minute: DateTime<Utc>,
    pub minute_local: String,
    pub work_used: f64,
    pub work_available: f64,
    pub forklifts_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forklifts_available: Option<u32>,
    pub docks_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docks_available: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ResourceTotals {
    /// Resource-minutes consumed within the queried range.
    pub used: f64,
    /// Resource-minutes declared by shifts within the queried range.
    pub available: f64,
}

/// Range utilization per resource; the headline percentage is the
/// bottleneck (most saturated) resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Utilization {
    pub appointment_count: usize,
    pub capacity_percentage: f64,
    pub workers_percentage: f64,
    pub forklifts_percentage: f64,
    pub docks_percentage: f64,
    pub peak_day: Option<NaiveDate>,
    pub peak_percentage: f64,
    pub workers: ResourceTotals,
    pub forklifts: ResourceTotals,
    pub docks: ResourceTotals,
}

/// One bookable slot on a concrete date, after override overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotInfo {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_points: u32,
    pub is_override: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotUsage {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_points: u32,
    pub points_used: u32,
    pub points_available: i64,
    pub is_override: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<SlotUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, min, 0).unwrap()
    }

    #[test]
    fn window_basics() {
        let w = Window::new(at(9, 0), at(10, 30));
        assert_eq!(w.duration_minutes(), 90);
        assert!(w.contains_instant(at(9, 0)));
        assert!(w.contains_instant(at(10, 29)));
        assert!(!w.contains_instant(at(10, 30))); // half-open
    }

    #[test]
    fn window_overlap() {
        let a = Window::new(at(9, 0), at(10, 0));
        let b = Window::new(at(9, 30), at(10, 30));
        let c = Window::new(at(10, 0), at(11, 0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn ragged_duration_rounds_up() {
        let w = Window {
            start: at(9, 0),
            end: at(9, 1) + chrono::Duration::seconds(30),
        };
        assert_eq!(w.duration_minutes(), 2);
    }

    #[test]
    fn minutes_walk_is_ascending_and_bounded() {
        let w = Window::new(at(9, 0), at(9, 5));
        let walked: Vec<_> = w.minutes().collect();
        assert_eq!(walked.len(), 5);
        assert_eq!(walked[0], at(9, 0));
        assert_eq!(walked[4], at(9, 4));
    }

    #[test]
    fn minutes_walk_floors_ragged_start() {
        let w = Window {
            start: at(9, 0) + chrono::Duration::seconds(20),
            end: at(9, 2),
        };
        let walked: Vec<_> = w.minutes().collect();
        assert_eq!(walked[0], at(9, 0));
        assert_eq!(walked.len(), 2);
    }

    #[test]
    fn work_rate_amortizes_total_over_duration() {
        let appt = Appointment {
            id: Ulid::new(),
            provider_id: None,
            provider_name: "Acme".into(),
            window: Window::new(at(9, 0), at(10, 30)),
            work_minutes_needed: 60,
            forklifts_needed: 1,
            docks_needed: Some(1),
            dock_code: None,
            goods_type: None,
            units: None,
            lines: None,
            cancelled_at: None,
            actual_start: None,
            actual_end: None,
            size: AppointmentSize::M,
            points_used: 2,
            created_at: at(8, 0),
        };
        let rate = appt.work_rate();
        assert!((rate - 60.0 / 90.0).abs() < 1e-12);
    }

    #[test]
    fn conflict_report_serializes_to_ui_shape() {
        let report = ConflictReport {
            minute: at(9, 0),
            minute_local: "2025-03-10 10:00".into(),
            work_used: 3.67,
            work_available: 3.0,
            forklifts_used: 2,
            forklifts_available: Some(2),
            docks_used: 1,
            docks_available: None,
            failed_rule: FailedRule::Work,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failedRule"], "work");
        assert_eq!(json["workUsed"], 3.67);
        assert_eq!(json["minuteLocal"], "2025-03-10 10:00");
        assert!(json.get("docksAvailable").is_none()); // unconstrained → omitted
        assert_eq!(json["forkliftsAvailable"], 2);
    }
}
