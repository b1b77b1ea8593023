use chrono::{DateTime, Utc};

use crate::model::{CapacityLimits, CapacityShift, SlotOverride, SlotTemplate};
use crate::observability;
use crate::timezone;

/// Per-minute capacity lookup. The evaluator only ever sees this trait;
/// which model backs it is a deployment choice.
pub trait CapacityResolver {
    fn capacity_at(&self, minute: DateTime<Utc>) -> CapacityLimits;
}

// ── Shift-based model ────────────────────────────────────────────

/// Overlays concrete capacity shifts. A minute covered by no shift has zero
/// capacity; a minute covered by several gets their sum, since overlapping
/// shifts declare concurrently available staff rather than competing claims.
pub struct ShiftCapacityResolver {
    shifts: Vec<CapacityShift>,
    productivity_factor: f64,
}

impl ShiftCapacityResolver {
    pub fn new(mut shifts: Vec<CapacityShift>, productivity_factor: f64) -> Self {
        shifts.sort_by_key(|s| s.window.start);
        flag_overlaps(&shifts);
        Self {
            shifts,
            productivity_factor,
        }
    }
}

/// Overlapping shifts may be deliberate (extra temporary staff) or a data
/// entry mistake; sum them but surface each pair for planner review.
fn flag_overlaps(shifts: &[CapacityShift]) {
    for (i, a) in shifts.iter().enumerate() {
        for b in &shifts[i + 1..] {
            if !a.window.overlaps(&b.window) {
                break; // sorted by start: nothing later can reach back
            }
            tracing::warn!(
                first = %a.id,
                second = %b.id,
                "overlapping capacity shifts; contributions are summed"
            );
            metrics::counter!(observability::OVERLAPPING_SHIFTS_TOTAL).increment(1);
        }
    }
}

impl CapacityResolver for ShiftCapacityResolver {
    fn capacity_at(&self, minute: DateTime<Utc>) -> CapacityLimits {
        let mut workers: u32 = 0;
        let mut forklifts: u32 = 0;
        let mut docks: Option<u32> = None;
        let mut unconstrained_docks = false;
        let mut matched = false;

        for shift in &self.shifts {
            if shift.window.start > minute {
                break;
            }
            if !shift.window.contains_instant(minute) {
                continue;
            }
            matched = true;
            workers += shift.workers;
            forklifts += shift.forklifts;
            match shift.docks {
                Some(d) => docks = Some(docks.unwrap_or(0) + d),
                None => unconstrained_docks = true,
            }
        }

        if !matched {
            return CapacityLimits::CLOSED;
        }
        CapacityLimits {
            work_minutes_per_minute: workers as f64 * self.productivity_factor,
            forklifts: Some(forklifts),
            docks: if unconstrained_docks {
                None
            } else {
                docks.or(Some(0))
            },
        }
    }
}

// ── Slot-template / points model ─────────────────────────────────

/// Projects recurring weekly templates (plus per-date overrides) into a
/// work-minute rate of `max_points × work_minutes_per_point`. The points
/// model does not constrain forklifts or docks.
pub struct SlotPointsResolver {
    templates: Vec<SlotTemplate>,
    overrides: Vec<SlotOverride>,
    work_minutes_per_point: f64,
}

impl SlotPointsResolver {
    pub fn new(
        templates: Vec<SlotTemplate>,
        overrides: Vec<SlotOverride>,
        work_minutes_per_point: f64,
    ) -> Self {
        Self {
            templates: templates.into_iter().filter(|t| t.active).collect(),
            overrides,
            work_minutes_per_point,
        }
    }

    /// Points in effect for a template slot on a date: a slot-specific
    /// override wins over a whole-day override, which wins over the template.
    fn effective_points(&self, template: &SlotTemplate, date: chrono::NaiveDate) -> u32 {
        let mut whole_day: Option<u32> = None;
        for ov in self.overrides.iter().filter(|o| o.date == date) {
            match ov.start_time {
                Some(start) if start == template.start_time => return ov.max_points,
                None => whole_day = Some(ov.max_points),
                _ => {}
            }
        }
        whole_day.unwrap_or(template.max_points)
    }
}

impl CapacityResolver for SlotPointsResolver {
    fn capacity_at(&self, minute: DateTime<Utc>) -> CapacityLimits {
        let date = timezone::local_date(minute);
        let time = timezone::local_time(minute);
        let dow = timezone::day_of_week(date);

        for template in &self.templates {
            if template.day_of_week != dow {
                continue;
            }
            if time < template.start_time || time >= template.end_time {
                continue;
            }
            let points = self.effective_points(template, date);
            return CapacityLimits {
                work_minutes_per_minute: points as f64 * self.work_minutes_per_point,
                forklifts: None,
                docks: None,
            };
        }
        CapacityLimits::CLOSED
    }
}
