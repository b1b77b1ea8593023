use chrono::{DateTime, Duration, Utc};
use ulid::Ulid;

use crate::limits::MAX_QUERY_WINDOW_MINUTES;
use crate::model::*;
use crate::observability;
use crate::timezone;

use super::conflict::{self, round2};
use super::store::ScheduleStore;
use super::usage::usage_at;
use super::{Engine, EngineError};

impl<S: ScheduleStore> Engine<S> {
    /// Pre-validate a proposal without booking it. Reads take no lock and
    /// may be stale; the booking path re-checks under the gate.
    pub async fn evaluate(
        &self,
        request: &BookingRequest,
    ) -> Result<Option<ConflictReport>, EngineError> {
        conflict::validate_request(request)?;
        self.evaluate_window(request).await
    }

    /// Fetch, filter and walk. Shared by the public pre-validation and the
    /// locked commit-time re-check.
    pub(super) async fn evaluate_window(
        &self,
        request: &BookingRequest,
    ) -> Result<Option<ConflictReport>, EngineError> {
        let started = std::time::Instant::now();
        let resolver = self.resolver_for(&request.window).await?;
        let existing = self.existing_for(&request.window).await?;
        let verdict = conflict::evaluate(request, &existing, resolver.as_ref());

        metrics::histogram!(observability::EVALUATION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        let outcome = match &verdict {
            Some(report) => observability::rule_label(report.failed_rule),
            None => "clear",
        };
        metrics::counter!(observability::EVALUATIONS_TOTAL, "outcome" => outcome).increment(1);
        Ok(verdict)
    }

    /// Live used/available numbers for one minute, for the capacity
    /// indicator next to the booking dialog.
    pub async fn capacity_at(&self, minute: DateTime<Utc>) -> Result<MinuteSnapshot, EngineError> {
        let minute = timezone::minute_floor(minute);
        let window = Window::new(minute, minute + Duration::minutes(1));
        let resolver = self.resolver_for(&window).await?;
        let existing = self.existing_for(&window).await?;

        let limits = resolver.capacity_at(minute);
        let used = usage_at(&existing, minute, None);
        Ok(MinuteSnapshot {
            minute,
            minute_local: timezone::local_minute(minute),
            work_used: round2(used.work_minutes),
            work_available: limits.work_minutes_per_minute,
            forklifts_used: used.forklifts,
            forklifts_available: limits.forklifts,
            docks_used: used.docks,
            docks_available: limits.docks,
        })
    }

    /// Utilization over a range, split by resource. The headline percentage
    /// is the most saturated resource; the peak day is tracked over local
    /// calendar days. Days without shifts contribute no capacity.
    pub async fn utilization(&self, window: Window) -> Result<Utilization, EngineError> {
        validate_query_window(&window)?;

        let shifts = super::filter_valid_shifts(self.store().shifts_overlapping(&window).await?);
        let appointments = self.existing_for(&window).await?;
        let productivity = self.config().productivity_factor;

        let mut workers = ResourceTotals::default();
        let mut forklifts = ResourceTotals::default();
        let mut docks = ResourceTotals::default();
        let mut peak_day = None;
        let mut peak_percentage = 0.0f64;

        for date in Self::local_dates_of(&window) {
            let full_day = timezone::local_day_window(date);
            let day = match clamp(&full_day, &window) {
                Some(day) => day,
                None => continue,
            };

            let mut day_workers = ResourceTotals::default();
            let mut day_forklifts = ResourceTotals::default();
            let mut day_docks = ResourceTotals::default();

            for shift in &shifts {
                let minutes = overlap_minutes(&shift.window, &day);
                if minutes <= 0.0 {
                    continue;
                }
                day_workers.available += shift.workers as f64 * productivity * minutes;
                day_forklifts.available += shift.forklifts as f64 * minutes;
                if let Some(d) = shift.docks {
                    day_docks.available += d as f64 * minutes;
                }
            }

            for appt in &appointments {
                let minutes = overlap_minutes(&appt.window, &day);
                if minutes <= 0.0 {
                    continue;
                }
                // the share of the total work requirement falling in this day
                let fraction = minutes / appt.window.duration_minutes() as f64;
                day_workers.used += appt.work_minutes_needed as f64 * fraction;
                day_forklifts.used += appt.forklifts_needed as f64 * minutes;
                day_docks.used += appt.docks_needed.unwrap_or(0) as f64 * minutes;
            }

            let day_pct = pct(&day_workers).max(pct(&day_forklifts)).max(pct(&day_docks));
            if day_pct > peak_percentage {
                peak_percentage = day_pct;
                peak_day = Some(date);
            }

            accumulate(&mut workers, &day_workers);
            accumulate(&mut forklifts, &day_forklifts);
            accumulate(&mut docks, &day_docks);
        }

        let workers_percentage = pct(&workers);
        let forklifts_percentage = pct(&forklifts);
        let docks_percentage = pct(&docks);

        Ok(Utilization {
            appointment_count: appointments.len(),
            capacity_percentage: round1(
                workers_percentage.max(forklifts_percentage).max(docks_percentage),
            ),
            workers_percentage: round1(workers_percentage),
            forklifts_percentage: round1(forklifts_percentage),
            docks_percentage: round1(docks_percentage),
            peak_day,
            peak_percentage: round1(peak_percentage),
            workers,
            forklifts,
            docks,
        })
    }

    /// Non-cancelled appointments overlapping the range, oldest first,
    /// optionally narrowed to one provider.
    pub async fn list_appointments(
        &self,
        window: Window,
        provider_id: Option<Ulid>,
    ) -> Result<Vec<Appointment>, EngineError> {
        validate_query_window(&window)?;
        let mut appointments = self.store().appointments_overlapping(&window).await?;
        if let Some(pid) = provider_id {
            appointments.retain(|a| a.provider_id == Some(pid));
        }
        Ok(appointments)
    }

    pub async fn appointment(&self, id: Ulid) -> Result<Appointment, EngineError> {
        self.store()
            .appointment(id)
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    pub async fn list_shifts(&self, window: Window) -> Result<Vec<CapacityShift>, EngineError> {
        validate_query_window(&window)?;
        Ok(self.store().shifts_overlapping(&window).await?)
    }
}

fn validate_query_window(window: &Window) -> Result<(), EngineError> {
    if window.start >= window.end {
        return Err(EngineError::Validation("range end must be after start"));
    }
    if window.duration_minutes() > MAX_QUERY_WINDOW_MINUTES {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

fn clamp(inner: &Window, outer: &Window) -> Option<Window> {
    let start = inner.start.max(outer.start);
    let end = inner.end.min(outer.end);
    (start < end).then(|| Window::new(start, end))
}

/// Fractional minutes two windows share; zero when disjoint.
fn overlap_minutes(a: &Window, b: &Window) -> f64 {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    if start >= end {
        return 0.0;
    }
    (end - start).num_milliseconds() as f64 / 60_000.0
}

fn accumulate(total: &mut ResourceTotals, day: &ResourceTotals) {
    total.used += day.used;
    total.available += day.available;
}

fn pct(t: &ResourceTotals) -> f64 {
    if t.available > 0.0 {
        t.used / t.available * 100.0
    } else {
        0.0
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
