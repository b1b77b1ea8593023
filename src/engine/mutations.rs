use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::timezone;

use super::conflict::validate_request;
use super::slots::{points_for_size, size_for_duration};
use super::store::ScheduleStore;
use super::{Engine, EngineError};

impl<S: ScheduleStore> Engine<S> {
    /// Book a new appointment. Pre-validates against a (possibly stale)
    /// snapshot, then re-reads and re-evaluates while holding the booking
    /// gate so concurrent requests can never jointly overflow capacity.
    ///
    /// A conflict at pre-validation surfaces as `CapacityConflict`; one that
    /// only appears at the locked re-check means a concurrent booking won
    /// the window, and after one fresh retry surfaces as
    /// `ConcurrencyConflict`.
    pub async fn book(&self, request: BookingRequest) -> Result<Appointment, EngineError> {
        if request.id.is_some() {
            return Err(EngineError::Validation(
                "use reschedule for an existing appointment",
            ));
        }
        validate_request(&request)?;
        self.check_open_weekday(&request.window)?;

        let appointment = self.appointment_from(&request, Ulid::new());
        self.evaluate_then_commit(&request, appointment, false).await
    }

    /// Re-validate and move an existing appointment. The appointment itself
    /// is excluded from usage so it cannot conflict with its own old window.
    pub async fn reschedule(
        &self,
        id: Ulid,
        mut request: BookingRequest,
    ) -> Result<Appointment, EngineError> {
        request.id = Some(id);
        validate_request(&request)?;
        self.check_open_weekday(&request.window)?;

        let current = self
            .store()
            .appointment(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if current.is_cancelled() {
            return Err(EngineError::Validation("appointment is cancelled"));
        }

        let mut updated = self.appointment_from(&request, id);
        updated.created_at = current.created_at;
        updated.actual_start = current.actual_start;
        updated.actual_end = current.actual_end;

        self.evaluate_then_commit(&request, updated, true).await
    }

    async fn evaluate_then_commit(
        &self,
        request: &BookingRequest,
        appointment: Appointment,
        reschedule: bool,
    ) -> Result<Appointment, EngineError> {
        // cheap rejection before taking the gate
        if let Some(report) = self.evaluate_window(request).await? {
            metrics::counter!(observability::BOOKINGS_TOTAL, "status" => "capacity_conflict")
                .increment(1);
            return Err(EngineError::CapacityConflict(Box::new(report)));
        }

        let _gate = self.booking_gate.lock().await;
        if self.evaluate_window(request).await?.is_none() {
            return self.finish(appointment, reschedule).await;
        }

        // the window was taken between pre-validation and the lock; read
        // fresh once more before giving up
        metrics::counter!(observability::BOOKING_RETRIES_TOTAL).increment(1);
        match self.evaluate_window(request).await? {
            None => self.finish(appointment, reschedule).await,
            Some(report) => {
                metrics::counter!(observability::BOOKINGS_TOTAL, "status" => "concurrency_conflict")
                    .increment(1);
                Err(EngineError::ConcurrencyConflict(Box::new(report)))
            }
        }
    }

    async fn finish(
        &self,
        appointment: Appointment,
        reschedule: bool,
    ) -> Result<Appointment, EngineError> {
        let event = if reschedule {
            ScheduleEvent::AppointmentRescheduled {
                appointment: appointment.clone(),
            }
        } else {
            ScheduleEvent::AppointmentBooked {
                appointment: appointment.clone(),
            }
        };
        self.commit(&event).await?;
        metrics::counter!(observability::BOOKINGS_TOTAL, "status" => "booked").increment(1);
        Ok(appointment)
    }

    fn appointment_from(&self, request: &BookingRequest, id: Ulid) -> Appointment {
        let size = size_for_duration(request.window.duration_minutes());
        Appointment {
            id,
            provider_id: request.provider_id,
            provider_name: request.provider_name.clone(),
            window: request.window,
            work_minutes_needed: request.work_minutes_needed,
            forklifts_needed: request.forklifts_needed,
            docks_needed: request.docks_needed,
            dock_code: request.dock_code.clone(),
            goods_type: request.goods_type.clone(),
            units: request.units,
            lines: request.lines,
            cancelled_at: None,
            actual_start: None,
            actual_end: None,
            size,
            points_used: points_for_size(size),
            created_at: self.now(),
        }
    }

    fn check_open_weekday(&self, window: &Window) -> Result<(), EngineError> {
        let dow = timezone::local_day_of_week(window.start);
        if self.config.closed_weekdays.contains(&dow) {
            return Err(EngineError::Validation(
                "warehouse is closed on the requested day",
            ));
        }
        Ok(())
    }

    /// Soft-cancel: the appointment stays on record but stops counting
    /// toward usage from this moment on.
    pub async fn cancel(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.booking_gate.lock().await;
        let appt = self
            .store()
            .appointment(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if appt.is_cancelled() {
            return Err(EngineError::Validation("appointment already cancelled"));
        }
        self.commit(&ScheduleEvent::AppointmentCancelled {
            id,
            at: self.now(),
        })
        .await
    }

    /// Floor staff recorded the truck arriving. Does not touch capacity
    /// accounting, which always follows the planned window.
    pub async fn check_in(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.booking_gate.lock().await;
        let appt = self
            .store()
            .appointment(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if appt.is_cancelled() {
            return Err(EngineError::Validation("appointment is cancelled"));
        }
        if appt.actual_start.is_some() {
            return Err(EngineError::Validation("appointment already checked in"));
        }
        self.commit(&ScheduleEvent::AppointmentCheckedIn {
            id,
            at: self.now(),
        })
        .await
    }

    pub async fn check_out(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.booking_gate.lock().await;
        let appt = self
            .store()
            .appointment(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if appt.actual_start.is_none() {
            return Err(EngineError::Validation("appointment was never checked in"));
        }
        if appt.actual_end.is_some() {
            return Err(EngineError::Validation("appointment already checked out"));
        }
        self.commit(&ScheduleEvent::AppointmentCheckedOut {
            id,
            at: self.now(),
        })
        .await
    }

    pub async fn undo_check_in(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.booking_gate.lock().await;
        let appt = self
            .store()
            .appointment(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if appt.actual_start.is_none() {
            return Err(EngineError::Validation("appointment was never checked in"));
        }
        self.commit(&ScheduleEvent::CheckInReverted { id }).await
    }

    // ── Capacity shifts ──────────────────────────────────────────

    pub async fn create_shift(
        &self,
        id: Ulid,
        window: Window,
        workers: u32,
        forklifts: u32,
        docks: Option<u32>,
    ) -> Result<CapacityShift, EngineError> {
        validate_shift_window(&window)?;
        let _gate = self.booking_gate.lock().await;
        if self.store().shift(id).await?.is_some() {
            return Err(EngineError::AlreadyExists(id));
        }
        let shift = CapacityShift {
            id,
            window,
            workers,
            forklifts,
            docks,
        };
        self.commit(&ScheduleEvent::ShiftCreated {
            shift: shift.clone(),
        })
        .await?;
        Ok(shift)
    }

    pub async fn update_shift(
        &self,
        id: Ulid,
        window: Window,
        workers: u32,
        forklifts: u32,
        docks: Option<u32>,
    ) -> Result<CapacityShift, EngineError> {
        validate_shift_window(&window)?;
        let _gate = self.booking_gate.lock().await;
        if self.store().shift(id).await?.is_none() {
            return Err(EngineError::NotFound(id));
        }
        let shift = CapacityShift {
            id,
            window,
            workers,
            forklifts,
            docks,
        };
        self.commit(&ScheduleEvent::ShiftUpdated {
            shift: shift.clone(),
        })
        .await?;
        Ok(shift)
    }

    /// Deleting a shift removes its capacity entirely; nothing is assumed
    /// outside declared shifts.
    pub async fn delete_shift(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.booking_gate.lock().await;
        if self.store().shift(id).await?.is_none() {
            return Err(EngineError::NotFound(id));
        }
        self.commit(&ScheduleEvent::ShiftDeleted { id }).await
    }

    // ── Slot templates & overrides ───────────────────────────────

    pub async fn create_template(
        &self,
        id: Ulid,
        day_of_week: u8,
        start_time: chrono::NaiveTime,
        end_time: chrono::NaiveTime,
        max_points: u32,
        active: bool,
    ) -> Result<SlotTemplate, EngineError> {
        validate_template(day_of_week, start_time, end_time)?;
        let _gate = self.booking_gate.lock().await;
        if self.store().template(id).await?.is_some() {
            return Err(EngineError::AlreadyExists(id));
        }
        let template = SlotTemplate {
            id,
            day_of_week,
            start_time,
            end_time,
            max_points,
            active,
        };
        self.commit(&ScheduleEvent::TemplateCreated {
            template: template.clone(),
        })
        .await?;
        self.invalidate_template_cache();
        Ok(template)
    }

    pub async fn update_template(
        &self,
        id: Ulid,
        day_of_week: u8,
        start_time: chrono::NaiveTime,
        end_time: chrono::NaiveTime,
        max_points: u32,
        active: bool,
    ) -> Result<SlotTemplate, EngineError> {
        validate_template(day_of_week, start_time, end_time)?;
        let _gate = self.booking_gate.lock().await;
        if self.store().template(id).await?.is_none() {
            return Err(EngineError::NotFound(id));
        }
        let template = SlotTemplate {
            id,
            day_of_week,
            start_time,
            end_time,
            max_points,
            active,
        };
        self.commit(&ScheduleEvent::TemplateUpdated {
            template: template.clone(),
        })
        .await?;
        self.invalidate_template_cache();
        Ok(template)
    }

    pub async fn delete_template(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.booking_gate.lock().await;
        if self.store().template(id).await?.is_none() {
            return Err(EngineError::NotFound(id));
        }
        self.commit(&ScheduleEvent::TemplateDeleted { id }).await?;
        self.invalidate_template_cache();
        Ok(())
    }

    pub async fn set_override(
        &self,
        id: Ulid,
        date: NaiveDate,
        start_time: Option<chrono::NaiveTime>,
        end_time: Option<chrono::NaiveTime>,
        max_points: u32,
        reason: Option<String>,
    ) -> Result<SlotOverride, EngineError> {
        if let (Some(start), Some(end)) = (start_time, end_time)
            && start >= end
        {
            return Err(EngineError::Validation("override end must be after start"));
        }
        let _gate = self.booking_gate.lock().await;
        let entry = SlotOverride {
            id,
            date,
            start_time,
            end_time,
            max_points,
            reason,
        };
        self.commit(&ScheduleEvent::OverrideSet {
            entry: entry.clone(),
        })
        .await?;
        Ok(entry)
    }

    pub async fn clear_override(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.booking_gate.lock().await;
        self.commit(&ScheduleEvent::OverrideCleared { id }).await
    }
}

fn validate_shift_window(window: &Window) -> Result<(), EngineError> {
    if window.start >= window.end {
        return Err(EngineError::Validation("shift end must be after start"));
    }
    if window.start.timestamp() < MIN_VALID_TIMESTAMP
        || window.end.timestamp() > MAX_VALID_TIMESTAMP
    {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if window.duration_minutes() > MAX_SHIFT_MINUTES {
        return Err(EngineError::LimitExceeded("shift window too wide"));
    }
    Ok(())
}

fn validate_template(
    day_of_week: u8,
    start_time: chrono::NaiveTime,
    end_time: chrono::NaiveTime,
) -> Result<(), EngineError> {
    if day_of_week > 6 {
        return Err(EngineError::Validation("day of week must be 0..=6"));
    }
    if start_time >= end_time {
        return Err(EngineError::Validation("template end must be after start"));
    }
    Ok(())
}
