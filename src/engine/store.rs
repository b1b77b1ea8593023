use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Read/write boundary to wherever the schedule actually lives. The engine
/// re-reads through this interface while holding the booking lock, so a
/// database-backed implementation must serve those reads from the same
/// transactional snapshot it will commit into.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Capacity shifts whose window overlaps `window`.
    async fn shifts_overlapping(&self, window: &Window) -> Result<Vec<CapacityShift>, StoreError>;

    /// Non-cancelled appointments whose window overlaps `window`.
    /// Cancelled rows are invisible to every capacity read.
    async fn appointments_overlapping(
        &self,
        window: &Window,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Point lookup; returns cancelled rows too so mutations can report
    /// precise errors.
    async fn appointment(&self, id: Ulid) -> Result<Option<Appointment>, StoreError>;

    async fn shift(&self, id: Ulid) -> Result<Option<CapacityShift>, StoreError>;

    async fn template(&self, id: Ulid) -> Result<Option<SlotTemplate>, StoreError>;

    async fn templates_for_day(&self, day_of_week: u8) -> Result<Vec<SlotTemplate>, StoreError>;

    async fn overrides_on(&self, date: NaiveDate) -> Result<Vec<SlotOverride>, StoreError>;

    /// Single write entry point: apply one committed event.
    async fn apply(&self, event: &ScheduleEvent) -> Result<(), StoreError>;
}

/// DashMap-backed store for tests, demos and single-process deployments.
#[derive(Default)]
pub struct InMemoryStore {
    appointments: DashMap<Ulid, Appointment>,
    shifts: DashMap<Ulid, CapacityShift>,
    templates: DashMap<Ulid, SlotTemplate>,
    overrides: DashMap<Ulid, SlotOverride>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn appointment_count(&self) -> usize {
        self.appointments.len()
    }

    pub fn shift_count(&self) -> usize {
        self.shifts.len()
    }

    fn apply_event(&self, event: &ScheduleEvent) {
        match event {
            ScheduleEvent::AppointmentBooked { appointment }
            | ScheduleEvent::AppointmentRescheduled { appointment } => {
                self.appointments
                    .insert(appointment.id, appointment.clone());
            }
            ScheduleEvent::AppointmentCancelled { id, at } => {
                if let Some(mut appt) = self.appointments.get_mut(id) {
                    appt.cancelled_at = Some(*at);
                }
            }
            ScheduleEvent::AppointmentCheckedIn { id, at } => {
                if let Some(mut appt) = self.appointments.get_mut(id) {
                    appt.actual_start = Some(*at);
                }
            }
            ScheduleEvent::AppointmentCheckedOut { id, at } => {
                if let Some(mut appt) = self.appointments.get_mut(id) {
                    appt.actual_end = Some(*at);
                }
            }
            ScheduleEvent::CheckInReverted { id } => {
                if let Some(mut appt) = self.appointments.get_mut(id) {
                    appt.actual_start = None;
                    appt.actual_end = None;
                }
            }
            ScheduleEvent::ShiftCreated { shift } | ScheduleEvent::ShiftUpdated { shift } => {
                self.shifts.insert(shift.id, shift.clone());
            }
            ScheduleEvent::ShiftDeleted { id } => {
                self.shifts.remove(id);
            }
            ScheduleEvent::TemplateCreated { template }
            | ScheduleEvent::TemplateUpdated { template } => {
                self.templates.insert(template.id, template.clone());
            }
            ScheduleEvent::TemplateDeleted { id } => {
                self.templates.remove(id);
            }
            ScheduleEvent::OverrideSet { entry } => {
                self.overrides.insert(entry.id, entry.clone());
            }
            ScheduleEvent::OverrideCleared { id } => {
                self.overrides.remove(id);
            }
        }
    }
}

#[async_trait]
impl ScheduleStore for InMemoryStore {
    async fn shifts_overlapping(&self, window: &Window) -> Result<Vec<CapacityShift>, StoreError> {
        let mut out: Vec<CapacityShift> = self
            .shifts
            .iter()
            .filter(|e| e.value().window.overlaps(window))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|s| s.window.start);
        Ok(out)
    }

    async fn appointments_overlapping(
        &self,
        window: &Window,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut out: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|e| !e.value().is_cancelled() && e.value().window.overlaps(window))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|a| a.window.start);
        Ok(out)
    }

    async fn appointment(&self, id: Ulid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.get(&id).map(|e| e.value().clone()))
    }

    async fn shift(&self, id: Ulid) -> Result<Option<CapacityShift>, StoreError> {
        Ok(self.shifts.get(&id).map(|e| e.value().clone()))
    }

    async fn template(&self, id: Ulid) -> Result<Option<SlotTemplate>, StoreError> {
        Ok(self.templates.get(&id).map(|e| e.value().clone()))
    }

    async fn templates_for_day(&self, day_of_week: u8) -> Result<Vec<SlotTemplate>, StoreError> {
        let mut out: Vec<SlotTemplate> = self
            .templates
            .iter()
            .filter(|e| e.value().day_of_week == day_of_week && e.value().active)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|t| t.start_time);
        Ok(out)
    }

    async fn overrides_on(&self, date: NaiveDate) -> Result<Vec<SlotOverride>, StoreError> {
        Ok(self
            .overrides
            .iter()
            .filter(|e| e.value().date == date)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn apply(&self, event: &ScheduleEvent) -> Result<(), StoreError> {
        self.apply_event(event);
        Ok(())
    }
}
