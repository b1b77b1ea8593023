mod cache;
mod capacity;
mod conflict;
mod error;
mod mutations;
mod queries;
mod slots;
mod store;
mod usage;

pub use cache::TtlCache;
pub use capacity::{CapacityResolver, ShiftCapacityResolver, SlotPointsResolver};
pub use conflict::evaluate;
pub use error::EngineError;
pub use slots::{points_for_size, size_for_duration};
pub use store::{InMemoryStore, ScheduleStore, StoreError};
pub use usage::{filter_valid_appointments, filter_valid_shifts, usage_at};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::timezone;

/// Injected time source so evaluation, cancellation stamps and cache expiry
/// stay deterministic under test.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const TEMPLATE_CACHE_TTL_SECS: i64 = 300;

/// Which capacity model the evaluator runs against. One warehouse runs one
/// model; the evaluator itself never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityModel {
    /// Concrete shift records: work-minutes, forklifts, docks.
    #[default]
    Shifts,
    /// Recurring weekly slot templates expressed in points.
    SlotPoints,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub capacity_model: CapacityModel,
    /// Work-minutes one worker contributes per elapsed minute.
    pub productivity_factor: f64,
    /// Work-minute rate granted per slot point under the slot-points model.
    pub work_minutes_per_point: f64,
    /// Local weekdays (0 = Sunday) on which no bookings are accepted.
    pub closed_weekdays: Vec<u8>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity_model: CapacityModel::Shifts,
            productivity_factor: 1.0,
            work_minutes_per_point: 1.0,
            closed_weekdays: Vec::new(),
        }
    }
}

pub struct Engine<S: ScheduleStore> {
    store: S,
    config: EngineConfig,
    clock: Clock,
    notify: Arc<NotifyHub>,
    /// Serializes every write. Warehouse-wide, so it always covers the whole
    /// window a booking is about to claim; held across re-read, re-check and
    /// commit.
    booking_gate: Mutex<()>,
    template_cache: TtlCache<u8, Vec<SlotTemplate>>,
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e.0)
    }
}

impl<S: ScheduleStore> Engine<S> {
    pub fn new(store: S, config: EngineConfig, notify: Arc<NotifyHub>) -> Self {
        Self::with_clock(store, config, notify, Arc::new(Utc::now))
    }

    pub fn with_clock(
        store: S,
        config: EngineConfig,
        notify: Arc<NotifyHub>,
        clock: Clock,
    ) -> Self {
        let template_cache =
            TtlCache::new(Duration::seconds(TEMPLATE_CACHE_TTL_SECS), clock.clone());
        Self {
            store,
            config,
            clock,
            notify,
            booking_gate: Mutex::new(()),
            template_cache,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notify(&self) -> &Arc<NotifyHub> {
        &self.notify
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply a committed event to the store, then broadcast it.
    pub(super) async fn commit(&self, event: &ScheduleEvent) -> Result<(), EngineError> {
        self.store.apply(event).await?;
        self.notify.send(event);
        Ok(())
    }

    pub(super) async fn cached_templates_for_day(
        &self,
        day_of_week: u8,
    ) -> Result<Vec<SlotTemplate>, EngineError> {
        if let Some(templates) = self.template_cache.get(&day_of_week) {
            return Ok(templates);
        }
        let templates = self.store.templates_for_day(day_of_week).await?;
        self.template_cache.insert(day_of_week, templates.clone());
        Ok(templates)
    }

    pub(super) fn invalidate_template_cache(&self) {
        self.template_cache.clear();
    }

    /// Local calendar dates touched by a UTC window.
    fn local_dates_of(window: &Window) -> Vec<chrono::NaiveDate> {
        let mut dates = Vec::new();
        let last = timezone::local_date(window.end - Duration::milliseconds(1));
        let mut date = timezone::local_date(window.start);
        while date <= last {
            dates.push(date);
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        dates
    }

    /// Build the configured capacity strategy for a window.
    pub(super) async fn resolver_for(
        &self,
        window: &Window,
    ) -> Result<Box<dyn CapacityResolver + Send + Sync>, EngineError> {
        match self.config.capacity_model {
            CapacityModel::Shifts => {
                let shifts = self.store.shifts_overlapping(window).await?;
                let shifts = filter_valid_shifts(shifts);
                Ok(Box::new(ShiftCapacityResolver::new(
                    shifts,
                    self.config.productivity_factor,
                )))
            }
            CapacityModel::SlotPoints => {
                let dates = Self::local_dates_of(window);
                let mut seen_days: Vec<u8> = Vec::new();
                let mut templates = Vec::new();
                let mut overrides = Vec::new();
                for date in dates {
                    let dow = timezone::day_of_week(date);
                    if !seen_days.contains(&dow) {
                        seen_days.push(dow);
                        templates.extend(self.cached_templates_for_day(dow).await?);
                    }
                    overrides.extend(self.store.overrides_on(date).await?);
                }
                Ok(Box::new(SlotPointsResolver::new(
                    templates,
                    overrides,
                    self.config.work_minutes_per_point,
                )))
            }
        }
    }

    /// Non-cancelled appointments overlapping the window, integrity-filtered.
    pub(super) async fn existing_for(
        &self,
        window: &Window,
    ) -> Result<Vec<Appointment>, EngineError> {
        let appointments = self.store.appointments_overlapping(window).await?;
        Ok(filter_valid_appointments(appointments))
    }
}
