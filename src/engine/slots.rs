//! The slot-points booking view: a coarser picker layered over the same
//! appointment book, counting abstract points per recurring slot instead of
//! minute-level resources.

use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use crate::model::*;
use crate::timezone;

use super::store::ScheduleStore;
use super::{Engine, EngineError};

const MAX_SEARCH_DAYS: u32 = 366;

/// Size class from planned duration: up to half an hour S, up to ninety
/// minutes M, anything longer L.
pub fn size_for_duration(minutes: i64) -> AppointmentSize {
    if minutes <= 30 {
        AppointmentSize::S
    } else if minutes <= 90 {
        AppointmentSize::M
    } else {
        AppointmentSize::L
    }
}

pub fn points_for_size(size: AppointmentSize) -> u32 {
    match size {
        AppointmentSize::S => 1,
        AppointmentSize::M => 2,
        AppointmentSize::L => 3,
    }
}

impl<S: ScheduleStore> Engine<S> {
    /// Bookable slots on a date: the weekday's templates with that date's
    /// overrides laid on top. A slot-specific override wins over a
    /// whole-day override.
    pub async fn slots_for_date(&self, date: NaiveDate) -> Result<Vec<SlotInfo>, EngineError> {
        let dow = timezone::day_of_week(date);
        let templates = self.cached_templates_for_day(dow).await?;
        let overrides = self.store().overrides_on(date).await?;
        let full_day = overrides.iter().find(|o| o.start_time.is_none());

        let mut slots = Vec::new();
        for tpl in &templates {
            let specific = overrides
                .iter()
                .find(|o| o.start_time == Some(tpl.start_time));
            let slot = if let Some(ov) = specific {
                SlotInfo {
                    start_time: ov.start_time.unwrap_or(tpl.start_time),
                    end_time: ov.end_time.unwrap_or(tpl.end_time),
                    max_points: ov.max_points,
                    is_override: true,
                    reason: ov.reason.clone(),
                }
            } else if let Some(ov) = full_day {
                SlotInfo {
                    start_time: tpl.start_time,
                    end_time: tpl.end_time,
                    max_points: ov.max_points,
                    is_override: true,
                    reason: ov.reason.clone(),
                }
            } else {
                SlotInfo {
                    start_time: tpl.start_time,
                    end_time: tpl.end_time,
                    max_points: tpl.max_points,
                    is_override: false,
                    reason: None,
                }
            };
            slots.push(slot);
        }
        Ok(slots)
    }

    /// Points consumed in one slot: non-cancelled appointments starting (in
    /// local time) inside the slot on that date.
    pub async fn slot_usage(
        &self,
        date: NaiveDate,
        slot: &SlotInfo,
        exclude: Option<Ulid>,
    ) -> Result<u32, EngineError> {
        let day = timezone::local_day_window(date);
        let appointments = self.store().appointments_overlapping(&day).await?;
        Ok(appointments
            .iter()
            .filter(|a| exclude != Some(a.id))
            .filter(|a| timezone::local_date(a.window.start) == date)
            .filter(|a| {
                let t = timezone::local_time(a.window.start);
                t >= slot.start_time && t < slot.end_time
            })
            .map(|a| a.points_used)
            .sum())
    }

    /// Check that a slot has room for `points_needed` more points.
    pub async fn validate_slot_capacity(
        &self,
        date: NaiveDate,
        slot_start: NaiveTime,
        points_needed: u32,
        exclude: Option<Ulid>,
    ) -> Result<SlotUsage, EngineError> {
        let slots = self.slots_for_date(date).await?;
        let slot = slots
            .into_iter()
            .find(|s| s.start_time == slot_start)
            .ok_or(EngineError::Validation("no slot at the requested time"))?;

        let points_used = self.slot_usage(date, &slot, exclude).await?;
        let points_available = slot.max_points as i64 - points_used as i64;
        if points_available < points_needed as i64 {
            return Err(EngineError::SlotConflict {
                date,
                start_time: slot.start_time,
                max_points: slot.max_points,
                points_used,
                points_needed,
            });
        }
        Ok(SlotUsage {
            start_time: slot.start_time,
            end_time: slot.end_time,
            max_points: slot.max_points,
            points_used,
            points_available,
            is_override: slot.is_override,
        })
    }

    /// Days in the range that still have room for `points_needed`, for the
    /// slot picker.
    pub async fn find_available_slots(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        points_needed: u32,
    ) -> Result<Vec<DaySlots>, EngineError> {
        if from > to {
            return Err(EngineError::Validation("range end must be after start"));
        }

        let mut results = Vec::new();
        let mut date = from;
        let mut days = 0u32;
        while date <= to {
            days += 1;
            if days > MAX_SEARCH_DAYS {
                return Err(EngineError::LimitExceeded("slot search range too wide"));
            }

            let slots = self.slots_for_date(date).await?;
            let mut open = Vec::new();
            for slot in slots {
                let points_used = self.slot_usage(date, &slot, None).await?;
                let points_available = slot.max_points as i64 - points_used as i64;
                if points_available >= points_needed as i64 {
                    open.push(SlotUsage {
                        start_time: slot.start_time,
                        end_time: slot.end_time,
                        max_points: slot.max_points,
                        points_used,
                        points_available,
                        is_override: slot.is_override,
                    });
                }
            }
            if !open.is_empty() {
                results.push(DaySlots { date, slots: open });
            }

            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(results)
    }
}
