// libs/doctor-cell/src/services/availability.rs

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use tracing::debug;

use shared_database::SchedulingStore;
use shared_models::auth::normalize_email;
use shared_models::scheduling::WorkingHours;

use crate::models::{DoctorError, TimeSlot};

/// Tiles the weekday's working interval into consecutive slots of
/// `slot_minutes`. A trailing partial slot is dropped, so no slot ever ends
/// after the working day does. Closed or missing days yield no slots.
pub fn slots_for(hours: &WorkingHours, weekday: Weekday, slot_minutes: i64) -> Vec<TimeSlot> {
    let Some(range) = hours.for_weekday(weekday).and_then(|day| day.open_range()) else {
        return Vec::new();
    };
    if slot_minutes <= 0 {
        return Vec::new();
    }

    // Whole seconds from midnight; NaiveTime arithmetic would wrap at 24:00.
    let step = slot_minutes * 60;
    let end = i64::from(range.end.num_seconds_from_midnight());
    let mut cursor = i64::from(range.start.num_seconds_from_midnight());

    let mut slots = Vec::new();
    while cursor + step <= end {
        if let (Some(start), Some(finish)) = (time_at(cursor), time_at(cursor + step)) {
            slots.push(TimeSlot::new(start, finish));
        }
        cursor += step;
    }
    slots
}

fn time_at(seconds: i64) -> Option<NaiveTime> {
    u32::try_from(seconds)
        .ok()
        .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
}

pub struct AvailabilityService {
    store: Arc<dyn SchedulingStore>,
    slot_minutes: i64,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn SchedulingStore>, slot_minutes: i64) -> Self {
        Self { store, slot_minutes }
    }

    /// Candidate slots for a doctor on a calendar date, ignoring bookings.
    pub async fn slots_on(&self, doctor_email: &str, date: NaiveDate) -> Result<Vec<TimeSlot>, DoctorError> {
        let doctor_email = normalize_email(doctor_email);
        let doctor = self
            .store
            .get_doctor(&doctor_email)
            .await?
            .ok_or_else(|| DoctorError::NotFound(doctor_email.clone()))?;

        let slots = slots_for(&doctor.working_hours, date.weekday(), self.slot_minutes);
        debug!("{} candidate slots for {} on {}", slots.len(), doctor_email, date);
        Ok(slots)
    }
}
