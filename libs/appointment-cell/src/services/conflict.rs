use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use doctor_cell::models::TimeSlot;
use shared_database::SchedulingStore;
use shared_models::scheduling::{Appointment, AppointmentStatus, TimeRange};

use crate::models::{AppointmentError, ConflictCheckResponse, SlotAvailability, UnavailableReason};

/// Half-open overlap. Intervals sharing only a boundary do not overlap.
pub fn overlaps(candidate: &TimeRange, existing: &TimeRange) -> bool {
    candidate.overlaps(existing)
}

/// `existing` must already be restricted to one doctor, one date and the
/// active statuses.
pub fn any_overlap<'a>(candidate: &TimeRange, existing: impl IntoIterator<Item = &'a TimeRange>) -> bool {
    existing.into_iter().any(|range| overlaps(candidate, range))
}

/// A slot starting at or before `now` can no longer be booked.
pub fn is_past(date: NaiveDate, start: NaiveTime, now: NaiveDateTime) -> bool {
    date.and_time(start) <= now
}

/// Marks each candidate slot with whether it can still be booked. Past-time
/// wins over booked when both apply.
pub fn annotate_slots(
    slots: Vec<TimeSlot>,
    active: &[Appointment],
    date: NaiveDate,
    now: NaiveDateTime,
) -> Vec<SlotAvailability> {
    let booked: Vec<TimeRange> = active.iter().map(Appointment::time_range).collect();

    slots
        .into_iter()
        .map(|slot| {
            let reason = if is_past(date, slot.start_time, now) {
                Some(UnavailableReason::PastTime)
            } else {
                TimeRange::new(slot.start_time, slot.end_time)
                    .filter(|range| any_overlap(range, &booked))
                    .map(|_| UnavailableReason::Booked)
            };

            SlotAvailability {
                slot,
                available: reason.is_none(),
                reason,
            }
        })
        .collect()
}

pub struct ConflictDetectionService {
    store: Arc<dyn SchedulingStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Pending and confirmed appointments of one doctor on one date.
    pub async fn active_appointments(
        &self,
        doctor_email: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let active = self
            .store
            .list_day_appointments(doctor_email, date, &AppointmentStatus::ACTIVE)
            .await?;
        debug!("{} active appointments for {} on {}", active.len(), doctor_email, date);
        Ok(active)
    }

    /// Read-only check against current state. Booking does not rely on it;
    /// the store re-checks atomically at insert time.
    pub async fn check_conflicts(
        &self,
        doctor_email: &str,
        date: NaiveDate,
        candidate: &TimeRange,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        let conflicting_intervals: Vec<TimeRange> = self
            .active_appointments(doctor_email, date)
            .await?
            .iter()
            .map(Appointment::time_range)
            .filter(|existing| overlaps(candidate, existing))
            .collect();

        if !conflicting_intervals.is_empty() {
            warn!(
                "Conflict detected for doctor {} on {} - {} conflicting appointments",
                doctor_email,
                date,
                conflicting_intervals.len()
            );
        }

        Ok(ConflictCheckResponse {
            has_conflict: !conflicting_intervals.is_empty(),
            conflicting_intervals,
        })
    }
}
