// libs/appointment-cell/src/services/booking.rs

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::services::AvailabilityService;
use shared_database::SchedulingStore;
use shared_models::auth::normalize_email;
use shared_models::scheduling::{
    Appointment, AppointmentFilter, NewAppointment, TimeRange,
};

use crate::models::{
    AppointmentError, BookAppointmentRequest, ConflictCheckResponse, SlotAvailability,
};
use crate::services::conflict::{annotate_slots, is_past, ConflictDetectionService};

pub struct AppointmentBookingService {
    store: Arc<dyn SchedulingStore>,
    availability: AvailabilityService,
    conflict_service: ConflictDetectionService,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn SchedulingStore>, slot_minutes: i64) -> Self {
        Self {
            availability: AvailabilityService::new(store.clone(), slot_minutes),
            conflict_service: ConflictDetectionService::new(store.clone()),
            store,
        }
    }

    /// Every candidate slot for the day with its availability. A doctor who
    /// does not work that day yields an empty list, not an error.
    pub async fn list_available_slots(
        &self,
        doctor_email: &str,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Vec<SlotAvailability>, AppointmentError> {
        let doctor_email = normalize_email(doctor_email);
        let slots = self.availability.slots_on(&doctor_email, date).await?;
        if slots.is_empty() {
            debug!("{} is not working on {}", doctor_email, date);
            return Ok(Vec::new());
        }

        let active = self.conflict_service.active_appointments(&doctor_email, date).await?;
        Ok(annotate_slots(slots, &active, date, now))
    }

    /// Books a `pending` appointment for `patient_email`, which must come
    /// from the verified caller identity.
    #[instrument(skip(self, request), fields(doctor = ?request.doctor_email, date = ?request.date))]
    pub async fn book_appointment(
        &self,
        patient_email: &str,
        request: BookAppointmentRequest,
        now: NaiveDateTime,
    ) -> Result<Appointment, AppointmentError> {
        let booking = validate_booking_request(patient_email, request)?;
        let candidate = booking.time_range();

        if is_past(booking.date, booking.start_time, now) {
            return Err(AppointmentError::ValidationError(
                "Appointments must start in the future".to_string(),
            ));
        }

        let doctor = self
            .store
            .get_doctor(&booking.doctor_email)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        let within_hours = doctor
            .working_hours
            .for_weekday(booking.date.weekday())
            .and_then(|day| day.open_range())
            .is_some_and(|open| open.contains(&candidate));
        if !within_hours {
            return Err(AppointmentError::ValidationError(format!(
                "{} - {} is outside the doctor's working hours on {}",
                booking.start_time,
                booking.end_time,
                booking.date.weekday()
            )));
        }

        // Early answer for the common case; the insert below is the authority.
        let probe = self
            .conflict_service
            .check_conflicts(&booking.doctor_email, booking.date, &candidate)
            .await?;
        if probe.has_conflict {
            return Err(AppointmentError::SlotConflict);
        }

        let appointment = self.store.insert_appointment(booking).await.map_err(|e| {
            let err = AppointmentError::from(e);
            if matches!(err, AppointmentError::SlotConflict) {
                warn!("Slot taken between check and insert");
            }
            err
        })?;

        info!(
            "Appointment {} booked with {} on {} {}-{}",
            appointment.id, appointment.doctor_email, appointment.date, appointment.start_time, appointment.end_time
        );
        Ok(appointment)
    }

    /// Participants only.
    pub async fn get_appointment(&self, caller_email: &str, id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .get_appointment(id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if !appointment.is_participant(&normalize_email(caller_email)) {
            return Err(AppointmentError::Forbidden(
                "Only the appointment's patient or doctor may view it".to_string(),
            ));
        }
        Ok(appointment)
    }

    pub async fn list_appointments(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.store.list_appointments(&filter).await?;
        debug!("Found {} appointments for {:?}", appointments.len(), filter);
        Ok(appointments)
    }

    pub async fn check_conflicts(
        &self,
        doctor_email: &str,
        date: NaiveDate,
        candidate: &TimeRange,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        self.conflict_service
            .check_conflicts(&normalize_email(doctor_email), date, candidate)
            .await
    }
}

/// Checks presence of every required field and builds the row to insert.
pub fn validate_booking_request(
    patient_email: &str,
    request: BookAppointmentRequest,
) -> Result<NewAppointment, AppointmentError> {
    fn required<T>(value: Option<T>, field: &str) -> Result<T, AppointmentError> {
        value.ok_or_else(|| AppointmentError::ValidationError(format!("{} is required", field)))
    }

    let doctor_email = normalize_email(&required(request.doctor_email, "doctor_email")?);
    if doctor_email.is_empty() {
        return Err(AppointmentError::ValidationError("doctor_email is required".to_string()));
    }
    let date = required(request.date, "date")?;
    let start_time = required(request.start_time, "start_time")?;
    let end_time = required(request.end_time, "end_time")?;
    let reason = required(request.reason, "reason")?.trim().to_string();
    if reason.is_empty() {
        return Err(AppointmentError::ValidationError("reason is required".to_string()));
    }

    if TimeRange::new(start_time, end_time).is_none() {
        return Err(AppointmentError::ValidationError(
            "start_time must be before end_time".to_string(),
        ));
    }

    let patient_email = normalize_email(patient_email);
    if patient_email == doctor_email {
        return Err(AppointmentError::ValidationError(
            "Doctors cannot book appointments with themselves".to_string(),
        ));
    }

    Ok(NewAppointment {
        patient_email,
        doctor_email,
        date,
        start_time,
        end_time,
        reason,
        notes: request
            .notes
            .map(|notes| notes.trim().to_string())
            .filter(|notes| !notes.is_empty()),
    })
}
