// libs/doctor-cell/src/services/doctor.rs

use std::sync::Arc;

use tracing::{debug, info};

use shared_database::SchedulingStore;
use shared_models::auth::normalize_email;
use shared_models::scheduling::{Doctor, DoctorProfile, WorkingHours};

use crate::models::{DoctorError, UpsertDoctorRequest};

pub struct DoctorService {
    store: Arc<dyn SchedulingStore>,
}

impl DoctorService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn get_doctor(&self, email: &str) -> Result<Doctor, DoctorError> {
        let email = normalize_email(email);
        debug!("Fetching doctor profile: {}", email);

        self.store
            .get_doctor(&email)
            .await?
            .ok_or(DoctorError::NotFound(email))
    }

    /// Creates or updates the caller's own profile. Rating fields are never
    /// written here.
    pub async fn upsert_profile(
        &self,
        doctor_email: &str,
        request: UpsertDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        validate_profile(&request)?;

        let profile = DoctorProfile {
            email: normalize_email(doctor_email),
            specialization: request.specialization.trim().to_string(),
            qualifications: request.qualifications.trim().to_string(),
            license_number: request.license_number.trim().to_string(),
            consultation_fee: request.consultation_fee,
        };

        let doctor = self.store.upsert_doctor_profile(profile).await?;
        info!("Doctor profile saved: {}", doctor.email);
        Ok(doctor)
    }

    pub async fn update_working_hours(
        &self,
        doctor_email: &str,
        hours: WorkingHours,
    ) -> Result<Doctor, DoctorError> {
        validate_working_hours(&hours)?;

        let doctor = self
            .store
            .update_working_hours(&normalize_email(doctor_email), &hours)
            .await?;
        info!("Working hours updated for {}", doctor.email);
        Ok(doctor)
    }
}

fn validate_profile(request: &UpsertDoctorRequest) -> Result<(), DoctorError> {
    if request.specialization.trim().is_empty() {
        return Err(DoctorError::ValidationError("specialization is required".to_string()));
    }
    if request.license_number.trim().is_empty() {
        return Err(DoctorError::ValidationError("license_number is required".to_string()));
    }
    if !request.consultation_fee.is_finite() || request.consultation_fee < 0.0 {
        return Err(DoctorError::ValidationError(
            "consultation_fee must be a non-negative amount".to_string(),
        ));
    }
    Ok(())
}

/// Open days must have `start < end`; closed days may carry any times.
pub fn validate_working_hours(hours: &WorkingHours) -> Result<(), DoctorError> {
    match hours
        .days()
        .find(|(_, day)| day.available && day.start >= day.end)
    {
        Some((weekday, day)) => Err(DoctorError::ValidationError(format!(
            "{}: start {} must be before end {}",
            weekday, day.start, day.end
        ))),
        None => Ok(()),
    }
}
