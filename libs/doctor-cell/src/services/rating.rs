// libs/doctor-cell/src/services/rating.rs

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use shared_database::SchedulingStore;
use shared_models::auth::normalize_email;
use shared_models::scheduling::AppointmentStatus;

use crate::models::{DoctorError, RatingResult};

/// Sole writer of a doctor's rating fields.
pub struct RatingAggregator {
    store: Arc<dyn SchedulingStore>,
}

impl RatingAggregator {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Folds one rating into the doctor's running mean.
    ///
    /// With an `appointment_id` the rating is accepted once per completed
    /// appointment and only from its patient. The store re-checks `has_rated`
    /// in the same atomic step as the fold, so a concurrent duplicate still
    /// fails with [`DoctorError::AlreadyRated`].
    #[instrument(skip(self))]
    pub async fn rate(
        &self,
        caller_email: &str,
        doctor_email: &str,
        appointment_id: Option<Uuid>,
        rating: i64,
    ) -> Result<RatingResult, DoctorError> {
        let rating = validate_rating(rating)?;
        let doctor_email = normalize_email(doctor_email);
        let caller_email = normalize_email(caller_email);

        if self.store.get_doctor(&doctor_email).await?.is_none() {
            return Err(DoctorError::NotFound(doctor_email));
        }

        if caller_email == doctor_email {
            return Err(DoctorError::Forbidden("Doctors cannot rate themselves".to_string()));
        }

        if let Some(id) = appointment_id {
            let appointment = self
                .store
                .get_appointment(id)
                .await?
                .filter(|a| a.doctor_email == doctor_email)
                .ok_or_else(|| DoctorError::AppointmentNotFound(id.to_string()))?;

            if appointment.patient_email != caller_email {
                return Err(DoctorError::Forbidden(
                    "Only the appointment's patient may rate it".to_string(),
                ));
            }
            if appointment.status != AppointmentStatus::Completed {
                return Err(DoctorError::ValidationError(format!(
                    "Only completed appointments can be rated (status is {})",
                    appointment.status
                )));
            }
            if appointment.has_rated {
                warn!("Appointment {} was already rated", id);
                return Err(DoctorError::AlreadyRated);
            }
        }

        let totals = self.store.apply_rating(&doctor_email, appointment_id, rating).await?;

        let result = RatingResult {
            new_rating: totals.mean().unwrap_or_default(),
            review_count: totals.count,
        };
        info!(
            "Doctor {} rated {}: mean {} over {} reviews",
            doctor_email, rating, result.new_rating, result.review_count
        );
        Ok(result)
    }
}

fn validate_rating(rating: i64) -> Result<u8, DoctorError> {
    u8::try_from(rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or(DoctorError::InvalidRating(rating))
}
