// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{SchedulingStore, StoreError};
use shared_models::auth::normalize_email;
use shared_models::scheduling::{Appointment, AppointmentStatus};

use crate::models::AppointmentError;

/// Statuses reachable in one step from `current`. Terminal states map to none.
pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    match current {
        AppointmentStatus::Pending => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
        AppointmentStatus::Confirmed => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
    }
}

pub fn validate_status_transition(
    current: AppointmentStatus,
    next: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if valid_transitions(current).contains(&next) {
        debug!("Status transition validated: {} -> {}", current, next);
        Ok(())
    } else {
        warn!("Invalid status transition attempted: {} -> {}", current, next);
        Err(AppointmentError::InvalidTransition { from: current, to: next })
    }
}

pub struct AppointmentLifecycleService {
    store: Arc<dyn SchedulingStore>,
}

impl AppointmentLifecycleService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Moves an appointment to `target` on behalf of its doctor.
    ///
    /// The write is conditional on the status read here; if another request
    /// moved the appointment first this fails with `InvalidTransition` from
    /// the status that request left behind.
    #[instrument(skip(self, notes))]
    pub async fn transition(
        &self,
        actor_email: &str,
        appointment_id: Uuid,
        target: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if appointment.doctor_email != normalize_email(actor_email) {
            warn!("{} attempted to change status of appointment {}", actor_email, appointment_id);
            return Err(AppointmentError::Forbidden(
                "Only the appointment's doctor may change its status".to_string(),
            ));
        }

        validate_status_transition(appointment.status, target)?;

        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let updated = self
            .store
            .update_status(appointment_id, appointment.status, target, notes.as_deref())
            .await
            .map_err(|e| match e {
                StoreError::StatusChanged { current } => {
                    warn!("Appointment {} moved to {} concurrently", appointment_id, current);
                    AppointmentError::InvalidTransition { from: current, to: target }
                }
                other => other.into(),
            })?;

        info!(
            "Appointment {} transitioned {} -> {}",
            appointment_id, appointment.status, updated.status
        );
        Ok(updated)
    }
}
