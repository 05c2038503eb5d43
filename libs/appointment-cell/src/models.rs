use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use doctor_cell::models::{DoctorError, TimeSlot};
use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::scheduling::{AppointmentStatus, TimeRange};

// ==============================================================================
// REQUESTS
// ==============================================================================

/// Every field is optional on the wire so that missing values surface as a
/// validation error naming the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_email: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_email: String,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_email: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Which side of the appointments the caller wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantView {
    Patient,
    Doctor,
}

#[derive(Debug, Deserialize)]
pub struct ListAppointmentsQuery {
    pub status: Option<AppointmentStatus>,
    pub view: Option<ParticipantView>,
}

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    Booked,
    PastTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub slot: TimeSlot,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
}

/// Read-only probe result; conflicting intervals only, never other patients' details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_intervals: Vec<TimeRange>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("This slot was just taken; please pick another time")]
    SlotConflict,

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AppointmentError::SlotConflict,
            StoreError::NotFound(_) => AppointmentError::NotFound,
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(_) => AppointmentError::DoctorNotFound,
            DoctorError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::DoctorNotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::SlotConflict => AppError::SlotConflict(err.to_string()),
            AppointmentError::InvalidTransition { .. } => AppError::InvalidTransition(err.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Internal(msg),
        }
    }
}
