use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

/// A generated, never persisted, bookable interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub label: String,
}

impl TimeSlot {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            start_time,
            end_time,
            label: format!("{} - {}", start_time.format("%H:%M"), end_time.format("%H:%M")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertDoctorRequest {
    pub specialization: String,
    pub qualifications: String,
    pub license_number: String,
    pub consultation_fee: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateDoctorRequest {
    pub appointment_id: Option<Uuid>,
    pub rating: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingResult {
    pub new_rating: f64,
    pub review_count: i64,
}

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found: {0}")]
    NotFound(String),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(String),

    #[error("Rating must be an integer between 1 and 5, got {0}")]
    InvalidRating(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("This appointment has already been rated")]
    AlreadyRated,

    #[error("Storage error: {0}")]
    Store(String),
}

impl From<StoreError> for DoctorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => DoctorError::NotFound(what),
            StoreError::AlreadyRated => DoctorError::AlreadyRated,
            other => DoctorError::Store(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(_) | DoctorError::AppointmentNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            DoctorError::InvalidRating(_) | DoctorError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
            DoctorError::Forbidden(msg) => AppError::Forbidden(msg),
            DoctorError::AlreadyRated => AppError::AlreadyRated(err.to_string()),
            DoctorError::Store(msg) => AppError::Internal(msg),
        }
    }
}
