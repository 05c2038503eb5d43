use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_database::SchedulingState;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::scheduling::WorkingHours;
use shared_utils::extractor::caller_email;

use crate::models::{RateDoctorRequest, UpsertDoctorRequest};
use crate::services::{DoctorService, RatingAggregator};

fn require_doctor(user: &User) -> Result<String, AppError> {
    if !user.has_role("doctor") {
        return Err(AppError::Forbidden("Only doctors can manage a doctor profile".to_string()));
    }
    caller_email(user)
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<SchedulingState>,
    Path(email): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(state.store.clone()).get_doctor(&email).await?;
    Ok(Json(json!(doctor)))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn upsert_my_profile(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    payload: Result<Json<UpsertDoctorRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let email = require_doctor(&user)?;

    let doctor = DoctorService::new(state.store.clone())
        .upsert_profile(&email, request)
        .await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_my_working_hours(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    payload: Result<Json<WorkingHours>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(hours) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let email = require_doctor(&user)?;

    let doctor = DoctorService::new(state.store.clone())
        .update_working_hours(&email, hours)
        .await?;
    Ok(Json(json!({
        "email": doctor.email,
        "working_hours": doctor.working_hours,
    })))
}

#[axum::debug_handler]
pub async fn rate_doctor(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    Path(doctor_email): Path<String>,
    payload: Result<Json<RateDoctorRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let email = caller_email(&user)?;

    let result = RatingAggregator::new(state.store.clone())
        .rate(&email, &doctor_email, request.appointment_id, request.rating)
        .await?;
    Ok(Json(json!(result)))
}
