use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{Local, NaiveDateTime};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::SchedulingState;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::scheduling::{AppointmentFilter, TimeRange};
use shared_utils::extractor::caller_email;

use crate::models::{
    AvailabilityQuery, BookAppointmentRequest, ConflictCheckQuery, ListAppointmentsQuery,
    ParticipantView, TransitionRequest,
};
use crate::services::{AppointmentBookingService, AppointmentLifecycleService};

/// Stored times are local wall-clock times, so "now" is too.
fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn booking_service(state: &SchedulingState) -> AppointmentBookingService {
    AppointmentBookingService::new(state.store.clone(), state.config.slot_minutes)
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_available_slots(
    State(state): State<SchedulingState>,
    params: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(query) = params.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let slots = booking_service(&state)
        .list_available_slots(&query.doctor_email, query.date, local_now())
        .await?;

    Ok(Json(json!({
        "doctor_email": query.doctor_email,
        "date": query.date,
        "slots": slots,
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn check_conflicts(
    State(state): State<SchedulingState>,
    Extension(_user): Extension<User>,
    params: Result<Query<ConflictCheckQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(query) = params.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let candidate = TimeRange::new(query.start_time, query.end_time).ok_or_else(|| {
        AppError::ValidationError("start_time must be before end_time".to_string())
    })?;

    let response = booking_service(&state)
        .check_conflicts(&query.doctor_email, query.date, &candidate)
        .await?;
    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let patient_email = caller_email(&user)?;

    let appointment = booking_service(&state)
        .book_appointment(&patient_email, request, local_now())
        .await?;
    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    params: Result<Query<ListAppointmentsQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(query) = params.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let email = caller_email(&user)?;
    let view = query.view.unwrap_or(if user.has_role("doctor") {
        ParticipantView::Doctor
    } else {
        ParticipantView::Patient
    });

    let filter = match view {
        ParticipantView::Patient => AppointmentFilter::Patient { email, status: query.status },
        ParticipantView::Doctor => AppointmentFilter::Doctor { email, status: query.status },
    };

    let appointments = booking_service(&state).list_appointments(filter).await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let email = caller_email(&user)?;
    let appointment = booking_service(&state)
        .get_appointment(&email, appointment_id)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn transition_appointment(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let email = caller_email(&user)?;

    let appointment = AppointmentLifecycleService::new(state.store.clone())
        .transition(&email, appointment_id, request.status, request.notes)
        .await?;
    Ok(Json(json!(appointment)))
}
