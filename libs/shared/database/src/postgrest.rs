// libs/shared/database/src/postgrest.rs
//
// Scheduling store backed by Supabase's PostgREST API. Atomicity comes from
// the database: an exclusion constraint guards overlapping inserts, status
// changes are conditional PATCHes, and ratings go through `rate_doctor`.
// See migrations/0001_scheduling.sql.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{header::HeaderValue, Method};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use urlencoding::encode;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::scheduling::{
    Appointment, AppointmentFilter, AppointmentStatus, Doctor, DoctorProfile,
    NewAppointment, RatingTotals, WorkingHours,
};

use crate::store::{SchedulingStore, StoreError};
use crate::supabase::{return_representation, PostgrestError, SupabaseClient};

/// SQLSTATE raised by the `appointments_no_overlap` exclusion constraint.
const EXCLUSION_VIOLATION: &str = "23P01";
/// Raised by `rate_doctor` for an unknown doctor or appointment.
const RATING_NOT_FOUND: &str = "PT404";
/// Raised by `rate_doctor` when the appointment was already rated.
const RATING_ALREADY_APPLIED: &str = "PT409";

pub struct SupabaseStore {
    supabase: SupabaseClient,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    fn token(&self) -> Option<&str> {
        Some(self.service_key.as_str())
    }

    async fn fetch_appointments(&self, path: &str) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, self.token(), None).await?;
        let appointments = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()?;
        Ok(appointments)
    }
}

fn first_doctor(rows: Vec<Value>) -> Result<Option<Doctor>, StoreError> {
    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}

fn status_list(statuses: &[AppointmentStatus]) -> String {
    statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",")
}

fn postgrest_error(err: &anyhow::Error) -> Option<&PostgrestError> {
    err.downcast_ref::<PostgrestError>()
}

#[async_trait]
impl SchedulingStore for SupabaseStore {
    async fn get_doctor(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        let path = format!("/rest/v1/doctors?email=eq.{}&limit=1", encode(email));
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, self.token(), None).await?;
        first_doctor(rows)
    }

    async fn upsert_doctor_profile(&self, profile: DoctorProfile) -> Result<Doctor, StoreError> {
        let mut headers = return_representation();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctors?on_conflict=email",
                self.token(),
                Some(serde_json::to_value(&profile)?),
                Some(headers),
            )
            .await?;

        first_doctor(rows)?
            .ok_or_else(|| StoreError::Backend("upsert returned no doctor row".to_string()))
    }

    async fn update_working_hours(&self, email: &str, hours: &WorkingHours) -> Result<Doctor, StoreError> {
        let path = format!("/rest/v1/doctors?email=eq.{}", encode(email));
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(json!({ "working_hours": hours })),
                Some(return_representation()),
            )
            .await?;

        first_doctor(rows)?
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", email)))
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", id);
        Ok(self.fetch_appointments(&path).await?.into_iter().next())
    }

    async fn list_day_appointments(
        &self,
        doctor_email: &str,
        date: NaiveDate,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?doctor_email=eq.{}&date=eq.{}&status=in.({})&order=start_time.asc",
            encode(doctor_email),
            date,
            status_list(statuses)
        );
        self.fetch_appointments(&path).await
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let (column, email, status) = match filter {
            AppointmentFilter::Patient { email, status } => ("patient_email", email, status),
            AppointmentFilter::Doctor { email, status } => ("doctor_email", email, status),
        };

        let mut path = format!("/rest/v1/appointments?{}=eq.{}", column, encode(email));
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        path.push_str("&order=date.asc,start_time.asc");

        self.fetch_appointments(&path).await
    }

    #[instrument(skip(self, appointment), fields(doctor = %appointment.doctor_email, date = %appointment.date))]
    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let row = json!({
            "patient_email": appointment.patient_email,
            "doctor_email": appointment.doctor_email,
            "date": appointment.date,
            "start_time": appointment.start_time,
            "end_time": appointment.end_time,
            "reason": appointment.reason,
            "notes": appointment.notes,
            "status": AppointmentStatus::Pending,
            "has_rated": false,
        });

        let result: anyhow::Result<Vec<Value>> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                self.token(),
                Some(row),
                Some(return_representation()),
            )
            .await;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) if postgrest_error(&e).is_some_and(|pg| pg.has_code(EXCLUSION_VIOLATION)) => {
                warn!("Exclusion constraint rejected overlapping appointment");
                return Err(StoreError::Conflict);
            }
            Err(e) => return Err(e.into()),
        };

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("insert returned no appointment row".to_string()))?;
        Ok(serde_json::from_value(row)?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        notes: Option<&str>,
    ) -> Result<Appointment, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, expected);

        let mut update = serde_json::Map::new();
        update.insert("status".to_string(), json!(next));
        if let Some(notes) = notes {
            update.insert("notes".to_string(), json!(notes));
        }

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(Value::Object(update)),
                Some(return_representation()),
            )
            .await?;

        if let Some(row) = rows.into_iter().next() {
            return Ok(serde_json::from_value(row)?);
        }

        // Nothing matched: either the row is gone or someone moved it first.
        debug!("Conditional status update matched no rows for {}", id);
        match self.get_appointment(id).await? {
            Some(current) => Err(StoreError::StatusChanged { current: current.status }),
            None => Err(StoreError::NotFound(format!("appointment {}", id))),
        }
    }

    #[instrument(skip(self))]
    async fn apply_rating(
        &self,
        doctor_email: &str,
        appointment_id: Option<Uuid>,
        rating: u8,
    ) -> Result<RatingTotals, StoreError> {
        let args = json!({
            "p_doctor_email": doctor_email,
            "p_appointment_id": appointment_id,
            "p_rating": rating,
        });

        match self.supabase.rpc::<RatingTotals>("rate_doctor", self.token(), args).await {
            Ok(totals) => Ok(totals),
            Err(e) => {
                if let Some(pg) = postgrest_error(&e) {
                    if pg.has_code(RATING_ALREADY_APPLIED) {
                        return Err(StoreError::AlreadyRated);
                    }
                    if pg.has_code(RATING_NOT_FOUND) {
                        return Err(StoreError::NotFound(pg.message.clone()));
                    }
                }
                Err(e.into())
            }
        }
    }
}
