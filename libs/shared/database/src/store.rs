//! Persistence seam for the scheduling core.
//!
//! Every method that mutates shared state is atomic at the store level;
//! services never layer check-then-write sequences on top of it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use shared_config::{AppConfig, StoreBackend};
use shared_models::scheduling::{
    Appointment, AppointmentFilter, AppointmentStatus, Doctor, DoctorProfile,
    NewAppointment, RatingTotals, WorkingHours,
};

use crate::memory::InMemoryStore;
use crate::postgrest::SupabaseStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("an active appointment already occupies this interval")]
    Conflict,

    #[error("appointment status changed concurrently (now {current})")]
    StatusChanged { current: AppointmentStatus },

    #[error("appointment has already been rated")]
    AlreadyRated,

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Backend(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("malformed row: {}", err))
    }
}

#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn get_doctor(&self, email: &str) -> Result<Option<Doctor>, StoreError>;

    /// Creates or updates profile columns; rating fields are left untouched.
    async fn upsert_doctor_profile(&self, profile: DoctorProfile) -> Result<Doctor, StoreError>;

    async fn update_working_hours(&self, email: &str, hours: &WorkingHours) -> Result<Doctor, StoreError>;

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Appointments of one doctor on one date with the given statuses, ordered by start time.
    async fn list_day_appointments(
        &self,
        doctor_email: &str,
        date: NaiveDate,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;

    /// Inserts a `pending` appointment unless an active one overlaps it.
    ///
    /// Fails with [`StoreError::Conflict`] without writing anything.
    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    /// Compare-and-set on `status`.
    ///
    /// Fails with [`StoreError::StatusChanged`] when the stored status is no
    /// longer `expected`. `notes`, when given, replaces the stored notes.
    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        notes: Option<&str>,
    ) -> Result<Appointment, StoreError>;

    /// Folds one rating into the doctor's totals and, when an appointment is
    /// given, flips its `has_rated` flag in the same atomic step.
    async fn apply_rating(
        &self,
        doctor_email: &str,
        appointment_id: Option<Uuid>,
        rating: u8,
    ) -> Result<RatingTotals, StoreError>;
}

/// Router state shared by every cell.
#[derive(Clone)]
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SchedulingStore>,
}

impl SchedulingState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn SchedulingStore>) -> Self {
        Self { config, store }
    }

    /// Builds the store selected by `STORE_BACKEND`.
    pub fn from_config(config: AppConfig) -> Self {
        let store: Arc<dyn SchedulingStore> = match config.store_backend {
            StoreBackend::Supabase => Arc::new(SupabaseStore::new(&config)),
            StoreBackend::Memory => Arc::new(InMemoryStore::new()),
        };
        Self::new(Arc::new(config), store)
    }
}
