use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::scheduling::{
    Appointment, AppointmentFilter, AppointmentStatus, Doctor, DoctorProfile,
    NewAppointment, RatingTotals, WorkingHours,
};

use crate::store::{SchedulingStore, StoreError};

#[derive(Default)]
struct Tables {
    doctors: HashMap<String, Doctor>,
    appointments: HashMap<Uuid, Appointment>,
}

/// Process-local store. Every mutation runs under one write lock, which
/// makes check-and-write sequences atomic within this process.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_doctor(&self, doctor: Doctor) {
        self.tables.write().await.doctors.insert(doctor.email.clone(), doctor);
    }

    /// Inserts a row as-is, bypassing the overlap check.
    pub async fn seed_appointment(&self, appointment: Appointment) {
        self.tables.write().await.appointments.insert(appointment.id, appointment);
    }
}

fn sort_by_schedule(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn get_doctor(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        Ok(self.tables.read().await.doctors.get(email).cloned())
    }

    async fn upsert_doctor_profile(&self, profile: DoctorProfile) -> Result<Doctor, StoreError> {
        let mut tables = self.tables.write().await;
        let doctor = match tables.doctors.remove(&profile.email) {
            Some(existing) => Doctor {
                specialization: profile.specialization,
                qualifications: profile.qualifications,
                license_number: profile.license_number,
                consultation_fee: profile.consultation_fee,
                ..existing
            },
            None => profile.into_doctor(),
        };
        tables.doctors.insert(doctor.email.clone(), doctor.clone());
        Ok(doctor)
    }

    async fn update_working_hours(&self, email: &str, hours: &WorkingHours) -> Result<Doctor, StoreError> {
        let mut tables = self.tables.write().await;
        let doctor = tables
            .doctors
            .get_mut(email)
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", email)))?;
        doctor.working_hours = hours.clone();
        Ok(doctor.clone())
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn list_day_appointments(
        &self,
        doctor_email: &str,
        date: NaiveDate,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        let mut day: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| a.doctor_email == doctor_email && a.date == date && statuses.contains(&a.status))
            .cloned()
            .collect();
        sort_by_schedule(&mut day);
        Ok(day)
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        sort_by_schedule(&mut matching);
        Ok(matching)
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        let candidate = appointment.time_range();

        let blocked = tables.appointments.values().any(|existing| {
            existing.doctor_email == appointment.doctor_email
                && existing.date == appointment.date
                && existing.status.is_active()
                && existing.time_range().overlaps(&candidate)
        });
        if blocked {
            debug!(
                "Rejecting overlapping insert for {} on {} {}-{}",
                appointment.doctor_email, appointment.date, candidate.start, candidate.end
            );
            return Err(StoreError::Conflict);
        }

        let stored = appointment.into_appointment(Uuid::new_v4(), Utc::now());
        tables.appointments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        notes: Option<&str>,
    ) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        let appointment = tables
            .appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("appointment {}", id)))?;

        if appointment.status != expected {
            return Err(StoreError::StatusChanged {
                current: appointment.status,
            });
        }

        appointment.status = next;
        if let Some(notes) = notes {
            appointment.notes = Some(notes.to_string());
        }
        Ok(appointment.clone())
    }

    async fn apply_rating(
        &self,
        doctor_email: &str,
        appointment_id: Option<Uuid>,
        rating: u8,
    ) -> Result<RatingTotals, StoreError> {
        let mut guard = self.tables.write().await;
        let Tables { doctors, appointments } = &mut *guard;

        let doctor = doctors
            .get_mut(doctor_email)
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", doctor_email)))?;

        if let Some(id) = appointment_id {
            let appointment = appointments
                .get_mut(&id)
                .filter(|a| a.doctor_email == doctor_email)
                .ok_or_else(|| StoreError::NotFound(format!("appointment {}", id)))?;
            if appointment.has_rated {
                return Err(StoreError::AlreadyRated);
            }
            if appointment.status != AppointmentStatus::Completed {
                return Err(StoreError::NotFound(format!("rateable appointment {}", id)));
            }
            appointment.has_rated = true;
        }

        let totals = doctor.rating_totals().fold(rating);
        doctor.rating_sum = totals.sum;
        doctor.review_count = totals.count;
        doctor.rating = totals.mean();
        Ok(totals)
    }
}
