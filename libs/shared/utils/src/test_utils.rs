use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, NaiveDate, NaiveTime, Utc, Weekday};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, StoreBackend};
use shared_models::auth::User;
use shared_models::scheduling::{
    Appointment, AppointmentStatus, DayHours, Doctor, DoctorProfile, WorkingHours,
};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub store_backend: StoreBackend,
    pub slot_minutes: i64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            store_backend: StoreBackend::Memory,
            slot_minutes: 30,
        }
    }
}

impl TestConfig {
    /// Points the Supabase backend at a mock server.
    pub fn with_supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            store_backend: StoreBackend::Supabase,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            store_backend: self.store_backend,
            slot_minutes: self.slot_minutes,
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("patient@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn bearer(user: &TestUser, config: &TestConfig) -> String {
        format!("Bearer {}", Self::create_test_token(user, &config.jwt_secret, None))
    }
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid test time")
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// 2030-06-03, a Monday far enough ahead that slots are never in the past.
pub fn future_monday() -> NaiveDate {
    date(2030, 6, 3)
}

/// Doctor with Monday-Friday 09:00-17:00 hours and no reviews.
pub fn weekday_doctor(email: &str) -> Doctor {
    let open = DayHours {
        start: time(9, 0),
        end: time(17, 0),
        available: true,
    };
    let working_hours = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
    .into_iter()
    .fold(WorkingHours::default(), |hours, day| hours.with_day(day, open));

    Doctor {
        working_hours,
        ..DoctorProfile {
            email: email.to_string(),
            specialization: "General Practice".to_string(),
            qualifications: "MBBS".to_string(),
            license_number: "MD123456".to_string(),
            consultation_fee: 150.0,
        }
        .into_doctor()
    }
}

pub fn appointment(
    patient_email: &str,
    doctor_email: &str,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    status: AppointmentStatus,
) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_email: patient_email.to_string(),
        doctor_email: doctor_email.to_string(),
        date,
        start_time: start,
        end_time: end,
        reason: "Routine checkup".to_string(),
        notes: None,
        status,
        has_rated: false,
        created_at: Utc::now(),
    }
}

/// PostgREST row shapes for wiremock-backed tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_row(email: &str) -> Value {
        json!({
            "email": email,
            "specialization": "General Practice",
            "qualifications": "MBBS",
            "license_number": "MD123456",
            "consultation_fee": 150.0,
            "rating": 4.25,
            "review_count": 4,
            "rating_sum": 17,
            "working_hours": {
                "monday": { "start": "09:00:00", "end": "17:00:00", "available": true }
            }
        })
    }

    pub fn appointment_row(id: Uuid, patient_email: &str, doctor_email: &str, status: &str) -> Value {
        json!({
            "id": id,
            "patient_email": patient_email,
            "doctor_email": doctor_email,
            "date": "2030-06-03",
            "start_time": "09:00:00",
            "end_time": "09:30:00",
            "reason": "Routine checkup",
            "notes": null,
            "status": status,
            "has_rated": false,
            "created_at": "2030-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "code": code,
            "message": message,
            "details": null,
            "hint": null
        })
    }
}
