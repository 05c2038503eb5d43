// libs/shared/models/src/scheduling.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ==============================================================================
// APPOINTMENT STATUS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that still hold their slot and block new bookings.
    pub const ACTIVE: [AppointmentStatus; 2] = [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("unknown appointment status: {}", other)),
        }
    }
}

// ==============================================================================
// TIME RANGES
// ==============================================================================

/// Half-open wall-clock interval `[start, end)` on a single calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    /// Returns `None` unless `start < end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// `[s1,e1)` and `[s2,e2)` overlap iff `s1 < e2 && s2 < e1`.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_email: String,
    pub doctor_email: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub has_rated: bool,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn is_participant(&self, email: &str) -> bool {
        self.patient_email == email || self.doctor_email == email
    }
}

/// A validated booking ready to be written; always lands as `pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_email: String,
    pub doctor_email: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: String,
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn into_appointment(self, id: Uuid, created_at: DateTime<Utc>) -> Appointment {
        Appointment {
            id,
            patient_email: self.patient_email,
            doctor_email: self.doctor_email,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            reason: self.reason,
            notes: self.notes,
            status: AppointmentStatus::Pending,
            has_rated: false,
            created_at,
        }
    }
}

/// Selects appointments by one participant.
#[derive(Debug, Clone, PartialEq)]
pub enum AppointmentFilter {
    Patient {
        email: String,
        status: Option<AppointmentStatus>,
    },
    Doctor {
        email: String,
        status: Option<AppointmentStatus>,
    },
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        let (email_matches, status) = match self {
            AppointmentFilter::Patient { email, status } => (&appointment.patient_email == email, status),
            AppointmentFilter::Doctor { email, status } => (&appointment.doctor_email == email, status),
        };
        email_matches && status.map_or(true, |s| s == appointment.status)
    }
}

// ==============================================================================
// WORKING HOURS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub available: bool,
}

impl DayHours {
    /// The bookable range, if the day is open and well-formed.
    pub fn open_range(&self) -> Option<TimeRange> {
        if self.available {
            TimeRange::new(self.start, self.end)
        } else {
            None
        }
    }
}

/// Weekly schedule; a missing day means the doctor does not work that day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuesday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wednesday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thursday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunday: Option<DayHours>,
}

impl WorkingHours {
    pub fn for_weekday(&self, day: Weekday) -> Option<&DayHours> {
        match day {
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
        }
    }

    pub fn set(&mut self, day: Weekday, hours: Option<DayHours>) {
        let slot = match day {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        };
        *slot = hours;
    }

    pub fn with_day(mut self, day: Weekday, hours: DayHours) -> Self {
        self.set(day, Some(hours));
        self
    }

    pub fn days(&self) -> impl Iterator<Item = (Weekday, &DayHours)> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .filter_map(move |day| self.for_weekday(day).map(|hours| (day, hours)))
    }
}

// ==============================================================================
// DOCTORS AND RATINGS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub email: String,
    pub specialization: String,
    pub qualifications: String,
    pub license_number: String,
    pub consultation_fee: f64,
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub rating_sum: i64,
    #[serde(default)]
    pub working_hours: WorkingHours,
}

impl Doctor {
    pub fn rating_totals(&self) -> RatingTotals {
        RatingTotals {
            sum: self.rating_sum,
            count: self.review_count,
        }
    }
}

/// Profile fields a doctor edits; never carries rating data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub email: String,
    pub specialization: String,
    pub qualifications: String,
    pub license_number: String,
    pub consultation_fee: f64,
}

impl DoctorProfile {
    pub fn into_doctor(self) -> Doctor {
        Doctor {
            email: self.email,
            specialization: self.specialization,
            qualifications: self.qualifications,
            license_number: self.license_number,
            consultation_fee: self.consultation_fee,
            rating: None,
            review_count: 0,
            rating_sum: 0,
            working_hours: WorkingHours::default(),
        }
    }
}

/// Exact running aggregate of 1-5 star ratings.
///
/// The integer sum is what gets persisted; the mean is derived on read so
/// repeated folds never accumulate floating point drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingTotals {
    pub sum: i64,
    pub count: i64,
}

impl RatingTotals {
    pub fn fold(self, rating: u8) -> Self {
        Self {
            sum: self.sum + i64::from(rating),
            count: self.count + 1,
        }
    }

    /// Mean rounded to two decimal places, `None` before the first review.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| round_to_cents(self.sum as f64 / self.count as f64))
    }

    /// Rebuilds totals from a stored mean, e.g. rows written before the sum was kept.
    pub fn from_mean(mean: f64, count: i64) -> Self {
        Self {
            sum: (mean * count as f64).round() as i64,
            count,
        }
    }
}

pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
