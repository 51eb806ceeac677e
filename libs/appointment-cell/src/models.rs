// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ==============================================================================
// PROVIDERS AND SLOTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub fees: f64,
    pub available: bool,
}

/// Calendar day of a slot. Rendered as `D_M_YYYY` without zero padding
/// (`7_3_2025`), which is the key format stored alongside every booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn plus_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.0.day(), self.0.month(), self.0.year())
    }
}

impl FromStr for DateKey {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppointmentError::InvalidInput(format!("Invalid slot date: {:?}", s));

        let mut parts = s.trim().split('_');
        let (day, month, year) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(d), Some(m), Some(y), None) => (d, m, y),
            _ => return Err(invalid()),
        };

        let day: u32 = day.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let year: i32 = year.parse().map_err(|_| invalid())?;

        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for DateKey {
    type Error = AppointmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub provider_id: Uuid,
    pub slot_date: DateKey,
    pub slot_time: String,
}

impl SlotKey {
    pub fn new(provider_id: Uuid, slot_date: DateKey, slot_time: impl Into<String>) -> Self {
        Self {
            provider_id,
            slot_date,
            slot_time: slot_time.into(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {}", self.provider_id, self.slot_date, self.slot_time)
    }
}

/// Row of the reservation table. At most one row exists per [`SlotKey`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotReservation {
    pub provider_id: Uuid,
    pub slot_date: DateKey,
    pub slot_time: String,
    pub appointment_id: Uuid,
    pub reserved_at: DateTime<Utc>,
}

impl SlotReservation {
    pub fn new(key: &SlotKey, appointment_id: Uuid) -> Self {
        Self {
            provider_id: key.provider_id,
            slot_date: key.slot_date,
            slot_time: key.slot_time.clone(),
            appointment_id,
            reserved_at: Utc::now(),
        }
    }

    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.provider_id, self.slot_date, self.slot_time.clone())
    }
}

// ==============================================================================
// SYMPTOM SIGNAL
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Sentiment {
    #[serde(rename = "positive")]
    Positive,
    #[default]
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "negative")]
    Negative,
    #[serde(rename = "mild negative")]
    MildNegative,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Mild => write!(f, "mild"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Severe => write!(f, "severe"),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Negative => write!(f, "negative"),
            Sentiment::MildNegative => write!(f, "mild negative"),
        }
    }
}

/// Structured reading of the free-text symptom description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SymptomSignal {
    pub keywords: Vec<String>,
    pub identified_symptoms: Vec<String>,
    #[serde(rename = "duration")]
    pub duration_mentions: Vec<String>,
    pub body_parts: Vec<String>,
    pub sentiment: Sentiment,
    pub severity: Severity,
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

/// Stored and sent under the variant names (`"Confirmed"`), which is what
/// the web clients compare against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum AppointmentStatus {
    Booked,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses reachable in one step from `self`.
    pub fn allowed_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Booked => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "Booked"),
            AppointmentStatus::Confirmed => write!(f, "Confirmed"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Contact details copied from the patient's profile when the appointment is booked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PatientContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub provider_name: String,
    pub patient: PatientContact,
    pub slot_date: DateKey,
    pub slot_time: String,
    pub amount: f64,
    pub symptoms_raw: String,
    pub symptoms_structured: SymptomSignal,
    pub is_crucial: bool,
    pub status: AppointmentStatus,
    pub payment: bool,
    pub prescription: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.provider_id, self.slot_date, self.slot_time.clone())
    }
}

/// Who is acting on an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Provider(Uuid),
    Patient(Uuid),
}

impl Actor {
    pub fn owns(&self, appointment: &Appointment) -> bool {
        match self {
            Actor::Provider(id) => *id == appointment.provider_id,
            Actor::Patient(id) => *id == appointment.patient_id,
        }
    }
}

/// Predicate for appointment queries; `None` fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub slot_dates: Option<Vec<DateKey>>,
    pub provider_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.status.map_or(true, |s| appointment.status == s)
            && self
                .slot_dates
                .as_ref()
                .map_or(true, |dates| dates.contains(&appointment.slot_date))
            && self.provider_id.map_or(true, |id| appointment.provider_id == id)
            && self.patient_id.map_or(true, |id| appointment.patient_id == id)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub provider_id: Uuid,
    pub slot_date: String,
    pub slot_time: String,
    pub symptoms: String,
    #[serde(default)]
    pub is_crucial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionRequest {
    pub prescription: String,
}

/// Order id returned by the checkout; its status is looked up at the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Appointment cannot move from {from} to {to}")]
    IllegalTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),
}
