// libs/reminder-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_config::AppConfig;

pub const REMINDER_SUBJECT: &str = "Appointment Reminder";

/// Which horizon a reminder is sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    SameDay,
    OneDay,
    ThreeDays,
    SevenDays,
}

impl ReminderKind {
    /// Checked in this order; the first horizon matching an appointment wins.
    pub const ALL: [ReminderKind; 4] = [
        ReminderKind::SameDay,
        ReminderKind::OneDay,
        ReminderKind::ThreeDays,
        ReminderKind::SevenDays,
    ];

    pub fn offset_days(self) -> i64 {
        match self {
            ReminderKind::SameDay => 0,
            ReminderKind::OneDay => 1,
            ReminderKind::ThreeDays => 3,
            ReminderKind::SevenDays => 7,
        }
    }

    /// Only the same-day reminder goes to every confirmed appointment.
    pub fn requires_crucial(self) -> bool {
        !matches!(self, ReminderKind::SameDay)
    }

    pub fn message(self, provider_name: &str, slot_time: &str) -> String {
        match self {
            ReminderKind::SameDay => format!(
                "REMINDER: Your appointment with Dr. {} is today at {}.",
                provider_name, slot_time
            ),
            ReminderKind::OneDay => format!(
                "REMINDER: Your appointment with Dr. {} is tomorrow.",
                provider_name
            ),
            ReminderKind::ThreeDays => format!(
                "REMINDER: You have an appointment with Dr. {} in 3 days.",
                provider_name
            ),
            ReminderKind::SevenDays => format!(
                "REMINDER: You have an appointment with Dr. {} in 7 days.",
                provider_name
            ),
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderKind::SameDay => write!(f, "same_day"),
            ReminderKind::OneDay => write!(f, "one_day"),
            ReminderKind::ThreeDays => write!(f, "three_days"),
            ReminderKind::SevenDays => write!(f, "seven_days"),
        }
    }
}

/// Daily wall-clock firing time in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderSchedule {
    pub fire_at: NaiveTime,
    pub offset: FixedOffset,
}

impl ReminderSchedule {
    pub fn new(hour: u32, minute: u32, utc_offset_minutes: i32) -> Result<Self, SchedulerError> {
        let fire_at = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            SchedulerError::InvalidSchedule(format!("{:02}:{:02} is not a valid time of day", hour, minute))
        })?;
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                SchedulerError::InvalidSchedule(format!(
                    "UTC offset of {} minutes is out of range",
                    utc_offset_minutes
                ))
            })?;

        Ok(Self { fire_at, offset })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, SchedulerError> {
        Self::new(
            config.reminder_hour,
            config.reminder_minute,
            config.reminder_utc_offset_minutes,
        )
    }

    /// The first firing strictly after `now`.
    pub fn next_firing_after(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let local_now = now.with_timezone(&self.offset);
        let local_fire = local_now.date_naive().and_time(self.fire_at);
        let utc_fire = local_fire - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        let today = DateTime::<FixedOffset>::from_naive_utc_and_offset(utc_fire, self.offset);

        if today > local_now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

/// Counts from one sweep, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub appointments_scanned: usize,
    pub reminders_selected: usize,
    pub skipped: usize,
    pub emails_sent: usize,
    pub sms_sent: usize,
    pub failures: usize,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("{0} channel is not configured")]
    ChannelNotConfigured(&'static str),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("{channel} delivery timed out after {after:?}")]
    Timeout {
        channel: &'static str,
        after: std::time::Duration,
    },
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid reminder schedule: {0}")]
    InvalidSchedule(String),

    #[error("Failed to load appointments: {0}")]
    Store(String),
}
