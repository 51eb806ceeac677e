// libs/reminder-cell/src/services/scheduler.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use appointment_cell::models::{Appointment, AppointmentFilter, AppointmentStatus, DateKey};
use appointment_cell::AppointmentStore;

use crate::models::{
    NotificationError, ReminderKind, ReminderSchedule, SchedulerError, SweepReport, REMINDER_SUBJECT,
};
use crate::services::notifier::Notifier;

/// Upper bound on one email or SMS delivery inside a sweep.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ReminderScheduler {
    store: Arc<dyn AppointmentStore>,
    notifier: Arc<dyn Notifier>,
    schedule: ReminderSchedule,
    dispatch_timeout: Duration,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn Notifier>,
        schedule: ReminderSchedule,
    ) -> Self {
        Self {
            store,
            notifier,
            schedule,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn schedule(&self) -> &ReminderSchedule {
        &self.schedule
    }

    /// Pick the single reminder an appointment should receive on `today`.
    pub fn select_reminder(appointment: &Appointment, today: DateKey) -> Option<ReminderKind> {
        let days_out = (appointment.slot_date.date() - today.date()).num_days();

        ReminderKind::ALL.into_iter().find(|kind| {
            kind.offset_days() == days_out && (!kind.requires_crucial() || appointment.is_crucial)
        })
    }

    /// One sweep at the current time in the schedule's offset.
    pub async fn run_daily_reminder_sweep(&self) {
        let now = Utc::now().with_timezone(&self.schedule.offset);
        let report = self.sweep_at(now).await;
        log_report(&report);
    }

    /// Sweep as if the clock read `now`. Failures are logged and counted,
    /// never returned.
    #[instrument(skip(self))]
    pub async fn sweep_at(&self, now: DateTime<FixedOffset>) -> SweepReport {
        let mut report = SweepReport::default();
        let today = DateKey::new(now.with_timezone(&self.schedule.offset).date_naive());

        let appointments = match self.load_candidates(today).await {
            Ok(appointments) => appointments,
            Err(e) => {
                error!("Reminder sweep for {} aborted: {}", today, e);
                report.failures += 1;
                return report;
            }
        };
        report.appointments_scanned = appointments.len();
        debug!("{} confirmed appointments near {}", appointments.len(), today);

        for appointment in &appointments {
            let Some(kind) = Self::select_reminder(appointment, today) else {
                report.skipped += 1;
                continue;
            };
            report.reminders_selected += 1;
            self.dispatch(appointment, kind, &mut report).await;
        }

        report
    }

    /// Run the sweep every day at the configured time until the task is dropped.
    /// Each firing finishes before the next wait begins, so firings never
    /// overlap; a sweep that runs past a firing time skips that firing.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            // firings are placed on the tokio clock, paired with the wall clock once
            let started = Instant::now();
            let started_wall = Utc::now().with_timezone(&self.schedule.offset);
            let mut next = self.schedule.next_firing_after(started_wall);

            info!(
                "Reminder scheduler started, firing daily at {} (UTC{})",
                self.schedule.fire_at, self.schedule.offset
            );

            loop {
                let wait = (next - started_wall).to_std().unwrap_or_default();
                debug!("Next reminder sweep at {}", next);
                tokio::time::sleep_until(started + wait).await;

                let report = self.sweep_at(next).await;
                log_report(&report);

                let elapsed = chrono::Duration::from_std(started.elapsed())
                    .unwrap_or_else(|_| chrono::Duration::zero());
                let now = started_wall + elapsed;
                let following = self.schedule.next_firing_after(next);
                if following <= now {
                    warn!("Reminder sweep for {} overran the next firing, skipping ahead", next);
                }
                next = self.schedule.next_firing_after(now.max(next));
            }
        })
    }

    async fn load_candidates(&self, today: DateKey) -> Result<Vec<Appointment>, SchedulerError> {
        let filter = AppointmentFilter {
            status: Some(AppointmentStatus::Confirmed),
            slot_dates: Some(
                ReminderKind::ALL
                    .iter()
                    .map(|kind| today.plus_days(kind.offset_days()))
                    .collect(),
            ),
            ..AppointmentFilter::default()
        };

        self.store
            .find_appointments(&filter)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))
    }

    async fn dispatch(&self, appointment: &Appointment, kind: ReminderKind, report: &mut SweepReport) {
        let message = kind.message(&appointment.provider_name, &appointment.slot_time);
        let contact = &appointment.patient;

        if let Some(email) = contact.email.as_deref().filter(|e| !e.trim().is_empty()) {
            let sent = self
                .bounded("email", self.notifier.send_email(email, REMINDER_SUBJECT, &message))
                .await;
            match sent {
                Ok(()) => report.emails_sent += 1,
                Err(e) => {
                    report.failures += 1;
                    error!(
                        appointment_id = %appointment.id,
                        reminder = %kind,
                        "Email reminder failed: {}", e
                    );
                }
            }
        }

        if let Some(phone) = contact.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            match self.bounded("sms", self.notifier.send_sms(phone, &message)).await {
                Ok(()) => report.sms_sent += 1,
                Err(e) => {
                    report.failures += 1;
                    error!(
                        appointment_id = %appointment.id,
                        reminder = %kind,
                        "SMS reminder failed: {}", e
                    );
                }
            }
        }

        if contact.email.is_none() && contact.phone.is_none() {
            warn!("Appointment {} has no patient contact, reminder not sent", appointment.id);
        }
    }

    async fn bounded<F>(&self, channel: &'static str, send: F) -> Result<(), NotificationError>
    where
        F: Future<Output = Result<(), NotificationError>>,
    {
        tokio::time::timeout(self.dispatch_timeout, send)
            .await
            .unwrap_or_else(|_| {
                Err(NotificationError::Timeout {
                    channel,
                    after: self.dispatch_timeout,
                })
            })
    }
}

fn log_report(report: &SweepReport) {
    info!(
        scanned = report.appointments_scanned,
        selected = report.reminders_selected,
        emails = report.emails_sent,
        sms = report.sms_sent,
        failures = report.failures,
        "Daily reminder sweep finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use appointment_cell::models::{PatientContact, SymptomSignal};
    use uuid::Uuid;

    fn appointment(date: &str, crucial: bool) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            provider_name: "Rao".to_string(),
            patient: PatientContact::default(),
            slot_date: date.parse().unwrap(),
            slot_time: "10:00 AM".to_string(),
            amount: 0.0,
            symptoms_raw: String::new(),
            symptoms_structured: SymptomSignal::default(),
            is_crucial: crucial,
            status: AppointmentStatus::Confirmed,
            payment: true,
            prescription: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_select_reminder_horizons() {
        let today: DateKey = "1_3_2025".parse().unwrap();

        let cases = [
            ("1_3_2025", false, Some(ReminderKind::SameDay)),
            ("1_3_2025", true, Some(ReminderKind::SameDay)),
            ("2_3_2025", true, Some(ReminderKind::OneDay)),
            ("2_3_2025", false, None),
            ("4_3_2025", true, Some(ReminderKind::ThreeDays)),
            ("8_3_2025", true, Some(ReminderKind::SevenDays)),
            ("8_3_2025", false, None),
            ("5_3_2025", true, None),
            ("28_2_2025", true, None),
        ];

        for (date, crucial, expected) in cases {
            assert_eq!(
                ReminderScheduler::select_reminder(&appointment(date, crucial), today),
                expected,
                "date {} crucial {}",
                date,
                crucial
            );
        }
    }

    #[test]
    fn test_select_reminder_across_month_end() {
        let today: DateKey = "28_2_2025".parse().unwrap();
        assert_eq!(
            ReminderScheduler::select_reminder(&appointment("7_3_2025", true), today),
            Some(ReminderKind::SevenDays)
        );
    }
}
