// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentStatus, BookAppointmentRequest,
    DateKey, PatientContact, SlotKey,
};
use crate::services::slots::SlotStore;
use crate::services::symptoms;
use crate::store::AppointmentStore;

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    slots: Arc<SlotStore>,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn AppointmentStore>, slots: Arc<SlotStore>) -> Self {
        Self { store, slots }
    }

    /// Reserve the requested slot and create a `Booked` appointment for it.
    ///
    /// The reservation and the appointment insert happen under the provider
    /// lock; if the insert fails the reservation is released again.
    #[instrument(skip(self, patient, request), fields(provider_id = %request.provider_id))]
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        patient: PatientContact,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let symptoms_raw = request.symptoms.trim();
        if symptoms_raw.is_empty() {
            return Err(AppointmentError::InvalidInput("Symptoms are required.".to_string()));
        }

        let slot_time = request.slot_time.trim();
        if slot_time.is_empty() {
            return Err(AppointmentError::InvalidInput("Slot time is required.".to_string()));
        }
        let slot_date: DateKey = request.slot_date.parse()?;

        let symptoms_structured = symptoms::normalize(symptoms_raw);
        let key = SlotKey::new(request.provider_id, slot_date, slot_time);
        let appointment_id = Uuid::new_v4();

        let guard = self.slots.lock_provider(request.provider_id).await;
        let provider = self.slots.reserve_locked(&guard, &key, appointment_id).await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: appointment_id,
            patient_id,
            provider_id: provider.id,
            provider_name: provider.name.clone(),
            patient,
            slot_date,
            slot_time: key.slot_time.clone(),
            amount: provider.fees,
            symptoms_raw: symptoms_raw.to_string(),
            symptoms_structured,
            is_crucial: request.is_crucial,
            status: AppointmentStatus::Booked,
            payment: false,
            prescription: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.insert_appointment(&appointment).await {
            error!("Failed to persist appointment {}: {}", appointment_id, e);
            if let Err(release_err) = self.slots.release_locked(&guard, &key).await {
                error!("Failed to release slot {} after insert failure: {}", key, release_err);
            }
            return Err(e.into());
        }

        info!(
            "Appointment {} booked for patient {} with provider {} on {} at {}",
            appointment.id, patient_id, provider.id, appointment.slot_date, appointment.slot_time
        );
        Ok(appointment)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or_else(|| {
                warn!("Appointment {} not found", appointment_id);
                AppointmentError::NotFound(format!("Appointment {} not found", appointment_id))
            })
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let filter = AppointmentFilter {
            patient_id: Some(patient_id),
            ..AppointmentFilter::default()
        };
        Ok(self.store.find_appointments(&filter).await?)
    }

    /// Most recent first, as the provider dashboard shows them.
    pub async fn list_for_provider(&self, provider_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let filter = AppointmentFilter {
            provider_id: Some(provider_id),
            ..AppointmentFilter::default()
        };
        let mut appointments = self.store.find_appointments(&filter).await?;
        appointments.reverse();
        Ok(appointments)
    }
}
