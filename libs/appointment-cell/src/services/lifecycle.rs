// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{Actor, Appointment, AppointmentError, AppointmentStatus};
use crate::services::locks::KeyedLocks;
use crate::services::payments::PaymentGateway;
use crate::services::slots::SlotStore;
use crate::store::AppointmentStore;

/// Applies status transitions and the other post-booking mutations
/// (prescription, payment flag). All writes for one appointment are
/// serialised and stored with a compare-and-set on the previous status.
pub struct AppointmentLifecycleService {
    store: Arc<dyn AppointmentStore>,
    slots: Arc<SlotStore>,
    appointment_locks: KeyedLocks<Uuid>,
    payments: Option<Arc<dyn PaymentGateway>>,
}

impl AppointmentLifecycleService {
    pub fn new(store: Arc<dyn AppointmentStore>, slots: Arc<SlotStore>) -> Self {
        Self {
            store,
            slots,
            appointment_locks: KeyedLocks::new(),
            payments: None,
        }
    }

    pub fn with_payment_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.payments = Some(gateway);
        self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !current_status.can_transition_to(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::IllegalTransition {
                from: current_status,
                to: new_status,
            });
        }

        debug!("Status transition validated: {} -> {}", current_status, new_status);
        Ok(())
    }

    pub async fn confirm(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, actor, AppointmentStatus::Confirmed).await
    }

    pub async fn complete(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, actor, AppointmentStatus::Completed).await
    }

    /// Cancel and release the slot. Providers cancel their own appointments;
    /// patients may cancel appointments they booked.
    pub async fn cancel(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, actor, AppointmentStatus::Cancelled).await
    }

    /// Store prescription text on a confirmed or completed appointment,
    /// replacing any earlier text. Status is untouched.
    #[instrument(skip(self, prescription))]
    pub async fn add_prescription(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        prescription: &str,
    ) -> Result<Appointment, AppointmentError> {
        let prescription = prescription.trim();
        if prescription.is_empty() {
            return Err(AppointmentError::InvalidInput("Prescription text is required.".to_string()));
        }

        let _guard = self.appointment_locks.lock(appointment_id).await;
        let mut appointment = self.load(appointment_id).await?;
        Self::authorize_provider(&appointment, actor)?;

        if !matches!(
            appointment.status,
            AppointmentStatus::Confirmed | AppointmentStatus::Completed
        ) {
            warn!(
                "Prescription rejected for appointment {} in status {}",
                appointment_id, appointment.status
            );
            return Err(AppointmentError::InvalidInput(format!(
                "Prescriptions can only be added to confirmed or completed appointments (status: {})",
                appointment.status
            )));
        }

        let expected = appointment.status;
        appointment.prescription = Some(prescription.to_string());
        appointment.updated_at = Utc::now();
        self.store.update_appointment(&appointment, expected).await?;

        info!("Prescription recorded for appointment {}", appointment_id);
        Ok(appointment)
    }

    /// Look the order up at the gateway and mark the appointment named by
    /// its receipt as paid when the gateway reports it paid. The caller must
    /// be the patient who booked that appointment.
    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        order_id: &str,
        actor: Actor,
    ) -> Result<Appointment, AppointmentError> {
        let gateway = self.payments.as_ref().ok_or_else(|| {
            AppointmentError::Gateway("Payment gateway not configured".to_string())
        })?;

        let order = gateway.fetch_order(order_id).await?;
        let appointment_id = order
            .receipt
            .as_deref()
            .and_then(|receipt| Uuid::parse_str(receipt.trim()).ok())
            .ok_or_else(|| {
                warn!("Order {} carries no appointment receipt", order.id);
                AppointmentError::InvalidInput("Order is not linked to an appointment".to_string())
            })?;

        let _guard = self.appointment_locks.lock(appointment_id).await;
        let mut appointment = self.load(appointment_id).await?;

        if !matches!(actor, Actor::Patient(_)) || !actor.owns(&appointment) {
            return Err(AppointmentError::Unauthorized(
                "Not authorized to pay for this appointment".to_string(),
            ));
        }
        if appointment.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::InvalidInput(
                "Appointment Cancelled or not found".to_string(),
            ));
        }
        if !order.is_paid() {
            info!(
                "Order {} for appointment {} is {}, payment not recorded",
                order.id, appointment_id, order.status
            );
            return Ok(appointment);
        }
        if appointment.payment {
            debug!("Appointment {} already paid", appointment_id);
            return Ok(appointment);
        }

        let expected = appointment.status;
        appointment.payment = true;
        appointment.updated_at = Utc::now();
        self.store.update_appointment(&appointment, expected).await?;

        info!("Payment verified for appointment {} (order {})", appointment_id, order.id);
        Ok(appointment)
    }

    #[instrument(skip(self), fields(to = %target))]
    async fn transition(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        target: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let _guard = self.appointment_locks.lock(appointment_id).await;
        let mut appointment = self.load(appointment_id).await?;

        match (target, actor) {
            (AppointmentStatus::Cancelled, Actor::Patient(_)) if actor.owns(&appointment) => {}
            _ => Self::authorize_provider(&appointment, actor)?,
        }

        let previous = appointment.status;
        Self::validate_status_transition(previous, target)?;

        appointment.status = target;
        appointment.updated_at = Utc::now();

        if target == AppointmentStatus::Cancelled {
            self.cancel_and_release(&appointment, previous).await?;
        } else {
            self.store.update_appointment(&appointment, previous).await?;
        }

        info!("Appointment {} moved {} -> {}", appointment_id, previous, target);
        Ok(appointment)
    }

    /// Release the slot and write the cancelled status as one unit: if the
    /// status write fails the reservation is put back.
    async fn cancel_and_release(
        &self,
        appointment: &Appointment,
        previous: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        let key = appointment.slot_key();
        let provider_guard = self.slots.lock_provider(appointment.provider_id).await;

        self.slots.release_locked(&provider_guard, &key).await?;

        if let Err(e) = self.store.update_appointment(appointment, previous).await {
            error!(
                "Cancelling appointment {} failed after slot release, restoring reservation: {}",
                appointment.id, e
            );
            if let Err(restore_err) = self
                .slots
                .restore_locked(&provider_guard, &key, appointment.id)
                .await
            {
                error!("Failed to restore reservation {}: {}", key, restore_err);
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {} not found", appointment_id)))
    }

    fn authorize_provider(appointment: &Appointment, actor: Actor) -> Result<(), AppointmentError> {
        match actor {
            Actor::Provider(_) if actor.owns(appointment) => Ok(()),
            _ => {
                warn!("Actor {:?} is not the provider of appointment {}", actor, appointment.id);
                Err(AppointmentError::Unauthorized(
                    "Unauthorized action or Appointment not found".to_string(),
                ))
            }
        }
    }
}
