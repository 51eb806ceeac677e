// libs/appointment-cell/src/store/mod.rs
//
// Persistence collaborator for providers, slot reservations and appointments.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentStatus, Provider, SlotKey,
    SlotReservation,
};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryStore;
pub use supabase::SupabaseStore;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// The reservation table already holds this slot.
    #[error("Slot {0} is already reserved")]
    Duplicate(SlotKey),

    /// Compare-and-set lost: the stored status is no longer the expected one.
    #[error("Appointment {0} was modified concurrently")]
    Stale(Uuid),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => AppointmentError::Conflict("Slot Not Available".to_string()),
            StoreError::Stale(id) => AppointmentError::Conflict(format!(
                "Appointment {} was modified concurrently, please retry",
                id
            )),
            StoreError::Backend(msg) => AppointmentError::Database(msg),
        }
    }
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, StoreError>;

    async fn put_provider(&self, provider: &Provider) -> Result<(), StoreError>;

    /// Insert a reservation row; fails with [`StoreError::Duplicate`] when the key is taken.
    async fn insert_reservation(&self, reservation: &SlotReservation) -> Result<(), StoreError>;

    /// Remove the reservation for `key`. Removing a missing row is not an error.
    async fn delete_reservation(&self, key: &SlotKey) -> Result<(), StoreError>;

    async fn reservations_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<SlotReservation>, StoreError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), StoreError>;

    /// Replace the stored appointment only if its status is still `expected_status`.
    async fn update_appointment(
        &self,
        appointment: &Appointment,
        expected_status: AppointmentStatus,
    ) -> Result<(), StoreError>;

    /// Appointments matching `filter`, oldest first.
    async fn find_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError>;
}
