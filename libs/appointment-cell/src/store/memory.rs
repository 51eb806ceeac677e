// libs/appointment-cell/src/store/memory.rs
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{AppointmentStore, StoreError};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, Provider, SlotKey, SlotReservation,
};

/// Process-local store. Reservations are keyed by [`SlotKey`], so a second
/// insert for the same slot is rejected structurally.
#[derive(Default)]
pub struct InMemoryStore {
    providers: RwLock<HashMap<Uuid, Provider>>,
    reservations: RwLock<HashMap<SlotKey, SlotReservation>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_providers(providers: impl IntoIterator<Item = Provider>) -> Self {
        let store = Self::new();
        {
            let mut map = store.providers.write().await;
            for provider in providers {
                map.insert(provider.id, provider);
            }
        }
        store
    }

    /// Store preloaded from a JSON array of providers, the form the
    /// `PROVIDER_SEED_PATH` file takes. Without providers every booking
    /// is rejected as an unknown provider.
    pub async fn from_provider_json(json: &str) -> Result<Self, StoreError> {
        let providers: Vec<Provider> = serde_json::from_str(json)
            .map_err(|e| StoreError::Backend(format!("Invalid provider seed: {}", e)))?;
        debug!("Seeding in-memory store with {} providers", providers.len());
        Ok(Self::with_providers(providers).await)
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, StoreError> {
        Ok(self.providers.read().await.get(&provider_id).cloned())
    }

    async fn put_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        self.providers.write().await.insert(provider.id, provider.clone());
        Ok(())
    }

    async fn insert_reservation(&self, reservation: &SlotReservation) -> Result<(), StoreError> {
        let mut reservations = self.reservations.write().await;
        match reservations.entry(reservation.key()) {
            Entry::Occupied(entry) => Err(StoreError::Duplicate(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(reservation.clone());
                Ok(())
            }
        }
    }

    async fn delete_reservation(&self, key: &SlotKey) -> Result<(), StoreError> {
        if self.reservations.write().await.remove(key).is_none() {
            debug!("No reservation held for {}", key);
        }
        Ok(())
    }

    async fn reservations_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<SlotReservation>, StoreError> {
        Ok(self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| r.provider_id == provider_id)
            .cloned()
            .collect())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&appointment_id).cloned())
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&appointment.id) {
            return Err(StoreError::Backend(format!(
                "Appointment {} already exists",
                appointment.id
            )));
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn update_appointment(
        &self,
        appointment: &Appointment,
        expected_status: AppointmentStatus,
    ) -> Result<(), StoreError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&appointment.id) {
            Some(stored) if stored.status == expected_status => {
                *stored = appointment.clone();
                Ok(())
            }
            Some(_) => Err(StoreError::Stale(appointment.id)),
            None => Err(StoreError::Backend(format!(
                "Appointment {} does not exist",
                appointment.id
            ))),
        }
    }

    async fn find_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }
}
