// libs/appointment-cell/src/services/slots.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{AppointmentError, DateKey, Provider, SlotKey, SlotReservation};
use crate::services::locks::KeyedLocks;
use crate::store::{AppointmentStore, StoreError};

/// Reserved time labels per day for one provider.
pub type ProviderCalendar = BTreeMap<DateKey, BTreeSet<String>>;

/// Exclusive hold on one provider's calendar.
pub struct ProviderGuard {
    provider_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl ProviderGuard {
    pub fn provider_id(&self) -> Uuid {
        self.provider_id
    }
}

pub struct SlotStore {
    store: Arc<dyn AppointmentStore>,
    provider_locks: KeyedLocks<Uuid>,
}

impl SlotStore {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            store,
            provider_locks: KeyedLocks::new(),
        }
    }

    pub async fn lock_provider(&self, provider_id: Uuid) -> ProviderGuard {
        ProviderGuard {
            provider_id,
            _guard: self.provider_locks.lock(provider_id).await,
        }
    }

    /// Reserve `key` for `appointment_id`, returning the provider record.
    pub async fn reserve(&self, key: &SlotKey, appointment_id: Uuid) -> Result<Provider, AppointmentError> {
        let guard = self.lock_provider(key.provider_id).await;
        self.reserve_locked(&guard, key, appointment_id).await
    }

    /// Same as [`SlotStore::reserve`] for a caller already holding the provider lock.
    #[instrument(skip(self, guard), fields(slot = %key))]
    pub async fn reserve_locked(
        &self,
        guard: &ProviderGuard,
        key: &SlotKey,
        appointment_id: Uuid,
    ) -> Result<Provider, AppointmentError> {
        debug_assert_eq!(guard.provider_id(), key.provider_id);

        let provider = self
            .store
            .get_provider(key.provider_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Doctor {} not found", key.provider_id)))?;

        if !provider.available {
            warn!("Reservation refused, provider {} is unavailable", provider.id);
            return Err(AppointmentError::Unavailable("Doctor Not Available".to_string()));
        }

        match self
            .store
            .insert_reservation(&SlotReservation::new(key, appointment_id))
            .await
        {
            Ok(()) => {
                info!("Slot {} reserved for appointment {}", key, appointment_id);
                Ok(provider)
            }
            Err(StoreError::Duplicate(_)) => {
                warn!("Slot {} already reserved", key);
                Err(AppointmentError::Conflict("Slot Not Available".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Free `key`. Releasing a slot that is not held is a no-op.
    pub async fn release(&self, key: &SlotKey) -> Result<(), AppointmentError> {
        let guard = self.lock_provider(key.provider_id).await;
        self.release_locked(&guard, key).await
    }

    pub async fn release_locked(&self, guard: &ProviderGuard, key: &SlotKey) -> Result<(), AppointmentError> {
        debug_assert_eq!(guard.provider_id(), key.provider_id);
        self.store.delete_reservation(key).await?;
        info!("Slot {} released", key);
        Ok(())
    }

    /// Put back a reservation removed by [`SlotStore::release_locked`]; used to undo
    /// a cancellation whose status write failed.
    pub async fn restore_locked(
        &self,
        guard: &ProviderGuard,
        key: &SlotKey,
        appointment_id: Uuid,
    ) -> Result<(), AppointmentError> {
        debug_assert_eq!(guard.provider_id(), key.provider_id);
        self.store
            .insert_reservation(&SlotReservation::new(key, appointment_id))
            .await?;
        Ok(())
    }

    pub async fn calendar(&self, provider_id: Uuid) -> Result<ProviderCalendar, AppointmentError> {
        self.require_provider(provider_id).await?;

        let mut calendar = ProviderCalendar::new();
        for reservation in self.store.reservations_for_provider(provider_id).await? {
            calendar
                .entry(reservation.slot_date)
                .or_default()
                .insert(reservation.slot_time);
        }
        debug!("Calendar for provider {} spans {} days", provider_id, calendar.len());
        Ok(calendar)
    }

    pub async fn set_availability(
        &self,
        provider_id: Uuid,
        available: bool,
    ) -> Result<Provider, AppointmentError> {
        let _guard = self.lock_provider(provider_id).await;
        let mut provider = self.require_provider(provider_id).await?;
        provider.available = available;
        self.store.put_provider(&provider).await?;
        info!("Provider {} availability set to {}", provider_id, available);
        Ok(provider)
    }

    async fn require_provider(&self, provider_id: Uuid) -> Result<Provider, AppointmentError> {
        self.store
            .get_provider(provider_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Doctor {} not found", provider_id)))
    }
}
