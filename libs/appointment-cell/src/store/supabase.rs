// libs/appointment-cell/src/store/supabase.rs
//
// PostgREST-backed store. Expected schema:
//   providers(id uuid pk, name text, fees float8, available bool)
//   appointments(id uuid pk, ..., status text, slot_date text, symptoms_structured jsonb, ...)
//   slot_reservations(provider_id uuid, slot_date text, slot_time text, appointment_id uuid,
//                     reserved_at timestamptz, unique (provider_id, slot_date, slot_time))

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{DatabaseError, SupabaseClient};

use super::{AppointmentStore, StoreError};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, Provider, SlotKey, SlotReservation,
};

const PROVIDERS: &str = "/rest/v1/providers";
const APPOINTMENTS: &str = "/rest/v1/appointments";
const RESERVATIONS: &str = "/rest/v1/slot_reservations";

pub struct SupabaseStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn slot_query(key: &SlotKey) -> String {
        format!(
            "provider_id=eq.{}&slot_date=eq.{}&slot_time=eq.{}",
            key.provider_id,
            urlencoding::encode(&key.slot_date.to_string()),
            urlencoding::encode(&key.slot_time)
        )
    }

    fn filter_query(filter: &AppointmentFilter) -> String {
        let mut params = Vec::new();
        if let Some(status) = filter.status {
            params.push(format!("status=eq.{}", status));
        }
        if let Some(dates) = &filter.slot_dates {
            let list = dates
                .iter()
                .map(|d| format!("\"{}\"", d))
                .collect::<Vec<_>>()
                .join(",");
            params.push(format!("slot_date=in.({})", urlencoding::encode(&list)));
        }
        if let Some(provider_id) = filter.provider_id {
            params.push(format!("provider_id=eq.{}", provider_id));
        }
        if let Some(patient_id) = filter.patient_id {
            params.push(format!("patient_id=eq.{}", patient_id));
        }
        params.push("order=created_at.asc".to_string());
        params.join("&")
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
        serde_json::to_value(value).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn backend(err: DatabaseError) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl AppointmentStore for SupabaseStore {
    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, StoreError> {
        let path = format!("{}?id=eq.{}", PROVIDERS, provider_id);
        let rows: Vec<Provider> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().next())
    }

    async fn put_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        let body = Self::to_json(provider)?;
        let path = format!("{}?id=eq.{}", PROVIDERS, provider.id);
        let updated: Vec<Provider> = self
            .supabase
            .request(Method::PATCH, &path, None, Some(body.clone()))
            .await
            .map_err(backend)?;

        if updated.is_empty() {
            debug!("Provider {} not stored yet, inserting", provider.id);
            self.supabase
                .execute(Method::POST, PROVIDERS, None, Some(body))
                .await
                .map_err(backend)?;
        }
        Ok(())
    }

    async fn insert_reservation(&self, reservation: &SlotReservation) -> Result<(), StoreError> {
        let body = Self::to_json(reservation)?;
        match self
            .supabase
            .execute(Method::POST, RESERVATIONS, None, Some(body))
            .await
        {
            Ok(()) => Ok(()),
            Err(DatabaseError::Conflict(detail)) => {
                debug!("Reservation rejected by unique constraint: {}", detail);
                Err(StoreError::Duplicate(reservation.key()))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn delete_reservation(&self, key: &SlotKey) -> Result<(), StoreError> {
        let path = format!("{}?{}", RESERVATIONS, Self::slot_query(key));
        self.supabase
            .execute(Method::DELETE, &path, None, None)
            .await
            .map_err(backend)
    }

    async fn reservations_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<SlotReservation>, StoreError> {
        let path = format!("{}?provider_id=eq.{}", RESERVATIONS, provider_id);
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(backend)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS, appointment_id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().next())
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let body = Self::to_json(appointment)?;
        self.supabase
            .execute(Method::POST, APPOINTMENTS, None, Some(body))
            .await
            .map_err(backend)
    }

    async fn update_appointment(
        &self,
        appointment: &Appointment,
        expected_status: AppointmentStatus,
    ) -> Result<(), StoreError> {
        let path = format!(
            "{}?id=eq.{}&status=eq.{}",
            APPOINTMENTS, appointment.id, expected_status
        );
        let updated: Vec<Appointment> = self
            .supabase
            .request(Method::PATCH, &path, None, Some(Self::to_json(appointment)?))
            .await
            .map_err(backend)?;

        if updated.is_empty() {
            warn!(
                "Compare-and-set failed for appointment {} (expected {})",
                appointment.id, expected_status
            );
            return Err(StoreError::Stale(appointment.id));
        }
        Ok(())
    }

    async fn find_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("{}?{}", APPOINTMENTS, Self::filter_query(filter));
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateKey;

    #[test]
    fn test_filter_query_encodes_date_list() {
        let filter = AppointmentFilter {
            status: Some(AppointmentStatus::Confirmed),
            slot_dates: Some(vec![
                "1_2_2025".parse::<DateKey>().unwrap(),
                "2_2_2025".parse::<DateKey>().unwrap(),
            ]),
            ..AppointmentFilter::default()
        };

        let query = SupabaseStore::filter_query(&filter);
        assert!(query.starts_with("status=eq.Confirmed&slot_date=in.("));
        assert!(query.contains("%221_2_2025%22%2C%222_2_2025%22"));
        assert!(query.ends_with("order=created_at.asc"));
    }

    #[test]
    fn test_slot_query_encodes_time_label() {
        let key = SlotKey::new(Uuid::nil(), "9_9_2025".parse().unwrap(), "10:30 AM");
        let query = SupabaseStore::slot_query(&key);
        assert!(query.ends_with("slot_time=eq.10%3A30%20AM"));
    }
}
