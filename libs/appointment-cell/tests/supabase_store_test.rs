// libs/appointment-cell/tests/supabase_store_test.rs
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::*;
use appointment_cell::{AppointmentStore, StoreError, SupabaseStore};
use shared_database::SupabaseClient;
use shared_utils::test_utils::TestConfig;

async fn store_for(server: &MockServer) -> SupabaseStore {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    SupabaseStore::new(Arc::new(SupabaseClient::new(&config)))
}

fn sample_appointment(status: AppointmentStatus) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        provider_id: Uuid::new_v4(),
        provider_name: "Kavya Menon".to_string(),
        patient: PatientContact::default(),
        slot_date: "4_11_2025".parse().unwrap(),
        slot_time: "4:00 PM".to_string(),
        amount: 30.0,
        symptoms_raw: "fever".to_string(),
        symptoms_structured: SymptomSignal::default(),
        is_crucial: true,
        status,
        payment: false,
        prescription: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_reservation_unique_violation_maps_to_duplicate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/slot_reservations"))
        .and(body_partial_json(json!({ "slot_date": "4_11_2025", "slot_time": "4:00 PM" })))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let key = SlotKey::new(Uuid::new_v4(), "4_11_2025".parse().unwrap(), "4:00 PM");
    let result = store
        .insert_reservation(&SlotReservation::new(&key, Uuid::new_v4()))
        .await;

    assert_matches!(result, Err(StoreError::Duplicate(k)) if k == key);
}

#[tokio::test]
async fn test_update_is_conditional_on_expected_status() {
    let server = MockServer::start().await;
    let mut appointment = sample_appointment(AppointmentStatus::Booked);
    appointment.status = AppointmentStatus::Confirmed;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment.id)))
        .and(query_param("status", "eq.Booked"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    store
        .update_appointment(&appointment, AppointmentStatus::Booked)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_matching_no_rows_is_stale() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let appointment = sample_appointment(AppointmentStatus::Cancelled);
    let result = store
        .update_appointment(&appointment, AppointmentStatus::Confirmed)
        .await;

    assert_matches!(result, Err(StoreError::Stale(id)) if id == appointment.id);
}

#[tokio::test]
async fn test_find_appointments_sends_filters() {
    let server = MockServer::start().await;
    let appointment = sample_appointment(AppointmentStatus::Confirmed);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.Confirmed"))
        .and(query_param("slot_date", "in.(\"4_11_2025\")"))
        .and(query_param("order", "created_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let found = store
        .find_appointments(&AppointmentFilter {
            status: Some(AppointmentStatus::Confirmed),
            slot_dates: Some(vec![appointment.slot_date]),
            ..AppointmentFilter::default()
        })
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, appointment.id);
    assert!(found[0].is_crucial);
}

#[tokio::test]
async fn test_server_error_surfaces_as_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    assert_matches!(
        store.get_provider(Uuid::new_v4()).await,
        Err(StoreError::Backend(_))
    );
}
