// libs/appointment-cell/tests/booking_test.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::*;
use appointment_cell::{AppointmentState, AppointmentStore, GatewayOrder, InMemoryStore, PaymentGateway};
use shared_utils::test_utils::TestConfig;

// ==============================================================================
// TEST FIXTURES
// ==============================================================================

/// Gateway answering from a fixed set of orders.
#[derive(Default)]
struct FakeGateway {
    orders: Mutex<HashMap<String, GatewayOrder>>,
}

impl FakeGateway {
    fn put(&self, order_id: &str, status: &str, appointment_id: Uuid) {
        self.orders.lock().unwrap().insert(
            order_id.to_string(),
            GatewayOrder {
                id: order_id.to_string(),
                status: status.to_string(),
                receipt: Some(appointment_id.to_string()),
            },
        );
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, AppointmentError> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| AppointmentError::NotFound(format!("Order {} not found", order_id)))
    }
}

struct TestSetup {
    state: Arc<AppointmentState>,
    provider: Provider,
}

impl TestSetup {
    async fn new() -> Self {
        Self::build(None).await
    }

    async fn with_gateway(gateway: Arc<FakeGateway>) -> Self {
        Self::build(Some(gateway as Arc<dyn PaymentGateway>)).await
    }

    async fn build(gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        let provider = Provider {
            id: Uuid::new_v4(),
            name: "Meera Iyer".to_string(),
            fees: 40.0,
            available: true,
        };
        let store: Arc<dyn AppointmentStore> =
            Arc::new(InMemoryStore::with_providers(vec![provider.clone()]).await);
        let state = Arc::new(AppointmentState::with_payment_gateway(
            TestConfig::default().to_arc(),
            store,
            gateway,
        ));
        Self { state, provider }
    }

    fn request(&self, date: &str, time: &str) -> BookAppointmentRequest {
        BookAppointmentRequest {
            provider_id: self.provider.id,
            slot_date: date.to_string(),
            slot_time: time.to_string(),
            symptoms: "I have a severe headache for 3 days".to_string(),
            is_crucial: false,
        }
    }

    fn patient() -> PatientContact {
        PatientContact {
            name: "Ravi".to_string(),
            email: Some("ravi@example.com".to_string()),
            phone: Some("+919800000000".to_string()),
        }
    }

    async fn book(&self, patient_id: Uuid, date: &str, time: &str) -> Result<Appointment, AppointmentError> {
        self.state
            .booking
            .book_appointment(patient_id, Self::patient(), self.request(date, time))
            .await
    }

    fn doctor(&self) -> Actor {
        Actor::Provider(self.provider.id)
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn test_booking_creates_booked_appointment_with_signal() {
    let setup = TestSetup::new().await;
    let patient_id = Uuid::new_v4();

    let appointment = setup.book(patient_id, "12_5_2025", "10:00 AM").await.unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Booked);
    assert!(!appointment.payment);
    assert_eq!(appointment.amount, 40.0);
    assert_eq!(appointment.provider_name, "Meera Iyer");
    assert_eq!(appointment.patient_id, patient_id);
    assert_eq!(appointment.symptoms_structured.identified_symptoms, vec!["Headache"]);
    assert_eq!(appointment.symptoms_structured.severity, Severity::Severe);

    let stored = setup.state.booking.get_appointment(appointment.id).await.unwrap();
    assert_eq!(stored, appointment);
}

#[tokio::test]
async fn test_booking_requires_symptoms() {
    let setup = TestSetup::new().await;
    let mut request = setup.request("12_5_2025", "10:00 AM");
    request.symptoms = "   ".to_string();

    let result = setup
        .state
        .booking
        .book_appointment(Uuid::new_v4(), TestSetup::patient(), request)
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidInput(_)));
    // nothing was reserved
    assert!(setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await.is_ok());
}

#[tokio::test]
async fn test_booking_rejects_bad_date_key() {
    let setup = TestSetup::new().await;
    assert_matches!(
        setup.book(Uuid::new_v4(), "2025-05-12", "10:00 AM").await,
        Err(AppointmentError::InvalidInput(_))
    );
}

#[tokio::test]
async fn test_seeded_memory_store_accepts_bookings() {
    let provider_id = Uuid::new_v4();
    let seed = format!(
        r#"[{{"id": "{}", "name": "Arjun Nair", "fees": 35.0, "available": true}}]"#,
        provider_id
    );
    let store: Arc<dyn AppointmentStore> =
        Arc::new(InMemoryStore::from_provider_json(&seed).await.unwrap());
    let state = AppointmentState::new(TestConfig::default().to_arc(), store);

    let appointment = state
        .booking
        .book_appointment(
            Uuid::new_v4(),
            TestSetup::patient(),
            BookAppointmentRequest {
                provider_id,
                slot_date: "12_5_2025".to_string(),
                slot_time: "10:00 AM".to_string(),
                symptoms: "fever".to_string(),
                is_crucial: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(appointment.provider_name, "Arjun Nair");
    assert_eq!(appointment.amount, 35.0);
}

#[tokio::test]
async fn test_booking_unknown_provider() {
    let setup = TestSetup::new().await;
    let mut request = setup.request("12_5_2025", "10:00 AM");
    request.provider_id = Uuid::new_v4();

    let result = setup
        .state
        .booking
        .book_appointment(Uuid::new_v4(), TestSetup::patient(), request)
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound(_)));
}

#[tokio::test]
async fn test_second_booking_of_same_slot_conflicts() {
    let setup = TestSetup::new().await;
    setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await.unwrap();

    assert_matches!(
        setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await,
        Err(AppointmentError::Conflict(_))
    );
    // a different time label is a different slot
    assert!(setup.book(Uuid::new_v4(), "12_5_2025", "10:30 AM").await.is_ok());
}

#[tokio::test]
async fn test_concurrent_bookings_for_one_slot_yield_one_winner() {
    let setup = Arc::new(TestSetup::new().await);

    let attempts = (0..32).map(|_| {
        let setup = Arc::clone(&setup);
        tokio::spawn(async move { setup.book(Uuid::new_v4(), "20_6_2025", "9:00 AM").await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(AppointmentError::Conflict(_)))));

    let active = setup
        .state
        .store
        .find_appointments(&AppointmentFilter {
            provider_id: Some(setup.provider.id),
            ..AppointmentFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn test_unavailable_provider_rejects_booking() {
    let setup = TestSetup::new().await;
    setup.state.slots.set_availability(setup.provider.id, false).await.unwrap();

    assert_matches!(
        setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await,
        Err(AppointmentError::Unavailable(_))
    );
}

// ==============================================================================
// STATE MACHINE
// ==============================================================================

#[tokio::test]
async fn test_cancel_frees_slot_for_rebooking() {
    let setup = TestSetup::new().await;
    let first = setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await.unwrap();

    let cancelled = setup.state.lifecycle.cancel(first.id, setup.doctor()).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let second = setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await.unwrap();
    assert_eq!(second.status, AppointmentStatus::Booked);

    // cancelled appointment is kept for history
    let history = setup.state.booking.get_appointment(first.id).await.unwrap();
    assert_eq!(history.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn test_full_happy_path() {
    let setup = TestSetup::new().await;
    let appointment = setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await.unwrap();
    let lifecycle = &setup.state.lifecycle;

    let confirmed = lifecycle.confirm(appointment.id, setup.doctor()).await.unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let completed = lifecycle.complete(appointment.id, setup.doctor()).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    // completed appointments keep their slot
    assert_matches!(
        setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await,
        Err(AppointmentError::Conflict(_))
    );
}

#[tokio::test]
async fn test_illegal_transitions() {
    let setup = TestSetup::new().await;
    let lifecycle = &setup.state.lifecycle;

    let booked = setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await.unwrap();
    assert_matches!(
        lifecycle.complete(booked.id, setup.doctor()).await,
        Err(AppointmentError::IllegalTransition {
            from: AppointmentStatus::Booked,
            to: AppointmentStatus::Completed
        })
    );

    lifecycle.confirm(booked.id, setup.doctor()).await.unwrap();
    lifecycle.complete(booked.id, setup.doctor()).await.unwrap();
    assert_matches!(
        lifecycle.confirm(booked.id, setup.doctor()).await,
        Err(AppointmentError::IllegalTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Confirmed
        })
    );

    let other = setup.book(Uuid::new_v4(), "12_5_2025", "11:00 AM").await.unwrap();
    lifecycle.cancel(other.id, setup.doctor()).await.unwrap();
    for result in [
        lifecycle.confirm(other.id, setup.doctor()).await,
        lifecycle.complete(other.id, setup.doctor()).await,
        lifecycle.cancel(other.id, setup.doctor()).await,
    ] {
        assert_matches!(
            result,
            Err(AppointmentError::IllegalTransition { from: AppointmentStatus::Cancelled, .. })
        );
    }
}

#[tokio::test]
async fn test_transitions_require_owning_provider() {
    let setup = TestSetup::new().await;
    let patient_id = Uuid::new_v4();
    let appointment = setup.book(patient_id, "12_5_2025", "10:00 AM").await.unwrap();
    let lifecycle = &setup.state.lifecycle;
    let stranger = Actor::Provider(Uuid::new_v4());

    assert_matches!(
        lifecycle.confirm(appointment.id, stranger).await,
        Err(AppointmentError::Unauthorized(_))
    );
    assert_matches!(
        lifecycle.cancel(appointment.id, stranger).await,
        Err(AppointmentError::Unauthorized(_))
    );
    // patients can cancel but not confirm
    assert_matches!(
        lifecycle.confirm(appointment.id, Actor::Patient(patient_id)).await,
        Err(AppointmentError::Unauthorized(_))
    );
    assert_matches!(
        lifecycle.confirm(Uuid::new_v4(), setup.doctor()).await,
        Err(AppointmentError::NotFound(_))
    );
}

#[tokio::test]
async fn test_patient_cancel_releases_slot() {
    let setup = TestSetup::new().await;
    let patient_id = Uuid::new_v4();
    let appointment = setup.book(patient_id, "12_5_2025", "10:00 AM").await.unwrap();

    assert_matches!(
        setup.state.lifecycle.cancel(appointment.id, Actor::Patient(Uuid::new_v4())).await,
        Err(AppointmentError::Unauthorized(_))
    );

    setup
        .state
        .lifecycle
        .cancel(appointment.id, Actor::Patient(patient_id))
        .await
        .unwrap();
    let calendar = setup.state.slots.calendar(setup.provider.id).await.unwrap();
    assert!(calendar.is_empty());
}

#[tokio::test]
async fn test_racing_confirm_and_cancel_apply_once_each() {
    let setup = Arc::new(TestSetup::new().await);
    let appointment = setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await.unwrap();

    let confirm = {
        let setup = Arc::clone(&setup);
        tokio::spawn(async move { setup.state.lifecycle.confirm(appointment.id, setup.doctor()).await })
    };
    let cancel = {
        let setup = Arc::clone(&setup);
        tokio::spawn(async move { setup.state.lifecycle.cancel(appointment.id, setup.doctor()).await })
    };
    let (confirm, cancel) = (confirm.await.unwrap(), cancel.await.unwrap());

    assert!(cancel.is_ok(), "cancel is legal from both Booked and Confirmed");
    let stored = setup.state.booking.get_appointment(appointment.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Cancelled);
    if confirm.is_err() {
        assert_matches!(confirm, Err(AppointmentError::IllegalTransition { .. }));
    }
}

#[tokio::test]
async fn test_prescription_rules() {
    let setup = TestSetup::new().await;
    let appointment = setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await.unwrap();
    let lifecycle = &setup.state.lifecycle;

    assert_matches!(
        lifecycle.add_prescription(appointment.id, setup.doctor(), "Rest").await,
        Err(AppointmentError::InvalidInput(_))
    );

    lifecycle.confirm(appointment.id, setup.doctor()).await.unwrap();
    let first = lifecycle
        .add_prescription(appointment.id, setup.doctor(), "Paracetamol 500mg")
        .await
        .unwrap();
    assert_eq!(first.prescription.as_deref(), Some("Paracetamol 500mg"));
    assert_eq!(first.status, AppointmentStatus::Confirmed);

    let second = lifecycle
        .add_prescription(appointment.id, setup.doctor(), "Ibuprofen 200mg")
        .await
        .unwrap();
    assert_eq!(second.prescription.as_deref(), Some("Ibuprofen 200mg"));

    assert_matches!(
        lifecycle
            .add_prescription(appointment.id, Actor::Provider(Uuid::new_v4()), "x")
            .await,
        Err(AppointmentError::Unauthorized(_))
    );
}

#[tokio::test]
async fn test_payment_is_taken_from_gateway_order_status() {
    let gateway = Arc::new(FakeGateway::default());
    let setup = TestSetup::with_gateway(Arc::clone(&gateway)).await;
    let patient_id = Uuid::new_v4();
    let appointment = setup.book(patient_id, "12_5_2025", "10:00 AM").await.unwrap();
    let lifecycle = &setup.state.lifecycle;

    gateway.put("order_1", "created", appointment.id);
    let unpaid = lifecycle
        .verify_payment("order_1", Actor::Patient(patient_id))
        .await
        .unwrap();
    assert!(!unpaid.payment);
    let stored = setup.state.store.get_appointment(appointment.id).await.unwrap().unwrap();
    assert!(!stored.payment);

    gateway.put("order_1", "paid", appointment.id);
    let paid = lifecycle
        .verify_payment("order_1", Actor::Patient(patient_id))
        .await
        .unwrap();
    assert!(paid.payment);
    assert_eq!(paid.status, AppointmentStatus::Booked);
    let stored = setup.state.store.get_appointment(appointment.id).await.unwrap().unwrap();
    assert!(stored.payment);
}

#[tokio::test]
async fn test_payment_verification_rules() {
    let gateway = Arc::new(FakeGateway::default());
    let setup = TestSetup::with_gateway(Arc::clone(&gateway)).await;
    let patient_id = Uuid::new_v4();
    let lifecycle = &setup.state.lifecycle;

    // someone else's paid order cannot be applied
    let theirs = setup.book(Uuid::new_v4(), "12_5_2025", "10:00 AM").await.unwrap();
    gateway.put("order_theirs", "paid", theirs.id);
    assert_matches!(
        lifecycle.verify_payment("order_theirs", Actor::Patient(patient_id)).await,
        Err(AppointmentError::Unauthorized(_))
    );
    assert_matches!(
        lifecycle.verify_payment("order_theirs", setup.doctor()).await,
        Err(AppointmentError::Unauthorized(_))
    );

    let cancelled = setup.book(patient_id, "12_5_2025", "11:00 AM").await.unwrap();
    lifecycle.cancel(cancelled.id, setup.doctor()).await.unwrap();
    gateway.put("order_cancelled", "paid", cancelled.id);
    assert_matches!(
        lifecycle.verify_payment("order_cancelled", Actor::Patient(patient_id)).await,
        Err(AppointmentError::InvalidInput(_))
    );

    assert_matches!(
        lifecycle.verify_payment("order_missing", Actor::Patient(patient_id)).await,
        Err(AppointmentError::NotFound(_))
    );

    let untouched = setup.state.store.get_appointment(theirs.id).await.unwrap().unwrap();
    assert!(!untouched.payment);
}

#[tokio::test]
async fn test_payment_without_gateway_is_refused() {
    let setup = TestSetup::new().await;
    let patient_id = Uuid::new_v4();
    let appointment = setup.book(patient_id, "12_5_2025", "10:00 AM").await.unwrap();

    assert_matches!(
        setup
            .state
            .lifecycle
            .verify_payment("order_1", Actor::Patient(patient_id))
            .await,
        Err(AppointmentError::Gateway(_))
    );
    let stored = setup.state.store.get_appointment(appointment.id).await.unwrap().unwrap();
    assert!(!stored.payment);
}

#[tokio::test]
async fn test_listings() {
    let setup = TestSetup::new().await;
    let patient_id = Uuid::new_v4();
    setup.book(patient_id, "12_5_2025", "10:00 AM").await.unwrap();
    setup.book(patient_id, "13_5_2025", "10:00 AM").await.unwrap();
    setup.book(Uuid::new_v4(), "14_5_2025", "10:00 AM").await.unwrap();

    assert_eq!(setup.state.booking.list_for_patient(patient_id).await.unwrap().len(), 2);

    let for_provider = setup.state.booking.list_for_provider(setup.provider.id).await.unwrap();
    assert_eq!(for_provider.len(), 3);
    assert!(for_provider[0].created_at >= for_provider[2].created_at);
}
