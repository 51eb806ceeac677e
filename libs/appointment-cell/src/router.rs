// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentState;

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // All appointment operations require authentication
    Router::new()
        // Patient side
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::list_my_appointments))
        .route("/{appointment_id}/patient-cancel", post(handlers::patient_cancel_appointment))
        .route("/payment/verify", post(handlers::verify_payment))
        // Doctor side
        .route("/doctor", get(handlers::list_doctor_appointments))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/prescription", post(handlers::add_prescription))
        // Provider calendars
        .route("/providers/availability", post(handlers::set_availability))
        .route("/providers/{provider_id}/calendar", get(handlers::get_provider_calendar))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ))
        .with_state(state)
}
