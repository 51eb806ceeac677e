use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentState};

pub fn create_router(appointments: Arc<AppointmentState>) -> Router {
    Router::new()
        .route("/", get(|| async { "MediConnect API is running!" }))
        .nest("/api/appointments", appointment_routes(appointments))
}
