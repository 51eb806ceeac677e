// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Actor, AppointmentError, AvailabilityRequest, BookAppointmentRequest, PatientContact,
    PrescriptionRequest, VerifyPaymentRequest,
};
use crate::state::AppointmentState;

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::InvalidInput(msg) => AppError::ValidationError(msg),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::NotFound(msg) => AppError::NotFound(msg),
            AppointmentError::Unavailable(msg) => AppError::Conflict(msg),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            e @ AppointmentError::IllegalTransition { .. } => AppError::Conflict(e.to_string()),
            AppointmentError::Database(msg) => AppError::Database(msg),
            AppointmentError::Gateway(msg) => AppError::Internal(msg),
        }
    }
}

fn principal_id(user: &User) -> Result<Uuid, AppError> {
    user.user_id()
        .ok_or_else(|| AppError::Auth("Token subject is not a valid user id".to_string()))
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = principal_id(&user)?;
    let patient = PatientContact {
        name: user.display_name(),
        email: user.email.clone(),
        phone: user.phone.clone(),
    };

    let appointment = state
        .booking
        .book_appointment(patient_id, patient, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment Booked Successfully. Awaiting doctor confirmation.",
        "appointment": appointment
    })))
}

pub async fn list_my_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.booking.list_for_patient(principal_id(&user)?).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

pub async fn patient_cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::Patient(principal_id(&user)?);
    let appointment = state.lifecycle.cancel(appointment_id, actor).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment Cancelled",
        "appointment": appointment
    })))
}

pub async fn verify_payment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::Patient(principal_id(&user)?);
    let appointment = state
        .lifecycle
        .verify_payment(&request.order_id, actor)
        .await?;

    Ok(Json(json!({
        "success": appointment.payment,
        "message": if appointment.payment { "Payment Successful" } else { "Payment Failed" },
        "appointment": appointment
    })))
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

pub async fn list_doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.booking.list_for_provider(principal_id(&user)?).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

pub async fn confirm_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::Provider(principal_id(&user)?);
    let appointment = state.lifecycle.confirm(appointment_id, actor).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment Confirmed",
        "appointment": appointment
    })))
}

pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::Provider(principal_id(&user)?);
    let appointment = state.lifecycle.complete(appointment_id, actor).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment Completed",
        "appointment": appointment
    })))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::Provider(principal_id(&user)?);
    let appointment = state.lifecycle.cancel(appointment_id, actor).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment Cancelled",
        "appointment": appointment
    })))
}

pub async fn add_prescription(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<PrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::Provider(principal_id(&user)?);
    let appointment = state
        .lifecycle
        .add_prescription(appointment_id, actor, &request.prescription)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Prescription Added",
        "appointment": appointment
    })))
}

pub async fn set_availability(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let provider = state
        .slots
        .set_availability(principal_id(&user)?, request.available)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Availability Changed",
        "provider": provider
    })))
}

pub async fn get_provider_calendar(
    State(state): State<Arc<AppointmentState>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let calendar = state.slots.calendar(provider_id).await?;

    Ok(Json(json!({
        "success": true,
        "provider_id": provider_id,
        "slots_booked": calendar
    })))
}
