pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod store;

pub use models::*;
pub use router::appointment_routes;
pub use services::{GatewayOrder, PaymentGateway, RazorpayGateway};
pub use state::AppointmentState;
pub use store::{AppointmentStore, InMemoryStore, StoreError, SupabaseStore};
