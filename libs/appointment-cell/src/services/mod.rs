pub mod booking;
pub mod lifecycle;
pub mod locks;
pub mod payments;
pub mod slots;
pub mod symptoms;

pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use payments::{GatewayOrder, PaymentGateway, RazorpayGateway};
pub use slots::{ProviderCalendar, SlotStore};
pub use symptoms::normalize;
