// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use shared_config::AppConfig;

use tracing::warn;

use crate::services::{
    AppointmentBookingService, AppointmentLifecycleService, PaymentGateway, RazorpayGateway,
    SlotStore,
};
use crate::store::AppointmentStore;

/// Services shared by every appointment request. One instance per process so
/// the slot and appointment locks are shared by all handlers.
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AppointmentStore>,
    pub slots: Arc<SlotStore>,
    pub booking: AppointmentBookingService,
    pub lifecycle: AppointmentLifecycleService,
}

impl AppointmentState {
    /// Wires Razorpay in when it is configured; otherwise payment
    /// verification answers with a gateway error.
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn AppointmentStore>) -> Self {
        let gateway = match RazorpayGateway::new(&config) {
            Ok(gateway) => Some(Arc::new(gateway) as Arc<dyn PaymentGateway>),
            Err(e) => {
                warn!("Payment verification disabled: {}", e);
                None
            }
        };
        Self::with_payment_gateway(config, store, gateway)
    }

    pub fn with_payment_gateway(
        config: Arc<AppConfig>,
        store: Arc<dyn AppointmentStore>,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let slots = Arc::new(SlotStore::new(Arc::clone(&store)));
        let mut lifecycle = AppointmentLifecycleService::new(Arc::clone(&store), Arc::clone(&slots));
        if let Some(gateway) = gateway {
            lifecycle = lifecycle.with_payment_gateway(gateway);
        }

        Self {
            config,
            booking: AppointmentBookingService::new(Arc::clone(&store), Arc::clone(&slots)),
            lifecycle,
            store,
            slots,
        }
    }
}
