// libs/appointment-cell/src/services/payments.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::AppointmentError;

/// Order as the gateway reports it. `receipt` carries the appointment id the
/// order was created for.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

impl GatewayOrder {
    pub fn is_paid(&self) -> bool {
        self.status == "paid"
    }
}

/// Server-side lookup of a checkout order. Payment state is only ever taken
/// from here, never from the client.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, AppointmentError>;
}

/// Razorpay orders API.
/// GET {base}/v1/orders/{order_id}
pub struct RazorpayGateway {
    client: Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl std::fmt::Debug for RazorpayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayGateway")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RazorpayGateway {
    pub fn new(config: &AppConfig) -> Result<Self, AppointmentError> {
        if !config.is_payment_configured() {
            return Err(AppointmentError::Gateway(
                "Payment gateway not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| AppointmentError::Gateway(e.to_string()))?;

        Ok(Self {
            client,
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
            base_url: config.razorpay_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, AppointmentError> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(AppointmentError::InvalidInput("Order id is required.".to_string()));
        }

        let url = format!(
            "{}/v1/orders/{}",
            self.base_url,
            urlencoding::encode(order_id)
        );
        debug!("Fetching Razorpay order {}", order_id);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| AppointmentError::Gateway(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::BAD_REQUEST {
            return Err(AppointmentError::NotFound(format!("Order {} not found", order_id)));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Razorpay order lookup failed: {} - {}", status, message);
            return Err(AppointmentError::Gateway(format!("{}: {}", status, message)));
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| AppointmentError::Gateway(e.to_string()))
    }
}
