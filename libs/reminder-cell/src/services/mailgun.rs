// libs/reminder-cell/src/services/mailgun.rs
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::NotificationError;

/// Mailgun messages API client.
/// POST {base}/v3/{domain}/messages
pub struct MailgunEmailClient {
    client: Client,
    api_key: String,
    domain: String,
    base_url: String,
}

impl std::fmt::Debug for MailgunEmailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailgunEmailClient")
            .field("api_key", &"<redacted>")
            .field("domain", &self.domain)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MailgunEmailClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_email_configured() {
            return Err(NotificationError::ChannelNotConfigured("email"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.mailgun_api_key.clone(),
            domain: config.mailgun_domain.clone(),
            base_url: config.mailgun_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn send_email(&self, to: &str, subject: &str, text: &str) -> Result<(), NotificationError> {
        let to = to.trim();
        if to.is_empty() || !to.contains('@') {
            return Err(NotificationError::InvalidRecipient(to.to_string()));
        }

        let url = format!("{}/v3/{}/messages", self.base_url, self.domain);
        let from = format!("MediConnect <mailgun@{}>", self.domain);
        debug!("Sending email via Mailgun to {}", to);

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", from.as_str()),
                ("to", to),
                ("subject", subject),
                ("text", text),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await?;
            error!("Mailgun send failed: {} - {}", status, message);
            return Err(NotificationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        info!("Email sent to {}", to);
        Ok(())
    }
}
