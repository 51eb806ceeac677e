// libs/reminder-cell/src/services/notifier.rs
use async_trait::async_trait;
use tracing::info;

use shared_config::AppConfig;

use crate::models::NotificationError;
use crate::services::mailgun::MailgunEmailClient;
use crate::services::twilio::TwilioSmsClient;

/// Outbound patient notifications. Each call is one independently
/// retryable delivery attempt.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError>;

    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotificationError>;
}

/// Routes email to Mailgun and SMS to Twilio, whichever are configured.
pub struct ChannelNotifier {
    email: Option<MailgunEmailClient>,
    sms: Option<TwilioSmsClient>,
}

impl ChannelNotifier {
    pub fn new(email: Option<MailgunEmailClient>, sms: Option<TwilioSmsClient>) -> Self {
        Self { email, sms }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let email = MailgunEmailClient::new(config).ok();
        let sms = TwilioSmsClient::new(config).ok();
        info!(
            "Notification channels: email={}, sms={}",
            email.is_some(),
            sms.is_some()
        );
        Self::new(email, sms)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        match &self.email {
            Some(client) => client.send_email(to, subject, body).await,
            None => Err(NotificationError::ChannelNotConfigured("email")),
        }
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotificationError> {
        match &self.sms {
            Some(client) => client.send_sms(to, body).await,
            None => Err(NotificationError::ChannelNotConfigured("sms")),
        }
    }
}
