// libs/reminder-cell/src/services/twilio.rs
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::NotificationError;

/// Twilio Programmable Messaging client.
/// POST {base}/2010-04-01/Accounts/{sid}/Messages.json
pub struct TwilioSmsClient {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    base_url: String,
}

impl TwilioSmsClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_sms_configured() {
            return Err(NotificationError::ChannelNotConfigured("sms"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_phone_number.clone(),
            base_url: config.twilio_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotificationError> {
        let to = to.trim();
        if !is_e164(to) {
            warn!("Refusing to text {:?}: not an E.164 number", to);
            return Err(NotificationError::InvalidRecipient(to.to_string()));
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        debug!("Sending SMS via Twilio to {}", to);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await?;
            error!("Twilio send failed: {} - {}", status, message);
            return Err(NotificationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        info!("SMS sent to {}", to);
        Ok(())
    }
}

/// `+` followed by up to 15 digits.
fn is_e164(number: &str) -> bool {
    match number.strip_prefix('+') {
        Some(digits) => {
            (1..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_e164_validation() {
        assert!(is_e164("+919876543210"));
        assert!(is_e164("+15005550006"));
        assert!(!is_e164("9876543210"));
        assert!(!is_e164("+91 98765 43210"));
        assert!(!is_e164("+"));
        assert!(!is_e164("+1234567890123456"));
    }
}
