use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub mailgun_api_key: String,
    pub mailgun_domain: String,
    pub mailgun_base_url: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub twilio_base_url: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_base_url: String,
    /// Per-request timeout for outbound provider calls (Mailgun, Twilio, Razorpay).
    pub http_timeout_secs: u64,
    /// JSON array of providers loaded into the in-memory store when Supabase
    /// is not configured.
    pub provider_seed_path: Option<String>,
    pub reminder_hour: u32,
    pub reminder_minute: u32,
    /// Offset of the reminder wall clock from UTC. The default matches IST (+05:30).
    pub reminder_utc_offset_minutes: i32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: string_var("SUPABASE_URL"),
            supabase_anon_key: string_var("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: string_var("SUPABASE_JWT_SECRET"),
            mailgun_api_key: string_var("MAILGUN_API_KEY"),
            mailgun_domain: string_var("MAILGUN_DOMAIN"),
            mailgun_base_url: env::var("MAILGUN_BASE_URL")
                .unwrap_or_else(|_| "https://api.mailgun.net".to_string()),
            twilio_account_sid: string_var("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: string_var("TWILIO_AUTH_TOKEN"),
            twilio_phone_number: string_var("TWILIO_PHONE_NUMBER"),
            twilio_base_url: env::var("TWILIO_BASE_URL")
                .unwrap_or_else(|_| "https://api.twilio.com".to_string()),
            razorpay_key_id: string_var("RAZORPAY_KEY_ID"),
            razorpay_key_secret: string_var("RAZORPAY_KEY_SECRET"),
            razorpay_base_url: env::var("RAZORPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
            http_timeout_secs: parsed_var("HTTP_TIMEOUT_SECS", 10),
            provider_seed_path: env::var("PROVIDER_SEED_PATH").ok().filter(|p| !p.is_empty()),
            reminder_hour: parsed_var("REMINDER_HOUR", 8),
            reminder_minute: parsed_var("REMINDER_MINUTE", 0),
            reminder_utc_offset_minutes: parsed_var("REMINDER_UTC_OFFSET_MINUTES", 330),
            port: parsed_var("PORT", 4001),
        };

        if !config.is_configured() {
            warn!("Supabase not configured - falling back to in-memory storage");
        }
        if !config.is_email_configured() {
            warn!("Mailgun not configured - email reminders disabled");
        }
        if !config.is_sms_configured() {
            warn!("Twilio not configured - SMS reminders disabled");
        }
        if !config.is_payment_configured() {
            warn!("Razorpay not configured - payment verification disabled");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.mailgun_api_key.is_empty() && !self.mailgun_domain.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_auth_token.is_empty()
            && !self.twilio_phone_number.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.razorpay_key_id.is_empty() && !self.razorpay_key_secret.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            mailgun_api_key: String::new(),
            mailgun_domain: String::new(),
            mailgun_base_url: "https://api.mailgun.net".to_string(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_phone_number: String::new(),
            twilio_base_url: "https://api.twilio.com".to_string(),
            razorpay_key_id: String::new(),
            razorpay_key_secret: String::new(),
            razorpay_base_url: "https://api.razorpay.com".to_string(),
            http_timeout_secs: 10,
            provider_seed_path: None,
            reminder_hour: 8,
            reminder_minute: 0,
            reminder_utc_offset_minutes: 330,
            port: 4001,
        }
    }
}

fn string_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn parsed_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_unconfigured() {
        let config = AppConfig::default();
        assert!(!config.is_configured());
        assert!(!config.is_email_configured());
        assert!(!config.is_sms_configured());
        assert!(!config.is_payment_configured());
        assert_eq!(config.http_timeout_secs, 10);
        assert_eq!(config.reminder_hour, 8);
        assert_eq!(config.reminder_utc_offset_minutes, 330);
    }

    #[test]
    fn test_channel_checks() {
        let config = AppConfig {
            mailgun_api_key: "key".to_string(),
            mailgun_domain: "mg.example.com".to_string(),
            twilio_account_sid: "AC123".to_string(),
            twilio_auth_token: "token".to_string(),
            ..AppConfig::default()
        };
        assert!(config.is_email_configured());
        assert!(!config.is_sms_configured());
    }
}
