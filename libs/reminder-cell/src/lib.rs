pub mod models;
pub mod services;

pub use models::*;
pub use services::{ChannelNotifier, MailgunEmailClient, Notifier, ReminderScheduler, TwilioSmsClient};
