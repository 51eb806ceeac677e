pub mod mailgun;
pub mod notifier;
pub mod scheduler;
pub mod twilio;

pub use mailgun::MailgunEmailClient;
pub use notifier::{ChannelNotifier, Notifier};
pub use scheduler::ReminderScheduler;
pub use twilio::TwilioSmsClient;
