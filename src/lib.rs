pub mod alert;
pub mod config;
pub mod congress;
pub mod dedup;
pub mod document;
pub mod interpreter;
pub mod locator;
pub mod mailer;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod types;

pub use alert::AlertDispatcher;
pub use config::{AppConfig, ExtractionConfig, MailConfig, MailerConfig};
pub use congress::CongressClient;
pub use dedup::DedupStore;
pub use document::DocumentExtractor;
pub use interpreter::{CostInterpreter, CostModel, OpenAiCostModel};
pub use locator::EstimateLocator;
pub use mailer::{build_mailer, Mailer, OutboundEmail, ResendMailer, SmtpMailer};
pub use notify::{NotificationChannel, SubscriberDirectory};
pub use pipeline::Pipeline;
pub use types::*;
