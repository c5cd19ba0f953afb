use crate::types::{AlertError, Result};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BILL_LIST_URL: &str = "https://api.congress.gov/v3/bill";
const DEFAULT_BILL_DETAIL_URL: &str = "https://api.congress.gov/v3/bill";
const DEFAULT_DOCUMENT_BASE_URL: &str = "https://www.cbo.gov";
const DEFAULT_EXTRACTION_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_EXTRACTION_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_FROM_NAME: &str = "Congressional Bills Alert";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SUBSCRIBERS_PATH: &str = "data/subscribers.json";
const DEFAULT_PROCESSED_PATH: &str = "data/processed_bills.json";

/// Runtime configuration, read once at startup.
///
/// Secrets are never defaulted: a missing key is a fatal configuration
/// error rather than a silently-used fallback.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub congress_api_key: String,
    pub bill_list_url: String,
    pub bill_detail_url: String,
    pub document_base_url: String,
    pub extraction: ExtractionConfig,
    pub mail: MailConfig,
    pub subscribers_path: PathBuf,
    pub processed_path: PathBuf,
    pub threshold_billions: f64,
    pub cycle_interval: Duration,
    pub bill_concurrency: usize,
    pub send_concurrency: usize,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// Extraction-service (chat completion) settings.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from_name: String,
    pub from_address: String,
    pub provider: MailerConfig,
}

impl MailConfig {
    /// RFC 5322 mailbox used as the From header on every alert.
    pub fn from_mailbox(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_address)
    }
}

/// Which delivery backend to use, with its credentials.
#[derive(Debug, Clone)]
pub enum MailerConfig {
    Smtp {
        host: String,
        username: String,
        password: String,
    },
    Resend {
        api_key: String,
    },
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mail_provider = var_or("MAIL_PROVIDER", "smtp");
        let provider = match mail_provider.as_str() {
            "smtp" => MailerConfig::Smtp {
                host: var_or("SMTP_HOST", DEFAULT_SMTP_HOST),
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
            },
            "resend" => MailerConfig::Resend {
                api_key: required("RESEND_API_KEY")?,
            },
            other => {
                return Err(AlertError::Config(format!(
                    "MAIL_PROVIDER must be 'smtp' or 'resend', got '{other}'"
                )))
            }
        };

        Ok(Self {
            congress_api_key: required("CONGRESS_API_KEY")?,
            bill_list_url: var_or("BILL_LIST_URL", DEFAULT_BILL_LIST_URL),
            bill_detail_url: var_or("BILL_DETAIL_URL", DEFAULT_BILL_DETAIL_URL),
            document_base_url: var_or("DOCUMENT_BASE_URL", DEFAULT_DOCUMENT_BASE_URL),
            extraction: ExtractionConfig {
                api_key: required("OPENAI_API_KEY")?,
                base_url: var_or("EXTRACTION_BASE_URL", DEFAULT_EXTRACTION_BASE_URL),
                model: var_or("EXTRACTION_MODEL", DEFAULT_EXTRACTION_MODEL),
                timeout: Duration::from_secs(parsed_or("EXTRACTION_TIMEOUT_SECS", 60u64)?),
            },
            mail: MailConfig {
                from_name: var_or("ALERT_FROM_NAME", DEFAULT_FROM_NAME),
                from_address: required("ALERT_FROM_ADDRESS")?,
                provider,
            },
            subscribers_path: PathBuf::from(var_or("SUBSCRIBERS_PATH", DEFAULT_SUBSCRIBERS_PATH)),
            processed_path: PathBuf::from(var_or("PROCESSED_BILLS_PATH", DEFAULT_PROCESSED_PATH)),
            threshold_billions: parsed_or("ALERT_THRESHOLD_BILLIONS", 0.1f64)?,
            cycle_interval: Duration::from_secs(
                parsed_or("CYCLE_INTERVAL_HOURS", 24u64)? * 60 * 60,
            ),
            bill_concurrency: parsed_or("BILL_CONCURRENCY", 4usize)?,
            send_concurrency: parsed_or("SEND_CONCURRENCY", 4usize)?,
            request_timeout: Duration::from_secs(parsed_or("REQUEST_TIMEOUT_SECS", 30u64)?),
            max_retries: parsed_or("MAX_RETRIES", 2u32)?,
            retry_delay: Duration::from_secs(parsed_or("RETRY_DELAY_SECS", 5u64)?),
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| AlertError::Config(format!("{name} is not set")))
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| AlertError::Config(format!("invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
