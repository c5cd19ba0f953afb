use crate::config::MailerConfig;
use crate::types::{AlertError, Result};
use async_trait::async_trait;
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const RESEND_BASE_URL: &str = "https://api.resend.com";
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// One outbound alert message, fully rendered.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub tags: Vec<(String, String)>,
}

/// Single send contract over whichever delivery backend is configured.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}

/// Build the configured mailer.
pub fn build_mailer(config: &MailerConfig) -> Result<Arc<dyn Mailer>> {
    match config {
        MailerConfig::Smtp {
            host,
            username,
            password,
        } => Ok(Arc::new(SmtpMailer::new(
            host,
            username.clone(),
            password.clone(),
        )?)),
        MailerConfig::Resend { api_key } => {
            Ok(Arc::new(ResendMailer::new(api_key.clone(), None)?))
        }
    }
}

/// SMTP relay delivery.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(host: &str, username: String, password: String) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| AlertError::Mail(format!("SMTP relay setup failed: {e}")))?
            .credentials(Credentials::new(username, password))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn provider_name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let message = Message::builder()
            .from(
                email
                    .from
                    .parse()
                    .map_err(|e| AlertError::Mail(format!("invalid from address: {e}")))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|e| AlertError::Mail(format!("invalid recipient address: {e}")))?)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| AlertError::Mail(format!("message build failed: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AlertError::Mail(e.to_string()))?;
        Ok(())
    }
}

/// Provider-API delivery (Resend-style JSON endpoint).
pub struct ResendMailer {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<ResendTag<'a>>,
}

#[derive(Serialize)]
struct ResendTag<'a> {
    name: &'a str,
    value: &'a str,
}

impl ResendMailer {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(PROVIDER_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| RESEND_BASE_URL.to_string()),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    fn provider_name(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let request = ResendRequest {
            from: &email.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
            tags: email
                .tags
                .iter()
                .map(|(name, value)| ResendTag { name, value })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::Mail(format!(
                "provider returned HTTP {status}: {body}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_email() -> OutboundEmail {
        OutboundEmail {
            from: "Congressional Bills Alert <alerts@example.test>".to_string(),
            to: "subscriber@example.test".to_string(),
            subject: "High Cost Bill Alert: HR1234".to_string(),
            html: "<h2>High Cost Bill Alert</h2>".to_string(),
            text: "High Cost Bill Alert".to_string(),
            tags: vec![("bill".to_string(), "118-HR-1234".to_string())],
        }
    }

    #[tokio::test]
    async fn provider_mailer_posts_the_full_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("Authorization", "Bearer re-test"))
            .and(body_partial_json(serde_json::json!({
                "to": ["subscriber@example.test"],
                "subject": "High Cost Bill Alert: HR1234",
                "tags": [{ "name": "bill", "value": "118-HR-1234" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = ResendMailer::new("re-test".to_string(), Some(server.uri())).unwrap();
        mailer.send(&sample_email()).await.unwrap();
    }

    #[tokio::test]
    async fn provider_rejection_surfaces_as_a_mail_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid from"))
            .mount(&server)
            .await;

        let mailer = ResendMailer::new("re-test".to_string(), Some(server.uri())).unwrap();
        let result = mailer.send(&sample_email()).await;
        assert!(matches!(result, Err(AlertError::Mail(_))));
    }
}
