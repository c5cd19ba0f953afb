use async_trait::async_trait;
use bill_cost_alert::interpreter::{CostModel, OpenAiCostModel};
use bill_cost_alert::mailer::{Mailer, OutboundEmail};
use bill_cost_alert::{
    AppConfig, DedupStore, ExtractionConfig, MailConfig, MailerConfig, Pipeline,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Captures every outbound email instead of delivering it.
struct RecordingMailer {
    sent: StdMutex<Vec<OutboundEmail>>,
}

impl RecordingMailer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: StdMutex::new(Vec::new()),
        })
    }

    fn emails(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn provider_name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, email: &OutboundEmail) -> bill_cost_alert::Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Assemble a one-page PDF whose only content is `text`, with a correct
/// cross-reference table so the extractor accepts it.
fn minimal_pdf(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    pdf.push_str("0000000000 65535 f \n");
    for offset in &offsets {
        pdf.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    pdf.into_bytes()
}

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bill-cost-alert-e2e-{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn test_config(server: &MockServer, dir: &Path) -> AppConfig {
    AppConfig {
        congress_api_key: "test-key".to_string(),
        bill_list_url: format!("{}/v3/bill", server.uri()),
        bill_detail_url: format!("{}/v3/bill", server.uri()),
        document_base_url: server.uri(),
        extraction: ExtractionConfig {
            api_key: "sk-test".to_string(),
            base_url: server.uri(),
            model: "openai/gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(10),
        },
        mail: MailConfig {
            from_name: "Congressional Bills Alert".to_string(),
            from_address: "alerts@example.test".to_string(),
            provider: MailerConfig::Resend {
                api_key: "unused-in-tests".to_string(),
            },
        },
        subscribers_path: dir.join("subscribers.json"),
        processed_path: dir.join("processed_bills.json"),
        threshold_billions: 0.1,
        cycle_interval: Duration::from_secs(60 * 60 * 24),
        bill_concurrency: 4,
        send_concurrency: 2,
        request_timeout: Duration::from_secs(10),
        max_retries: 0,
        retry_delay: Duration::from_millis(10),
    }
}

fn bill_summary(congress: u64, bill_type: &str, number: u64, title: &str) -> serde_json::Value {
    json!({
        "congress": congress,
        "type": bill_type,
        "number": number,
        "title": title,
        "url": format!("https://api.congress.gov/v3/bill/{congress}/{}/{number}?format=json", bill_type.to_lowercase()),
        "latestAction": {
            "text": "Passed the House",
            "actionDate": "2026-02-03"
        }
    })
}

#[tokio::test]
async fn alertable_bill_reaches_every_subscriber_and_is_committed() {
    let server = MockServer::start().await;
    let dir = test_dir("full-cycle");
    std::fs::write(
        dir.join("subscribers.json"),
        json!({ "subscribers": ["one@example.test", "two@example.test"] }).to_string(),
    )
    .unwrap();

    // Bill list: one alertable bill, one whose estimate page has no PDF.
    Mock::given(method("GET"))
        .and(path("/v3/bill"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bills": [
                bill_summary(118, "HR", 1234, "Infrastructure Modernization Act"),
                bill_summary(118, "S", 55, "No Document Act"),
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/bill/118/HR/1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bill": { "cboCostEstimates": [ { "url": format!("{}/estimate/hr1234", server.uri()) } ] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/bill/118/S/55"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bill": { "cboCostEstimates": [ { "url": format!("{}/estimate/s55", server.uri()) } ] }
        })))
        .mount(&server)
        .await;

    // Estimate pages: one links a relative PDF, the other has no PDF link.
    Mock::given(method("GET"))
        .and(path("/estimate/hr1234"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><a href="/about">About</a><a href="/report.pdf">Report</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/estimate/s55"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><body><a href="/summary.html">Summary</a></body></html>"#),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(minimal_pdf("The bill would cost $2.5 billion over ten years."), "application/pdf"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "content": "2.5" } } ]
        })))
        .mount(&server)
        .await;

    let config = test_config(&server, &dir);
    let mailer = RecordingMailer::new();
    let model: Arc<dyn CostModel> = Arc::new(OpenAiCostModel::new(&config.extraction).unwrap());
    let dedup = Arc::new(Mutex::new(
        DedupStore::load(config.processed_path.clone()).await,
    ));
    let pipeline = Pipeline::new(&config, model, mailer.clone(), dedup).unwrap();

    pipeline.run_cycle().await.unwrap();

    // Both subscribers got the one alert; the no-document bill sent nothing.
    let emails = mailer.emails();
    assert_eq!(emails.len(), 2);
    let mut recipients: Vec<&str> = emails.iter().map(|e| e.to.as_str()).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["one@example.test", "two@example.test"]);
    for email in &emails {
        assert_eq!(email.subject, "High Cost Bill Alert: HR1234");
        assert!(email.html.contains("Infrastructure Modernization Act"));
        assert!(email.html.contains("$2.5 billion"));
        assert!(email.html.contains(&format!("{}/report.pdf", server.uri())));
        assert!(email
            .html
            .contains("https://www.congress.gov/bill/118th-congress/hr/1234"));
    }

    // Both bills reached a terminal state and were committed.
    let committed = std::fs::read_to_string(dir.join("processed_bills.json")).unwrap();
    let ids: Vec<String> = serde_json::from_str(&committed).unwrap();
    assert!(ids.contains(&"118-HR-1234".to_string()));
    assert!(ids.contains(&"118-S-55".to_string()));

    // A second cycle over unchanged upstream data alerts nobody.
    pipeline.run_cycle().await.unwrap();
    assert_eq!(mailer.emails().len(), 2);
}

#[tokio::test]
async fn list_failure_aborts_the_cycle_without_committing() {
    let server = MockServer::start().await;
    let dir = test_dir("list-failure");
    std::fs::write(
        dir.join("subscribers.json"),
        json!({ "subscribers": ["one@example.test"] }).to_string(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/v3/bill"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = test_config(&server, &dir);
    let mailer = RecordingMailer::new();
    let model: Arc<dyn CostModel> = Arc::new(OpenAiCostModel::new(&config.extraction).unwrap());
    let dedup = Arc::new(Mutex::new(
        DedupStore::load(config.processed_path.clone()).await,
    ));
    let pipeline = Pipeline::new(&config, model, mailer.clone(), dedup).unwrap();

    assert!(pipeline.run_cycle().await.is_err());
    assert!(mailer.emails().is_empty());
    assert!(!dir.join("processed_bills.json").exists());
}

#[tokio::test]
async fn sentinel_extraction_response_does_not_alert_but_still_marks() {
    let server = MockServer::start().await;
    let dir = test_dir("sentinel");
    std::fs::write(
        dir.join("subscribers.json"),
        json!({ "subscribers": ["one@example.test"] }).to_string(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/v3/bill"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bills": [ bill_summary(118, "HR", 77, "Ambiguous Cost Act") ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/bill/118/HR/77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bill": { "cboCostEstimates": [ { "url": format!("{}/estimate/hr77", server.uri()) } ] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/estimate/hr77"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<a href="/report.pdf">Report</a>"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(minimal_pdf("Qualitative discussion only."), "application/pdf"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "content": "No clear cost estimate found." } } ]
        })))
        .mount(&server)
        .await;

    let config = test_config(&server, &dir);
    let mailer = RecordingMailer::new();
    let model: Arc<dyn CostModel> = Arc::new(OpenAiCostModel::new(&config.extraction).unwrap());
    let dedup = Arc::new(Mutex::new(
        DedupStore::load(config.processed_path.clone()).await,
    ));
    let pipeline = Pipeline::new(&config, model, mailer.clone(), dedup).unwrap();

    pipeline.run_cycle().await.unwrap();

    assert!(mailer.emails().is_empty());
    let committed = std::fs::read_to_string(dir.join("processed_bills.json")).unwrap();
    let ids: Vec<String> = serde_json::from_str(&committed).unwrap();
    assert_eq!(ids, vec!["118-HR-77".to_string()]);
}
