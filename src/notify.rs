use crate::mailer::{Mailer, OutboundEmail};
use crate::types::{AlertError, AlertEvent, Bill, BroadcastOutcome, CostEstimate, Result};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Read-only view of the subscriber list maintained by the subscription
/// subsystem. The core only takes a snapshot per broadcast.
pub struct SubscriberDirectory {
    path: PathBuf,
}

#[derive(Deserialize)]
struct SubscriberFile {
    subscribers: Vec<String>,
}

impl SubscriberDirectory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn snapshot(&self) -> Result<Vec<String>> {
        let data = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AlertError::Subscribers(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let parsed: SubscriberFile = serde_json::from_str(&data).map_err(|e| {
            AlertError::Subscribers(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        Ok(parsed.subscribers)
    }
}

/// Renders and delivers one alert to every subscriber, independently.
pub struct NotificationChannel {
    directory: SubscriberDirectory,
    mailer: Arc<dyn Mailer>,
    from: String,
    send_concurrency: usize,
}

impl NotificationChannel {
    pub fn new(
        directory: SubscriberDirectory,
        mailer: Arc<dyn Mailer>,
        from: String,
        send_concurrency: usize,
    ) -> Self {
        Self {
            directory,
            mailer,
            from,
            send_concurrency,
        }
    }

    /// Send the alert to every subscriber in the current snapshot.
    ///
    /// A single subscriber failing does not stop the rest; an unreadable
    /// subscriber list aborts the whole broadcast as one error.
    pub async fn broadcast(&self, event: &AlertEvent) -> Result<BroadcastOutcome> {
        let subscribers = self.directory.snapshot().await?;
        if subscribers.is_empty() {
            info!("no subscribers on file, nothing to send");
            return Ok(BroadcastOutcome { sent: 0, failed: 0 });
        }

        let subject = format!(
            "High Cost Bill Alert: {}{}",
            event.bill.bill_type, event.bill.number
        );
        let html = render_html(event);
        let text = render_text(event);
        let bill_id = event.bill.id().to_string();

        let results = stream::iter(subscribers.into_iter().map(|to| {
            let mailer = Arc::clone(&self.mailer);
            let email = OutboundEmail {
                from: self.from.clone(),
                to: to.clone(),
                subject: subject.clone(),
                html: html.clone(),
                text: text.clone(),
                tags: vec![("bill".to_string(), bill_id.clone())],
            };
            async move {
                match mailer.send(&email).await {
                    Ok(()) => {
                        info!("alert email sent to {}", to);
                        true
                    }
                    Err(e) => {
                        error!("failed to send alert to {}: {}", to, e);
                        false
                    }
                }
            }
        }))
        .buffer_unordered(self.send_concurrency)
        .collect::<Vec<bool>>()
        .await;

        let sent = results.iter().filter(|ok| **ok).count();
        let outcome = BroadcastOutcome {
            sent,
            failed: results.len() - sent,
        };
        info!(
            "broadcast for {} complete: {} sent, {} failed",
            bill_id, outcome.sent, outcome.failed
        );
        Ok(outcome)
    }
}

/// Public bill page on congress.gov.
fn bill_page_url(bill: &Bill) -> String {
    format!(
        "https://www.congress.gov/bill/{}th-congress/{}/{}",
        bill.congress,
        bill.bill_type.to_lowercase(),
        bill.number
    )
}

fn format_cost(estimate: &CostEstimate) -> String {
    match estimate.billions {
        Some(value) => format!("${value} billion"),
        None => estimate.raw.clone(),
    }
}

fn render_html(event: &AlertEvent) -> String {
    let bill = &event.bill;
    format!(
        "<h2>High Cost Bill Alert</h2>\n\
         <p><strong>Bill Title:</strong> {title}</p>\n\
         <p><strong>Bill Number:</strong> {bill_type}{number}</p>\n\
         <p><strong>Congress:</strong> {congress}</p>\n\
         <p><strong>Estimated Cost:</strong> {cost}</p>\n\
         <p><strong>Latest Action:</strong> {action} ({date})</p>\n\
         <p><strong>CBO Report:</strong> <a href=\"{document}\">Download PDF</a></p>\n\
         <p><strong>Bill Details:</strong> <a href=\"{page}\">View on Congress.gov</a></p>\n",
        title = bill.title,
        bill_type = bill.bill_type,
        number = bill.number,
        congress = bill.congress,
        cost = format_cost(&event.estimate),
        action = bill.latest_action.text,
        date = bill.latest_action.action_date,
        document = event.document_url,
        page = bill_page_url(bill),
    )
}

fn render_text(event: &AlertEvent) -> String {
    let bill = &event.bill;
    format!(
        "High Cost Bill Alert\n\n\
         Bill Title: {title}\n\
         Bill Number: {bill_type}{number}\n\
         Congress: {congress}\n\
         Estimated Cost: {cost}\n\
         Latest Action: {action} ({date})\n\
         CBO Report: {document}\n\
         Bill Details: {page}\n",
        title = bill.title,
        bill_type = bill.bill_type,
        number = bill.number,
        congress = bill.congress,
        cost = format_cost(&event.estimate),
        action = bill.latest_action.text,
        date = bill.latest_action.action_date,
        document = event.document_url,
        page = bill_page_url(bill),
    )
}
