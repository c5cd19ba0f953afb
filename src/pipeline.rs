use crate::alert::AlertDispatcher;
use crate::config::AppConfig;
use crate::congress::CongressClient;
use crate::dedup::DedupStore;
use crate::document::DocumentExtractor;
use crate::interpreter::{CostInterpreter, CostModel};
use crate::locator::EstimateLocator;
use crate::mailer::Mailer;
use crate::notify::{NotificationChannel, SubscriberDirectory};
use crate::types::{Bill, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const USER_AGENT: &str = concat!("bill-cost-alert/", env!("CARGO_PKG_VERSION"));

/// The bill-cost-alert pipeline: one `run_cycle` walks every new bill
/// through locate -> extract -> interpret -> evaluate, marks it processed,
/// and commits the dedup set once at the end.
pub struct Pipeline {
    congress: CongressClient,
    locator: EstimateLocator,
    extractor: DocumentExtractor,
    interpreter: CostInterpreter,
    dispatcher: AlertDispatcher,
    dedup: Arc<Mutex<DedupStore>>,
    bill_concurrency: usize,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        model: Arc<dyn CostModel>,
        mailer: Arc<dyn Mailer>,
        dedup: Arc<Mutex<DedupStore>>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;

        let congress = CongressClient::new(
            client.clone(),
            config.bill_list_url.clone(),
            config.bill_detail_url.clone(),
            config.congress_api_key.clone(),
            config.max_retries,
            config.retry_delay,
        );
        let locator = EstimateLocator::new(client.clone(), config.document_base_url.clone());
        let extractor = DocumentExtractor::new(client);
        let interpreter = CostInterpreter::new(model);
        let channel = NotificationChannel::new(
            SubscriberDirectory::new(config.subscribers_path.clone()),
            mailer,
            config.mail.from_mailbox(),
            config.send_concurrency,
        );
        let dispatcher = AlertDispatcher::new(config.threshold_billions, channel);

        Ok(Self {
            congress,
            locator,
            extractor,
            interpreter,
            dispatcher,
            dedup,
            bill_concurrency: config.bill_concurrency,
        })
    }

    /// Run one full cycle.
    ///
    /// Only a bill-list failure aborts the cycle (and skips the commit);
    /// everything downstream is contained to one estimate, one bill, or
    /// one subscriber.
    pub async fn run_cycle(&self) -> Result<()> {
        let bills = {
            let dedup = self.dedup.lock().await;
            self.congress.fetch_new_bills(&dedup).await?
        };

        if bills.is_empty() {
            info!("no new bills this cycle");
        } else {
            info!("processing {} new bills", bills.len());
        }
        let processed = bills.len();

        stream::iter(bills)
            .for_each_concurrent(self.bill_concurrency, |bill| async move {
                let id = bill.id();
                self.process_bill(&bill).await;
                self.dedup.lock().await.mark_processed(&id);
            })
            .await;

        let dedup = self.dedup.lock().await;
        if let Err(e) = dedup.commit().await {
            error!(
                "failed to persist processed bills, marks will be retried next cycle: {}",
                e
            );
            return Err(e);
        }

        info!("cycle complete, {} bills processed", processed);
        Ok(())
    }

    async fn process_bill(&self, bill: &Bill) {
        debug!(
            "processing bill {} with {} cost estimate(s)",
            bill.id(),
            bill.cost_estimates.len()
        );
        for estimate_ref in &bill.cost_estimates {
            self.process_estimate(bill, &estimate_ref.url).await;
        }
    }

    async fn process_estimate(&self, bill: &Bill, estimate_url: &str) {
        let document_url = match self.locator.locate_pdf(estimate_url).await {
            Some(url) => url,
            None => {
                debug!("no document found for {} at {}", bill.id(), estimate_url);
                return;
            }
        };

        let text = match self.extractor.extract_text(document_url.as_str()).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "skipping estimate {} for {}: {}",
                    document_url,
                    bill.id(),
                    e
                );
                return;
            }
        };

        let estimate = self.interpreter.interpret(&text).await;
        self.dispatcher
            .evaluate(bill, &estimate, document_url.as_str())
            .await;
    }
}
