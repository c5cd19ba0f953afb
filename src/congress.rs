use crate::dedup::DedupStore;
use crate::types::{AlertError, Bill, BillId, CostEstimateRef, LatestAction, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Client for the legislative data API: the bill-list endpoint and the
/// per-bill detail endpoint that carries the CBO cost-estimate references.
pub struct CongressClient {
    client: Client,
    list_url: String,
    detail_url: String,
    api_key: String,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct BillListResponse {
    #[serde(default)]
    bills: Vec<BillSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BillSummary {
    congress: u32,
    #[serde(rename = "type")]
    bill_type: String,
    number: u32,
    title: String,
    url: String,
    latest_action: LatestAction,
}

impl BillSummary {
    fn id(&self) -> BillId {
        BillId::new(self.congress, self.bill_type.clone(), self.number)
    }

    fn into_bill(self, cost_estimates: Vec<CostEstimateRef>) -> Bill {
        Bill {
            congress: self.congress,
            bill_type: self.bill_type,
            number: self.number,
            title: self.title,
            url: self.url,
            latest_action: self.latest_action,
            cost_estimates,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BillDetailResponse {
    bill: Option<BillDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BillDetail {
    #[serde(default)]
    cbo_cost_estimates: Vec<CostEstimateRef>,
}

impl CongressClient {
    pub fn new(
        client: Client,
        list_url: String,
        detail_url: String,
        api_key: String,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            client,
            list_url,
            detail_url,
            api_key,
            max_retries,
            retry_delay,
        }
    }

    /// Fetch the current bill list and attach cost-estimate references to
    /// every bill the dedup store has not seen.
    ///
    /// A list-query failure is fatal to the cycle and propagates. A detail
    /// failure drops only that bill; it stays unmarked and is retried next
    /// cycle.
    pub async fn fetch_new_bills(&self, dedup: &DedupStore) -> Result<Vec<Bill>> {
        let summaries = self.fetch_bill_list().await?;
        debug!("bill list returned {} bills", summaries.len());

        let mut bills = Vec::new();
        for summary in summaries {
            let id = summary.id();
            if dedup.contains(&id) {
                debug!("skipping already-processed bill {}", id);
                continue;
            }

            match self.fetch_bill_detail(&id).await {
                Ok(cost_estimates) => bills.push(summary.into_bill(cost_estimates)),
                Err(e) => {
                    warn!("dropping bill {} this cycle, detail fetch failed: {}", id, e);
                }
            }
        }

        info!("found {} new bills", bills.len());
        Ok(bills)
    }

    async fn fetch_bill_list(&self) -> Result<Vec<BillSummary>> {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: self.retry_delay,
            initial_interval: self.retry_delay,
            ..Default::default()
        };

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match self.try_fetch_bill_list().await {
                Ok(bills) => return Ok(bills),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!(
                                "bill list fetch attempt {} failed, retrying in {:?}",
                                attempt + 1,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AlertError::Api("bill list fetch failed".to_string())))
    }

    async fn try_fetch_bill_list(&self) -> Result<Vec<BillSummary>> {
        let response = self
            .client
            .get(&self.list_url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Api(format!("bill list returned HTTP {status}")));
        }

        let parsed: BillListResponse = response.json().await?;
        Ok(parsed.bills)
    }

    async fn fetch_bill_detail(&self, id: &BillId) -> Result<Vec<CostEstimateRef>> {
        let url = format!(
            "{}/{}/{}/{}",
            self.detail_url, id.congress, id.bill_type, id.number
        );
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Api(format!(
                "bill detail for {id} returned HTTP {status}"
            )));
        }

        let parsed: BillDetailResponse = response.json().await?;
        // Details without an estimate section are common and fine.
        Ok(parsed
            .bill
            .map(|b| b.cbo_cost_estimates)
            .unwrap_or_default())
    }
}
