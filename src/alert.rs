use crate::notify::NotificationChannel;
use crate::types::{AlertEvent, Bill, CostEstimate};
use tracing::{debug, error, info};

/// Applies the alert threshold and hands alertable bills to the
/// notification channel. Never touches the dedup store.
pub struct AlertDispatcher {
    threshold_billions: f64,
    channel: NotificationChannel,
}

impl AlertDispatcher {
    pub fn new(threshold_billions: f64, channel: NotificationChannel) -> Self {
        Self {
            threshold_billions,
            channel,
        }
    }

    pub async fn evaluate(&self, bill: &Bill, estimate: &CostEstimate, document_url: &str) {
        if !is_alertable(estimate.billions, self.threshold_billions) {
            debug!(
                "bill {} not alertable (cost {:?}, threshold {})",
                bill.id(),
                estimate.billions,
                self.threshold_billions
            );
            return;
        }

        info!(
            "bill {} exceeds {} billion threshold, alerting",
            bill.id(),
            self.threshold_billions
        );
        let event = AlertEvent {
            bill: bill.clone(),
            estimate: estimate.clone(),
            document_url: document_url.to_string(),
        };
        match self.channel.broadcast(&event).await {
            Ok(outcome) => info!(
                "alert for {} delivered: {} sent, {} failed",
                event.bill.id(),
                outcome.sent,
                outcome.failed
            ),
            Err(e) => error!("broadcast for {} aborted: {}", event.bill.id(), e),
        }
    }
}

/// Alertable iff the cost is a valid number strictly above the threshold.
pub fn is_alertable(billions: Option<f64>, threshold: f64) -> bool {
    matches!(billions, Some(value) if value > threshold)
}
