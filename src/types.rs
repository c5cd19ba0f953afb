use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;

/// Composite key identifying a bill across cycles.
///
/// Two bills with the same congress/type/number triple are the same bill,
/// whatever else differs. The canonical string form is what the dedup
/// store persists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BillId {
    pub congress: u32,
    pub bill_type: String,
    pub number: u32,
}

impl BillId {
    pub fn new(congress: u32, bill_type: impl Into<String>, number: u32) -> Self {
        Self {
            congress,
            bill_type: bill_type.into(),
            number,
        }
    }
}

impl fmt::Display for BillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.congress, self.bill_type, self.number)
    }
}

/// A bill as assembled from the list and detail endpoints.
///
/// Immutable once constructed; discarded after one pipeline pass.
#[derive(Debug, Clone)]
pub struct Bill {
    pub congress: u32,
    pub bill_type: String,
    pub number: u32,
    pub title: String,
    pub url: String,
    pub latest_action: LatestAction,
    pub cost_estimates: Vec<CostEstimateRef>,
}

impl Bill {
    pub fn id(&self) -> BillId {
        BillId::new(self.congress, self.bill_type.clone(), self.number)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestAction {
    pub text: String,
    pub action_date: NaiveDate,
}

/// Reference to a cost-estimate HTML page attached to a bill.
#[derive(Debug, Clone, Deserialize)]
pub struct CostEstimateRef {
    pub url: String,
}

/// Outcome of the extraction-service call for one document.
///
/// `billions` is `None` when the response was the no-estimate sentinel,
/// unparsable, or the service itself was unreachable. That is a normal
/// outcome, not an error.
#[derive(Debug, Clone)]
pub struct CostEstimate {
    pub raw: String,
    pub billions: Option<f64>,
}

/// Everything the notification channel needs, assembled before any send.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub bill: Bill,
    pub estimate: CostEstimate,
    pub document_url: String,
}

/// Aggregate result of one broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("PDF extraction error: {0}")]
    Pdf(String),

    #[error("extraction service error: {0}")]
    Extraction(String),

    #[error("mail error: {0}")]
    Mail(String),

    #[error("subscriber directory error: {0}")]
    Subscribers(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AlertError>;
