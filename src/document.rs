use crate::types::{AlertError, Result};
use reqwest::Client;
use tracing::debug;

/// Downloads a cost-estimate document and converts it to plain text.
pub struct DocumentExtractor {
    client: Client,
}

impl DocumentExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch the document bytes and extract their text content.
    ///
    /// Failures here are recoverable at the call site: the estimate is
    /// skipped, other estimates and bills continue.
    pub async fn extract_text(&self, document_url: &str) -> Result<String> {
        debug!("downloading document {}", document_url);

        let response = self.client.get(document_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Api(format!(
                "document fetch returned HTTP {status}"
            )));
        }

        let bytes = response.bytes().await?;
        debug!("downloaded {} bytes from {}", bytes.len(), document_url);

        // PDF parsing is CPU work; keep it off the async workers.
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| AlertError::Pdf(format!("extraction task failed: {e}")))?
            .map_err(|e| AlertError::Pdf(e.to_string()))?;

        Ok(text)
    }
}
