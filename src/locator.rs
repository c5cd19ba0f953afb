use crate::types::{AlertError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Finds the downloadable document behind a cost-estimate HTML page.
///
/// The page structure is not stable; the only contract is "first anchor
/// whose href mentions .pdf". Everything that can go wrong here is treated
/// as "no document found", never as a cycle error.
pub struct EstimateLocator {
    client: Client,
    document_base_url: String,
}

impl EstimateLocator {
    pub fn new(client: Client, document_base_url: String) -> Self {
        Self {
            client,
            document_base_url,
        }
    }

    /// Fetch the estimate page and return the absolute URL of the first
    /// PDF link in document order, if any.
    pub async fn locate_pdf(&self, estimate_url: &str) -> Option<Url> {
        let html = match self.fetch_page(estimate_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("could not fetch estimate page {}: {}", estimate_url, e);
                return None;
            }
        };

        let href = find_pdf_href(&html)?;
        match resolve_document_url(&self.document_base_url, &href) {
            Ok(url) => {
                debug!("located document {} on {}", url, estimate_url);
                Some(url)
            }
            Err(e) => {
                warn!("unusable document href {:?} on {}: {}", href, estimate_url, e);
                None
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Api(format!(
                "estimate page returned HTTP {status}"
            )));
        }
        Ok(response.text().await?)
    }
}

/// First anchor href containing ".pdf", case-insensitive, document order.
fn find_pdf_href(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let anchor = Selector::parse("a").unwrap();
    doc.select(&anchor)
        .filter_map(|el| el.value().attr("href"))
        .find(|href| href.to_lowercase().contains(".pdf"))
        .map(|href| href.to_string())
}

/// Resolve an href against the fixed document host, normalizing a missing
/// leading slash. Absolute hrefs pass through untouched.
fn resolve_document_url(base: &str, href: &str) -> Result<Url> {
    if href.starts_with("http") {
        return Ok(Url::parse(href)?);
    }
    let joined = if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    };
    Ok(Url::parse(&joined)?)
}
