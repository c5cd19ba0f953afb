use crate::types::{BillId, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};

/// Durable set of bill ids that have already been through the pipeline.
///
/// Marks accumulate in memory during a cycle and are persisted by one
/// `commit` at cycle end. The backing file is a JSON array of canonical
/// bill-id strings.
pub struct DedupStore {
    path: PathBuf,
    processed: HashSet<String>,
}

impl DedupStore {
    /// Load persisted state. A missing or unreadable file starts the set
    /// empty; that is informational, not an error.
    pub async fn load(path: PathBuf) -> Self {
        let processed = match tokio::fs::read_to_string(&path).await {
            Ok(data) => match serde_json::from_str::<Vec<String>>(&data) {
                Ok(ids) => ids.into_iter().collect(),
                Err(e) => {
                    info!(
                        "processed-bill state at {} is unreadable ({}), starting fresh",
                        path.display(),
                        e
                    );
                    HashSet::new()
                }
            },
            Err(e) => {
                info!(
                    "no processed-bill state at {} ({}), starting fresh",
                    path.display(),
                    e
                );
                HashSet::new()
            }
        };

        info!("loaded {} processed bill ids", processed.len());
        Self { path, processed }
    }

    pub fn contains(&self, id: &BillId) -> bool {
        self.processed.contains(&id.to_string())
    }

    /// In-memory only; durable after the next `commit`.
    pub fn mark_processed(&mut self, id: &BillId) {
        self.processed.insert(id.to_string());
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    /// Persist the full current set, replacing prior content. Called once
    /// per cycle to bound write amplification.
    pub async fn commit(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Stable file content across runs.
        let mut ids: Vec<&String> = self.processed.iter().collect();
        ids.sort();

        let data = serde_json::to_vec_pretty(&ids)?;
        tokio::fs::write(&self.path, data).await?;
        debug!(
            "committed {} processed bill ids to {}",
            self.processed.len(),
            self.path.display()
        );
        Ok(())
    }
}
