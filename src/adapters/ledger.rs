use crate::domain::ports::Storage;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const MAX_ENTRIES: usize = 500;

/// Mail message ids whose batch was committed for sending.
///
/// Marking a message read can fail independently of the download; the ledger
/// keeps such a message from being sent twice on the next poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessedLedger {
    #[serde(skip)]
    path: String,
    processed: VecDeque<String>,
}

impl ProcessedLedger {
    pub fn path_for(campaign: &str) -> String {
        format!("state/{}_processed.json", campaign)
    }

    /// Missing state file means an empty ledger.
    pub async fn load<S: Storage>(storage: &S, path: &str) -> Result<Self> {
        let mut ledger = if storage.exists(path).await {
            let bytes = storage.read_file(path).await?;
            serde_json::from_slice::<ProcessedLedger>(&bytes)?
        } else {
            ProcessedLedger::default()
        };
        ledger.path = path.to_string();
        Ok(ledger)
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.processed.iter().any(|id| id == message_id)
    }

    pub fn record(&mut self, message_id: &str) {
        if self.contains(message_id) {
            return;
        }
        self.processed.push_back(message_id.to_string());
        while self.processed.len() > MAX_ENTRIES {
            self.processed.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    pub async fn save<S: Storage>(&self, storage: &S) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        storage.write_file(&self.path, &bytes).await
    }
}
