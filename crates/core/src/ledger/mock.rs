use std::sync::Mutex;

use async_trait::async_trait;

use super::{LedgerOps, ProgressRecord};
use crate::Result;

/// In-memory ledger for tests; keeps the full commit history so
/// scenarios can assert on intermediate records.
pub struct MemoryLedger {
    record: Mutex<ProgressRecord>,
    commits: Mutex<Vec<ProgressRecord>>,
}

impl MemoryLedger {
    pub fn new(record: ProgressRecord) -> Self {
        Self {
            record: Mutex::new(record),
            commits: Mutex::new(vec![]),
        }
    }

    pub fn commits(&self) -> Vec<ProgressRecord> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerOps for MemoryLedger {
    async fn load(&self) -> Result<ProgressRecord> {
        Ok(self.record.lock().unwrap().clone())
    }

    async fn commit(&self, record: &ProgressRecord) -> Result<()> {
        *self.record.lock().unwrap() = record.clone();
        self.commits.lock().unwrap().push(record.clone());
        Ok(())
    }
}
