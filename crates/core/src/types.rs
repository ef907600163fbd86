use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};

use crate::workload::DeploymentTarget;

/// One unit of work inside a batch.
#[derive(Debug, Clone)]
pub enum WorkItem {
    Deploy(DeploymentTarget),
    /// Existence-only funding of an auxiliary account.
    Fund { to: Address, amount: U256 },
}

/// An ordered group of work items holding a contiguous nonce range
/// `[first_nonce, first_nonce + items.len())`. The atomic unit of
/// "fire, then wait".
#[derive(Debug, Clone)]
pub struct Batch {
    pub first_nonce: u64,
    pub per_item_gas: u64,
    pub items: Vec<WorkItem>,
}

/// Result of submitting one item to the pending pool. Either the tx
/// hash or the submission error is set, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub index: usize,
    pub tx_hash: Option<TxHash>,
    pub error: Option<String>,
}

impl Submission {
    pub fn sent(index: usize, tx_hash: TxHash) -> Self {
        Self {
            index,
            tx_hash: Some(tx_hash),
            error: None,
        }
    }

    pub fn failed(index: usize, error: &str) -> Self {
        Self {
            index,
            tx_hash: None,
            error: Some(error.to_owned()),
        }
    }
}

/// Per-transaction outcome after the confirmation wait.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Confirmed { success: bool },
    TimedOut,
    SubmissionError(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Confirmed { success: true })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }
}

/// How per-transaction fees are chosen.
#[derive(Debug, Clone, Copy, Default)]
pub enum FeePolicy {
    /// Fixed legacy gas price in wei (base fee + tip chosen to match
    /// the network's expectations).
    FixedGasPrice(u128),
    /// Ask the node for its current price estimate once per batch.
    #[default]
    Estimated,
}

/// Aggregate statistics for one awaited batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchStats {
    pub sent: usize,
    pub confirmed: usize,
    pub reverted: usize,
    pub timed_out: usize,
    pub submit_failed: usize,
    pub elapsed: Duration,
}

impl BatchStats {
    pub fn tally(outcomes: &[Outcome], elapsed: Duration) -> Self {
        let mut stats = Self {
            sent: outcomes.len(),
            elapsed,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Confirmed { success: true } => stats.confirmed += 1,
                Outcome::Confirmed { success: false } => stats.reverted += 1,
                Outcome::TimedOut => stats.timed_out += 1,
                Outcome::SubmissionError(_) => stats.submit_failed += 1,
            }
        }
        stats
    }

    /// Everything that consumed a nonce slot without producing an
    /// artifact.
    pub fn failures(&self) -> usize {
        self.reverted + self.timed_out + self.submit_failed
    }

    pub fn success_ratio(&self) -> f64 {
        if self.sent == 0 {
            return 1.0;
        }
        self.confirmed as f64 / self.sent as f64
    }

    /// Confirmed items per second over the batch's wait.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.confirmed as f64 / secs
    }
}
