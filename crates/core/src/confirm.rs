//! Receipt collection and outcome classification.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    net::NetworkClient,
    types::{BatchStats, Outcome, Submission},
};

/// Waits for a batch's submissions with an independently bounded
/// per-item timeout, so one stuck item can never stall the rest.
pub struct ConfirmationTracker {
    client: Arc<dyn NetworkClient>,
    tx_timeout: Duration,
    poll_interval: Duration,
    /// Consecutive transport errors tolerated per item before the
    /// wait is abandoned as timed out.
    max_transport_retries: u32,
}

impl ConfirmationTracker {
    pub fn new(client: Arc<dyn NetworkClient>, tx_timeout: Duration) -> Self {
        Self {
            client,
            tx_timeout,
            poll_interval: Duration::from_secs(1),
            max_transport_retries: 3,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Classifies every submission. Outcomes come back in batch
    /// order.
    pub async fn await_batch(&self, submissions: &[Submission]) -> (Vec<Outcome>, BatchStats) {
        let started = Instant::now();
        let outcomes = join_all(submissions.iter().map(|s| self.await_one(s))).await;
        let stats = BatchStats::tally(&outcomes, started.elapsed());
        info!(
            "batch resolved in {:.1}s: {} confirmed, {} reverted, {} timed out, {} submit errors \
             ({:.0}% success, {:.1} tx/s)",
            stats.elapsed.as_secs_f64(),
            stats.confirmed,
            stats.reverted,
            stats.timed_out,
            stats.submit_failed,
            stats.success_ratio() * 100.0,
            stats.throughput(),
        );
        (outcomes, stats)
    }

    async fn await_one(&self, submission: &Submission) -> Outcome {
        let tx_hash = match (&submission.tx_hash, &submission.error) {
            (Some(tx_hash), _) => *tx_hash,
            (None, error) => {
                return Outcome::SubmissionError(
                    error.clone().unwrap_or_else(|| "unknown submission error".to_owned()),
                )
            }
        };

        let deadline = Instant::now() + self.tx_timeout;
        let mut transport_errors = 0u32;
        loop {
            match self.client.get_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    return Outcome::Confirmed {
                        success: receipt.success,
                    }
                }
                Ok(None) => transport_errors = 0,
                Err(e) => {
                    transport_errors += 1;
                    if transport_errors > self.max_transport_retries {
                        warn!("giving up on {tx_hash} after {transport_errors} transport errors: {e}");
                        return Outcome::TimedOut;
                    }
                }
            }
            if Instant::now() >= deadline {
                return Outcome::TimedOut;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
