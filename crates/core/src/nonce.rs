//! Strictly increasing nonce reservation for a single sender.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::Address;
use tracing::info;

use crate::{net::NetworkClient, Result};

/// Hands out contiguous nonce ranges to concurrent callers. Seeded
/// from the sender's pending transaction count so re-runs and
/// externally issued transactions are respected. Never decremented:
/// a failed send still consumed its slot, and the resulting gap is
/// tolerated rather than refilled.
#[derive(Debug)]
pub struct NonceSequencer {
    next: AtomicU64,
}

impl NonceSequencer {
    /// Seeds the sequencer from the network's observed pending count.
    pub async fn sync(client: &dyn NetworkClient, sender: Address) -> Result<Self> {
        let next = client.pending_nonce(sender).await?;
        info!("starting nonce for {sender}: {next}");
        Ok(Self::from_value(next))
    }

    pub fn from_value(next: u64) -> Self {
        Self {
            next: AtomicU64::new(next),
        }
    }

    /// Atomically reserves `count` nonces and returns the first. The
    /// caller owns `[first, first + count)` exclusively.
    pub fn reserve(&self, count: u64) -> u64 {
        self.next.fetch_add(count, Ordering::SeqCst)
    }

    /// Next nonce that would be handed out.
    pub fn next_unreserved(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::BTreeSet, sync::Arc, thread};

    #[test]
    fn reserve_advances_by_count() {
        let seq = NonceSequencer::from_value(10);
        assert_eq!(seq.reserve(5), 10);
        assert_eq!(seq.reserve(1), 15);
        assert_eq!(seq.reserve(3), 16);
        assert_eq!(seq.next_unreserved(), 19);
    }

    #[test]
    fn concurrent_reservations_partition_the_range() {
        let initial = 100u64;
        let seq = Arc::new(NonceSequencer::from_value(initial));
        let counts: Vec<u64> = vec![1, 3, 7, 10, 2, 5, 8, 4];
        let total: u64 = counts.iter().sum();

        let handles: Vec<_> = counts
            .iter()
            .map(|&count| {
                let seq = seq.clone();
                thread::spawn(move || (seq.reserve(count), count))
            })
            .collect();

        let mut claimed = BTreeSet::new();
        for handle in handles {
            let (first, count) = handle.join().unwrap();
            for nonce in first..first + count {
                // no overlaps
                assert!(claimed.insert(nonce));
            }
        }
        // no gaps: the union is exactly [initial, initial + total)
        let expected: BTreeSet<u64> = (initial..initial + total).collect();
        assert_eq!(claimed, expected);
        assert_eq!(seq.next_unreserved(), initial + total);
    }

    #[tokio::test]
    async fn sync_reads_pending_count() {
        let mock = crate::net::MockNetwork::new();
        let sender = Address::repeat_byte(0x11);
        mock.set_pending_nonce(sender, 42);
        let seq = NonceSequencer::sync(&mock, sender).await.unwrap();
        assert_eq!(seq.reserve(1), 42);
    }
}
