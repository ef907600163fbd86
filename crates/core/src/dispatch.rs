//! Concurrent fire-and-forget batch submission.

use std::{sync::Arc, time::Instant};

use alloy::{
    primitives::{Address, TxKind},
    rpc::types::TransactionRequest,
};
use futures::future::join_all;
use tracing::{info, warn};

use crate::{
    net::NetworkClient,
    sender::Sender,
    types::{Batch, FeePolicy, Submission, WorkItem},
    Result,
};

/// Fires a batch's items concurrently and collects submission
/// handles. A per-item submission failure is recorded on its handle
/// and never aborts the rest of the batch.
pub struct Dispatcher {
    client: Arc<dyn NetworkClient>,
    sender: Arc<Sender>,
    fee_policy: FeePolicy,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn NetworkClient>, sender: Arc<Sender>, fee_policy: FeePolicy) -> Self {
        Self {
            client,
            sender,
            fee_policy,
        }
    }

    /// Submits every item with nonce `batch.first_nonce + i`. Returns
    /// one handle per item, in batch order.
    pub async fn send_batch(&self, batch: &Batch) -> Result<Vec<Submission>> {
        let chain_id = self.client.chain_id().await?;
        let gas_price = match self.fee_policy {
            FeePolicy::FixedGasPrice(price) => price,
            FeePolicy::Estimated => self.client.gas_price().await?,
        };
        let from = self.sender.address();

        let started = Instant::now();
        let submissions = join_all(batch.items.iter().enumerate().map(|(index, item)| {
            let tx = build_request(
                item,
                from,
                batch.first_nonce + index as u64,
                batch.per_item_gas,
                gas_price,
                chain_id,
            );
            let sender = self.sender.clone();
            let client = self.client.clone();
            async move {
                match sender.submit(client.as_ref(), tx).await {
                    Ok(tx_hash) => Submission::sent(index, tx_hash),
                    Err(e) => {
                        warn!("submission {index} failed: {e}");
                        Submission::failed(index, &e.to_string())
                    }
                }
            }
        }))
        .await;

        let accepted = submissions.iter().filter(|s| s.tx_hash.is_some()).count();
        let elapsed = started.elapsed().as_secs_f64();
        info!(
            "sent {accepted}/{} transactions in {elapsed:.2}s ({:.1} tx/s), nonces [{}, {})",
            batch.items.len(),
            accepted as f64 / elapsed.max(f64::EPSILON),
            batch.first_nonce,
            batch.first_nonce + batch.items.len() as u64,
        );
        Ok(submissions)
    }
}

fn build_request(
    item: &WorkItem,
    from: Address,
    nonce: u64,
    gas: u64,
    gas_price: u128,
    chain_id: u64,
) -> TransactionRequest {
    let base = TransactionRequest {
        from: Some(from),
        gas: Some(gas),
        gas_price: Some(gas_price),
        nonce: Some(nonce),
        chain_id: Some(chain_id),
        ..Default::default()
    };
    match item {
        WorkItem::Deploy(target) => TransactionRequest {
            to: Some(TxKind::Call(target.factory)),
            input: target.call_data.clone().into(),
            ..base
        },
        WorkItem::Fund { to, amount } => TransactionRequest {
            to: Some(TxKind::Call(*to)),
            value: Some(*amount),
            ..base
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        net::MockNetwork,
        workload::{DeployContent, FactoryKind, SaltSource, Workload},
    };
    use alloy::primitives::{address, Bytes, U256};

    fn deploy_batch(count: u64, first_nonce: u64) -> Batch {
        let workload = Workload::new(
            address!("4e59b44847b379578588920ca78fbf26c0b4956c"),
            FactoryKind::CallerSalt,
            DeployContent::from_init_code(Bytes::from_static(&[0x60, 0x00, 0xf3])),
            SaltSource::Sequential,
        )
        .unwrap();
        let items = (0..count)
            .map(|i| WorkItem::Deploy(workload.target(i).unwrap()))
            .collect();
        Batch {
            first_nonce,
            per_item_gas: 220_000,
            items,
        }
    }

    #[tokio::test]
    async fn assigns_contiguous_nonces_in_batch_order() {
        let mock = Arc::new(MockNetwork::new());
        let sender = Arc::new(Sender::delegated(address!(
            "00000000000000000000000000000000000000aa"
        )));
        let dispatcher = Dispatcher::new(mock.clone(), sender, FeePolicy::FixedGasPrice(22_000_000_000));

        let batch = deploy_batch(5, 100);
        let submissions = dispatcher.send_batch(&batch).await.unwrap();
        assert_eq!(submissions.len(), 5);
        assert!(submissions.iter().all(|s| s.tx_hash.is_some()));

        let mut nonces: Vec<u64> = mock.sent().iter().map(|tx| tx.nonce).collect();
        nonces.sort_unstable();
        assert_eq!(nonces, vec![100, 101, 102, 103, 104]);
        assert!(mock.sent().iter().all(|tx| tx.gas == 220_000));
    }

    #[tokio::test]
    async fn submission_errors_do_not_abort_the_batch() {
        let mock = Arc::new(MockNetwork::new());
        mock.reject_submissions(true);
        let sender = Arc::new(Sender::delegated(address!(
            "00000000000000000000000000000000000000aa"
        )));
        let dispatcher = Dispatcher::new(mock.clone(), sender, FeePolicy::Estimated);

        let submissions = dispatcher.send_batch(&deploy_batch(4, 0)).await.unwrap();
        assert_eq!(submissions.len(), 4);
        assert!(submissions.iter().all(|s| s.error.is_some()));
        // all four were attempted despite every one failing
        assert_eq!(mock.attempt_count(), 4);
        assert_eq!(mock.sent_count(), 0);
    }

    #[tokio::test]
    async fn funding_items_carry_value_not_calldata() {
        let mock = Arc::new(MockNetwork::new());
        let sender = Arc::new(Sender::delegated(address!(
            "00000000000000000000000000000000000000aa"
        )));
        let dispatcher = Dispatcher::new(mock.clone(), sender, FeePolicy::Estimated);

        let recipient = address!("00000000000000000000000000000000deadbeef");
        let batch = Batch {
            first_nonce: 0,
            per_item_gas: 23_100,
            items: vec![WorkItem::Fund {
                to: recipient,
                amount: U256::from(1),
            }],
        };
        dispatcher.send_batch(&batch).await.unwrap();

        let sent = mock.sent();
        assert_eq!(sent[0].to, Some(recipient));
        assert_eq!(sent[0].value, U256::from(1));
        assert!(sent[0].input.is_empty());
    }
}
