//! The batch loop: Planning → Dispatching → Awaiting → Recording,
//! repeated until the target is reached or the failure threshold
//! trips.

use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use alloy::primitives::{Address, B256};
use tracing::{info, warn};

use crate::{
    confirm::ConfirmationTracker,
    create2,
    dispatch::Dispatcher,
    error::Error,
    gas::GasPlanner,
    ledger::{DeployedItem, LedgerOps, ProgressRecord},
    net::NetworkClient,
    nonce::NonceSequencer,
    sender::Sender,
    types::{Batch, FeePolicy, Outcome, WorkItem},
    workload::{FactoryKind, Workload},
    Result,
};

/// Knobs for one run. Defaults match the behavior of the deployment
/// scripts this replaces.
#[derive(Debug, Clone)]
pub struct RunOpts {
    /// Cumulative failed items (reverts, timeouts, submission errors)
    /// tolerated before the run aborts.
    pub max_failures: u64,
    /// Per-item receipt wait.
    pub tx_timeout: Duration,
    pub fee_policy: FeePolicy,
    /// Plan the first batch, log it, and exit without sending.
    pub dry_run: bool,
    /// Addresses sampled in the final verification pass.
    pub verify_samples: usize,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            max_failures: 20,
            tx_timeout: Duration::from_secs(60),
            fee_policy: FeePolicy::Estimated,
            dry_run: false,
            verify_samples: 5,
        }
    }
}

/// Drives a workload to its target count. Batches run strictly
/// sequentially; only the items inside a batch are concurrent, since
/// capacity and nonce state are only meaningful at batch boundaries.
pub struct Orchestrator<L: LedgerOps> {
    client: Arc<dyn NetworkClient>,
    sender: Arc<Sender>,
    workload: Workload,
    ledger: L,
    planner: GasPlanner,
    opts: RunOpts,
}

impl<L: LedgerOps> Orchestrator<L> {
    pub fn new(client: Arc<dyn NetworkClient>, sender: Sender, workload: Workload, ledger: L) -> Self {
        Self {
            client,
            sender: Arc::new(sender),
            workload,
            ledger,
            planner: GasPlanner::default(),
            opts: RunOpts::default(),
        }
    }

    pub fn with_planner(mut self, planner: GasPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_opts(mut self, opts: RunOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Current progress without performing any work.
    pub async fn status(&self) -> Result<ProgressRecord> {
        let mut record = self.ledger.load().await?;
        record.reconcile();
        Ok(record)
    }

    /// Runs the pipeline until `target` artifacts exist. Re-running
    /// against a ledger already at the target performs zero sends.
    pub async fn run(&self, target: u64) -> Result<ProgressRecord> {
        // Init
        let mut record = self.ledger.load().await?;
        record.reconcile();
        if record.factory != Address::ZERO && record.factory != self.workload.factory {
            return Err(Error::LedgerFactoryMismatch {
                recorded: record.factory,
                requested: self.workload.factory,
            });
        }
        record.factory = self.workload.factory;
        record.target_count = target;

        info!(
            "{}/{} artifacts already produced by factory {}",
            record.completed_count, target, record.factory
        );
        if record.remaining() == 0 {
            self.verify(&record).await;
            return Ok(record);
        }

        let balance = self.client.balance_of(self.sender.address()).await?;
        if balance.is_zero() {
            warn!(
                "sender {} has zero balance; sends will likely be rejected",
                self.sender.address()
            );
        }

        if self.opts.dry_run {
            let gas_ceiling = self.client.block_gas_limit().await?;
            let plan = self
                .planner
                .plan_deploy(gas_ceiling, self.workload.content.size)?;
            let batches = record.remaining().div_ceil(plan.batch_size);
            info!(
                "dry run: {} remaining, {} gas/item, {} items/batch, {batches} batches needed",
                record.remaining(),
                plan.per_item_gas,
                plan.batch_size,
            );
            return Ok(record);
        }

        // surface an unfit deployment shape before anything is sent;
        // funding transfers almost always fit even when deployments
        // cannot
        self.planner
            .plan_deploy(self.client.block_gas_limit().await?, self.workload.content.size)?;

        let nonces = NonceSequencer::sync(self.client.as_ref(), self.sender.address()).await?;
        let dispatcher = Dispatcher::new(
            self.client.clone(),
            self.sender.clone(),
            self.opts.fee_policy,
        );
        let tracker = ConfirmationTracker::new(self.client.clone(), self.opts.tx_timeout);

        let mut failures = 0u64;
        let run_started = Instant::now();
        let initial_completed = record.completed_count;

        self.fund_auxiliary(&record, &nonces, &dispatcher, &tracker, &mut failures)
            .await?;

        // Planning → Dispatching → Awaiting → Recording
        while record.remaining() > 0 {
            let gas_ceiling = self.client.block_gas_limit().await?;
            let plan = self
                .planner
                .plan_deploy(gas_ceiling, self.workload.content.size)?;
            let count = plan.batch_size.min(record.remaining());
            info!(
                "batch plan: {count} deployments at {} gas each ({} gas ceiling)",
                plan.per_item_gas, gas_ceiling
            );

            let pending = self.pending_indices(&record, count as usize)?;
            let mut items = Vec::with_capacity(pending.len());
            for &index in &pending {
                items.push(WorkItem::Deploy(self.workload.target(index)?));
            }
            let batch = Batch {
                first_nonce: nonces.reserve(items.len() as u64),
                per_item_gas: plan.per_item_gas,
                items,
            };

            let submissions = dispatcher.send_batch(&batch).await?;
            let (outcomes, stats) = tracker.await_batch(&submissions).await;

            for (item, outcome) in batch.items.iter().zip(&outcomes) {
                if let (WorkItem::Deploy(target), Outcome::Confirmed { success: true }) =
                    (item, outcome)
                {
                    record.items.push(DeployedItem {
                        address: target.expected_address(),
                        salt: target.salt,
                        auxiliary_accounts: target.auxiliary_accounts.clone(),
                    });
                    record.completed_count += 1;
                }
            }
            failures += stats.failures() as u64;
            self.ledger.commit(&record).await?;

            // an on-chain counter can run ahead of local bookkeeping
            // (e.g. a timed-out item that landed anyway)
            let authoritative = self.ledger.load().await?.completed_count;
            if authoritative > record.completed_count {
                record.completed_count = authoritative;
            }

            let elapsed = run_started.elapsed().as_secs_f64();
            let produced = record.completed_count - initial_completed;
            let rate = produced as f64 / elapsed.max(f64::EPSILON);
            let eta = record.remaining() as f64 / rate.max(f64::EPSILON);
            info!(
                "progress: {}/{} ({rate:.1} items/s, ETA {eta:.0}s)",
                record.completed_count, record.target_count
            );

            if failures > self.opts.max_failures {
                return Err(Error::Aborted {
                    failures,
                    threshold: self.opts.max_failures,
                    completed: record.completed_count,
                    target,
                });
            }
        }

        info!(
            "deployment complete: {} artifacts in {:.1}s",
            record.completed_count,
            run_started.elapsed().as_secs_f64()
        );
        self.verify(&record).await;
        Ok(record)
    }

    /// Indices of targets not yet produced, at most `limit` of them.
    /// A counter factory assigns salts itself, so the completed count
    /// alone identifies the remaining work; a caller-salt record with
    /// per-item history is matched by salt, so a failed target is
    /// retried instead of the next index being deployed twice.
    fn pending_indices(&self, record: &ProgressRecord, limit: usize) -> Result<Vec<u64>> {
        if self.workload.kind == FactoryKind::CallerSalt && !record.items.is_empty() {
            let done: HashSet<B256> = record.items.iter().map(|item| item.salt).collect();
            let mut pending = Vec::with_capacity(limit);
            for index in 0..record.target_count {
                if pending.len() == limit {
                    break;
                }
                if !done.contains(&self.workload.salt(index)?) {
                    pending.push(index);
                }
            }
            Ok(pending)
        } else {
            Ok((record.completed_count..record.target_count)
                .take(limit)
                .collect())
        }
    }

    /// Creates the auxiliary accounts the remaining targets need.
    /// Accounts that already hold a balance are skipped, keeping
    /// re-runs from re-funding.
    async fn fund_auxiliary(
        &self,
        record: &ProgressRecord,
        nonces: &NonceSequencer,
        dispatcher: &Dispatcher,
        tracker: &ConfirmationTracker,
        failures: &mut u64,
    ) -> Result<()> {
        let mut accounts = BTreeSet::new();
        for index in self.pending_indices(record, record.remaining() as usize)? {
            accounts.extend(self.workload.target(index)?.auxiliary_accounts);
        }
        let mut unfunded = Vec::with_capacity(accounts.len());
        for account in accounts {
            if self.client.balance_of(account).await?.is_zero() {
                unfunded.push(account);
            }
        }
        if unfunded.is_empty() {
            return Ok(());
        }
        info!("funding {} auxiliary accounts", unfunded.len());

        let mut cursor = 0usize;
        while cursor < unfunded.len() {
            let gas_ceiling = self.client.block_gas_limit().await?;
            let plan = self.planner.plan_transfer(gas_ceiling)?;
            let chunk = &unfunded
                [cursor..unfunded.len().min(cursor + plan.batch_size as usize)];

            let items = chunk
                .iter()
                .map(|&to| WorkItem::Fund {
                    to,
                    amount: self.workload.fund_amount,
                })
                .collect::<Vec<_>>();
            let batch = Batch {
                first_nonce: nonces.reserve(items.len() as u64),
                per_item_gas: plan.per_item_gas,
                items,
            };
            let submissions = dispatcher.send_batch(&batch).await?;
            let (_, stats) = tracker.await_batch(&submissions).await;
            *failures += stats.failures() as u64;
            if *failures > self.opts.max_failures {
                return Err(Error::Aborted {
                    failures: *failures,
                    threshold: self.opts.max_failures,
                    completed: record.completed_count,
                    target: record.target_count,
                });
            }
            cursor += chunk.len();
        }
        Ok(())
    }

    /// Samples produced addresses against the oracle's predictions.
    /// Mismatches indicate a verification bug or a network anomaly,
    /// not lost work, so they only warn.
    async fn verify(&self, record: &ProgressRecord) {
        let samples = if record.items.is_empty() {
            self.opts.verify_samples.min(record.completed_count as usize)
        } else {
            self.opts.verify_samples.min(record.items.len())
        };
        for index in 0..samples {
            let expected = if let Some(item) = record.items.get(index) {
                let derived = create2::compute_address(
                    record.factory,
                    item.salt,
                    self.workload.content.hash,
                );
                if derived != item.address {
                    warn!(
                        "verification mismatch at index {index}: recorded {} but oracle derives {derived}",
                        item.address
                    );
                    continue;
                }
                derived
            } else {
                match self.workload.expected_address(index as u64) {
                    Ok(address) => address,
                    Err(e) => {
                        warn!("cannot derive address for sample {index}: {e}");
                        continue;
                    }
                }
            };
            match self.client.code_at(expected).await {
                Ok(code) if code.is_empty() => {
                    warn!("verification mismatch: no code at predicted address {expected}")
                }
                Ok(_) => {}
                Err(e) => warn!("verification probe for {expected} failed: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gas::{CostModel, GasPlanner},
        ledger::MemoryLedger,
        net::MockNetwork,
        workload::{DeployContent, FactoryKind, SaltEntry, SaltSource},
    };
    use alloy::primitives::{address, Bytes, U256};

    const FACTORY: Address = address!("4e59b44847b379578588920ca78fbf26c0b4956c");
    const SENDER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    /// Cost model pinning every deployment at exactly 200k gas.
    fn flat_cost_planner() -> GasPlanner {
        GasPlanner {
            safety_margin: 0.0,
            usable_fraction: 0.5,
            cost_model: CostModel {
                intrinsic_gas: 200_000,
                create_overhead_gas: 0,
                per_byte_gas: 0,
                exec_bands: vec![],
                exec_gas_above_bands: 0,
            },
            ..Default::default()
        }
    }

    fn sequential_workload() -> Workload {
        Workload::new(
            FACTORY,
            FactoryKind::CallerSalt,
            DeployContent::from_init_code(Bytes::from_static(&[0x60, 0x00, 0xf3])),
            SaltSource::Sequential,
        )
        .unwrap()
    }

    fn orchestrator(
        mock: Arc<MockNetwork>,
        workload: Workload,
        completed: u64,
    ) -> Orchestrator<MemoryLedger> {
        let mut record = ProgressRecord::new(FACTORY);
        record.completed_count = completed;
        Orchestrator::new(
            mock,
            Sender::delegated(SENDER),
            workload,
            MemoryLedger::new(record),
        )
        .with_planner(flat_cost_planner())
    }

    #[tokio::test]
    async fn completed_ledger_means_zero_sends() {
        let mock = Arc::new(MockNetwork::new());
        let orch = orchestrator(mock.clone(), sequential_workload(), 100);
        let record = orch.run(100).await.unwrap();
        assert_eq!(record.completed_count, 100);
        assert_eq!(mock.attempt_count(), 0);
        assert_eq!(mock.gas_limit_queries(), 0);
    }

    #[tokio::test]
    async fn fills_target_in_capacity_sized_batches() {
        // 30M ceiling, 200k/item, 50% usable => 75 per batch
        let mock = Arc::new(MockNetwork::new());
        let orch = orchestrator(mock.clone(), sequential_workload(), 0);
        let record = orch.run(100).await.unwrap();
        assert_eq!(record.completed_count, 100);
        assert_eq!(record.items.len(), 100);
        assert_eq!(mock.sent_count(), 100);
        // one pre-flight check, then one plan per batch (75 + 25)
        assert_eq!(mock.gas_limit_queries(), 3);
        let first_batch: Vec<u64> = mock.sent()[..75].iter().map(|tx| tx.nonce).collect();
        assert!(first_batch.iter().all(|&n| n < 75));
    }

    #[tokio::test]
    async fn resumed_run_sends_exactly_the_remainder() {
        let mock = Arc::new(MockNetwork::new());
        mock.set_pending_nonce(SENDER, 40);
        let orch = orchestrator(mock.clone(), sequential_workload(), 40);
        let record = orch.run(100).await.unwrap();
        assert_eq!(record.completed_count, 100);
        assert_eq!(mock.sent_count(), 60);
        // salts resume where the previous run stopped
        let first = &mock.sent()[0];
        assert_eq!(&first.input[..32], create2::index_salt(40).as_slice());
        assert_eq!(first.nonce, 40);
    }

    #[tokio::test]
    async fn reverted_items_are_retried_not_skipped() {
        let mock = Arc::new(MockNetwork::new());
        mock.revert_next(3);
        let orch = orchestrator(mock.clone(), sequential_workload(), 0);
        let record = orch.run(10).await.unwrap();

        // first batch of 10: 7 confirmed, 3 reverted
        let commits = orch.ledger.commits();
        assert_eq!(commits[0].completed_count, 7);
        assert_eq!(commits[0].items.len(), 7);
        // the 3 reverted targets are retried in the second batch
        assert_eq!(record.completed_count, 10);
        assert_eq!(mock.sent_count(), 13);
        // every salt produced exactly once; nothing redeployed or
        // silently dropped
        let salts: std::collections::BTreeSet<B256> =
            record.items.iter().map(|item| item.salt).collect();
        let expected: std::collections::BTreeSet<B256> =
            (0..10).map(create2::index_salt).collect();
        assert_eq!(record.items.len(), 10);
        assert_eq!(salts, expected);
    }

    #[tokio::test]
    async fn aborts_past_the_failure_threshold_without_replanning() {
        let mock = Arc::new(MockNetwork::new());
        mock.reject_submissions(true);
        let orch = orchestrator(mock.clone(), sequential_workload(), 0);
        let err = orch.run(100).await.unwrap_err();
        match err {
            Error::Aborted {
                failures,
                threshold,
                completed,
                target,
            } => {
                assert_eq!(failures, 75);
                assert_eq!(threshold, 20);
                assert_eq!(completed, 0);
                assert_eq!(target, 100);
            }
            other => panic!("expected abort, got {other:?}"),
        }
        // pre-flight plus the single aborted batch; no further Planning
        assert_eq!(mock.gas_limit_queries(), 2);
        // the ledger was committed before aborting
        assert_eq!(orch.ledger.commits().len(), 1);
    }

    #[tokio::test]
    async fn failures_accumulate_across_batches_until_abort() {
        let mock = Arc::new(MockNetwork::new());
        mock.revert_next(9);
        // 1M gas/item against a 3M usable share: 3 items per batch
        let planner = GasPlanner {
            safety_margin: 0.0,
            usable_fraction: 0.1,
            cost_model: CostModel {
                intrinsic_gas: 1_000_000,
                create_overhead_gas: 0,
                per_byte_gas: 0,
                exec_bands: vec![],
                exec_gas_above_bands: 0,
            },
            ..Default::default()
        };
        let orch = orchestrator(mock.clone(), sequential_workload(), 0)
            .with_planner(planner)
            .with_opts(RunOpts {
                max_failures: 7,
                ..Default::default()
            });

        let err = orch.run(9).await.unwrap_err();
        match err {
            Error::Aborted {
                failures,
                threshold,
                completed,
                ..
            } => {
                // three sub-threshold batches: 3, then 6, then 9
                assert_eq!(failures, 9);
                assert_eq!(threshold, 7);
                assert_eq!(completed, 0);
            }
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(mock.sent_count(), 9);
        // pre-flight plus three batch plans, none after the abort
        assert_eq!(mock.gas_limit_queries(), 4);
    }

    #[tokio::test]
    async fn unfit_deployments_are_rejected_before_funding() {
        let aux = address!("00000000000000000000000000000000000000c1");
        let entries = vec![SaltEntry {
            salt: create2::index_salt(0),
            auxiliary_accounts: vec![aux],
        }];
        let workload = Workload::new(
            FACTORY,
            FactoryKind::CallerSalt,
            DeployContent::from_init_code(Bytes::from_static(&[0x00])),
            SaltSource::Provided(entries),
        )
        .unwrap();

        // 200k deployments cannot fit the 150k usable share of a 300k
        // ceiling, but 21k funding transfers would
        let mock = Arc::new(MockNetwork::new().with_gas_limit(300_000));
        let planner = GasPlanner {
            safety_margin: 0.0,
            usable_fraction: 0.5,
            cost_model: CostModel {
                intrinsic_gas: 21_000,
                create_overhead_gas: 179_000,
                per_byte_gas: 0,
                exec_bands: vec![],
                exec_gas_above_bands: 0,
            },
            ..Default::default()
        };
        let orch = orchestrator(mock.clone(), workload, 0).with_planner(planner);

        let err = orch.run(1).await.unwrap_err();
        assert!(matches!(err, Error::CapacityTooLow { .. }));
        // nothing was funded or deployed
        assert_eq!(mock.attempt_count(), 0);
    }

    #[tokio::test]
    async fn dry_run_plans_without_sending() {
        let mock = Arc::new(MockNetwork::new());
        let orch = orchestrator(mock.clone(), sequential_workload(), 0).with_opts(RunOpts {
            dry_run: true,
            ..Default::default()
        });
        let record = orch.run(50).await.unwrap();
        assert_eq!(record.remaining(), 50);
        assert_eq!(mock.attempt_count(), 0);
    }

    #[tokio::test]
    async fn funds_missing_auxiliary_accounts_before_deploying() {
        let aux1 = address!("00000000000000000000000000000000000000b1");
        let aux2 = address!("00000000000000000000000000000000000000b2");
        let aux3 = address!("00000000000000000000000000000000000000b3");
        let entries = vec![
            SaltEntry {
                salt: create2::index_salt(0),
                auxiliary_accounts: vec![aux1, aux2],
            },
            SaltEntry {
                salt: create2::index_salt(1),
                auxiliary_accounts: vec![aux3],
            },
        ];
        let workload = Workload::new(
            FACTORY,
            FactoryKind::CallerSalt,
            DeployContent::from_init_code(Bytes::from_static(&[0x00])),
            SaltSource::Provided(entries),
        )
        .unwrap();

        let mock = Arc::new(MockNetwork::new());
        // aux2 already exists; only aux1 and aux3 need funding
        mock.set_balance(aux2, U256::from(1));

        let orch = orchestrator(mock.clone(), workload, 0);
        let record = orch.run(2).await.unwrap();
        assert_eq!(record.completed_count, 2);

        let funded: Vec<_> = mock
            .sent()
            .iter()
            .filter(|tx| tx.value == U256::from(1))
            .map(|tx| tx.to.unwrap())
            .collect();
        assert_eq!(funded, vec![aux1, aux3]);
        // 2 funding txs + 2 deployments
        assert_eq!(mock.sent_count(), 4);
    }

    #[tokio::test]
    async fn mismatched_factory_refuses_to_run() {
        let mock = Arc::new(MockNetwork::new());
        let mut record = ProgressRecord::new(address!("00000000000000000000000000000000000000ff"));
        record.completed_count = 5;
        let orch = Orchestrator::new(
            mock,
            Sender::delegated(SENDER),
            sequential_workload(),
            MemoryLedger::new(record),
        );
        assert!(matches!(
            orch.run(10).await.unwrap_err(),
            Error::LedgerFactoryMismatch { .. }
        ));
    }
}
