use std::{collections::HashMap, sync::Mutex};

use alloy::{
    consensus::{Transaction, TxEnvelope},
    primitives::{keccak256, Address, Bytes, TxHash, B256, U256},
    rpc::types::TransactionRequest,
    transports::TransportErrorKind,
};
use async_trait::async_trait;

use super::{NetworkClient, ReceiptInfo};
use crate::Result;

/// A transaction the mock accepted, flattened for assertions.
#[derive(Debug, Clone)]
pub struct SentTx {
    pub to: Option<Address>,
    pub nonce: u64,
    pub gas: u64,
    pub value: U256,
    pub input: Bytes,
}

#[derive(Default)]
struct MockState {
    sent: Vec<SentTx>,
    attempts: u64,
    gas_limit_queries: u64,
    receipts: HashMap<TxHash, ReceiptInfo>,
    storage: HashMap<(Address, U256), B256>,
    code: HashMap<Address, Bytes>,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    revert_next: u64,
    receipt_errors: u64,
    reject_submissions: bool,
    withhold_receipts: bool,
}

/// In-process [`NetworkClient`] with scriptable failure behavior.
/// Every accepted submission gets a synthetic hash and an immediately
/// available receipt unless told otherwise.
pub struct MockNetwork {
    gas_limit: u64,
    chain_id: u64,
    gas_price: u128,
    state: Mutex<MockState>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            gas_limit: 30_000_000,
            chain_id: 31337,
            gas_price: 20_000_000_000,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// The next `n` accepted submissions confirm with a reverted
    /// status.
    pub fn revert_next(&self, n: u64) {
        self.state.lock().unwrap().revert_next = n;
    }

    /// Refuse all submissions with a transport error.
    pub fn reject_submissions(&self, yes: bool) {
        self.state.lock().unwrap().reject_submissions = yes;
    }

    /// Accept submissions but never produce receipts.
    pub fn withhold_receipts(&self, yes: bool) {
        self.state.lock().unwrap().withhold_receipts = yes;
    }

    /// The next `n` receipt polls fail with a transport error.
    pub fn fail_receipt_polls(&self, n: u64) {
        self.state.lock().unwrap().receipt_errors = n;
    }

    pub fn set_storage(&self, address: Address, slot: U256, value: B256) {
        self.state.lock().unwrap().storage.insert((address, slot), value);
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state.lock().unwrap().code.insert(address, code);
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().unwrap().balances.insert(address, balance);
    }

    pub fn set_pending_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().unwrap().nonces.insert(address, nonce);
    }

    /// Submissions the mock accepted.
    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    /// Submissions attempted, accepted or not.
    pub fn attempt_count(&self) -> u64 {
        self.state.lock().unwrap().attempts
    }

    /// How many times the gas ceiling was queried; one per Planning
    /// pass.
    pub fn gas_limit_queries(&self) -> u64 {
        self.state.lock().unwrap().gas_limit_queries
    }

    fn accept(&self, tx: SentTx) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if state.reject_submissions {
            return Err(TransportErrorKind::custom_str("submission rejected by mock").into());
        }
        let hash = keccak256((state.attempts).to_be_bytes());
        state.sent.push(tx);
        if !state.withhold_receipts {
            let success = if state.revert_next > 0 {
                state.revert_next -= 1;
                false
            } else {
                true
            };
            state.receipts.insert(
                hash,
                ReceiptInfo {
                    success,
                    contract_address: None,
                    gas_used: 21_000,
                    block_number: Some(1),
                },
            );
        }
        Ok(hash)
    }
}

#[async_trait]
impl NetworkClient for MockNetwork {
    async fn send_tx_envelope(&self, tx: TxEnvelope) -> Result<TxHash> {
        self.accept(SentTx {
            to: tx.to(),
            nonce: tx.nonce(),
            gas: tx.gas_limit(),
            value: tx.value(),
            input: tx.input().clone(),
        })
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash> {
        self.accept(SentTx {
            to: tx.to.and_then(|kind| kind.to().copied()),
            nonce: tx.nonce.unwrap_or_default(),
            gas: tx.gas.unwrap_or_default(),
            value: tx.value.unwrap_or_default(),
            input: tx.input.into_input().unwrap_or_default(),
        })
    }

    async fn get_receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptInfo>> {
        let mut state = self.state.lock().unwrap();
        if state.receipt_errors > 0 {
            state.receipt_errors -= 1;
            return Err(TransportErrorKind::custom_str("receipt poll failed").into());
        }
        Ok(state.receipts.get(&tx_hash).copied())
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .nonces
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn block_gas_limit(&self) -> Result<u64> {
        self.state.lock().unwrap().gas_limit_queries += 1;
        Ok(self.gas_limit)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.gas_price)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn storage_at(&self, address: Address, slot: U256) -> Result<B256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .storage
            .get(&(address, slot))
            .copied()
            .unwrap_or_default())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn balance_of(&self, address: Address) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }
}
