//! Narrow RPC contract the pipeline consumes.
//!
//! The network is an external collaborator; everything the core needs
//! from it fits in [`NetworkClient`]. [`RpcClient`] is the alloy-backed
//! implementation, [`MockNetwork`] an in-process fake for tests.

mod mock;
mod rpc;

pub use mock::{MockNetwork, SentTx};
pub use rpc::RpcClient;

use alloy::{
    consensus::TxEnvelope,
    primitives::{Address, Bytes, TxHash, B256, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;

use crate::Result;

/// The fields of a receipt the pipeline cares about.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptInfo {
    pub success: bool,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Submits a locally signed transaction. Returns as soon as the
    /// node accepts it into the pending pool.
    async fn send_tx_envelope(&self, tx: TxEnvelope) -> Result<TxHash>;

    /// Submits an unsigned request for the node to sign with one of
    /// its managed accounts.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash>;

    /// Single receipt poll; `None` until the tx is included.
    async fn get_receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptInfo>>;

    /// Pending-inclusive transaction count, used to seed the nonce
    /// sequencer.
    async fn pending_nonce(&self, address: Address) -> Result<u64>;

    /// Gas ceiling of the latest block.
    async fn block_gas_limit(&self) -> Result<u64>;

    async fn gas_price(&self) -> Result<u128>;

    async fn chain_id(&self) -> Result<u64>;

    async fn storage_at(&self, address: Address, slot: U256) -> Result<B256>;

    async fn code_at(&self, address: Address) -> Result<Bytes>;

    async fn balance_of(&self, address: Address) -> Result<U256>;
}
