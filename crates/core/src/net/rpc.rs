use alloy::{
    consensus::TxEnvelope,
    eips::BlockNumberOrTag,
    network::ReceiptResponse,
    primitives::{Address, Bytes, TxHash, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    transports::http::reqwest::Url,
};
use async_trait::async_trait;

use super::{NetworkClient, ReceiptInfo};
use crate::{error::Error, Result};

/// Alloy-backed [`NetworkClient`] over HTTP.
pub struct RpcClient {
    provider: DynProvider,
}

impl RpcClient {
    pub fn new(rpc_url: Url) -> Self {
        let provider = DynProvider::new(ProviderBuilder::new().connect_http(rpc_url));
        Self { provider }
    }

    pub fn from_provider(provider: DynProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl NetworkClient for RpcClient {
    async fn send_tx_envelope(&self, tx: TxEnvelope) -> Result<TxHash> {
        let pending = self.provider.send_tx_envelope(tx).await?;
        Ok(*pending.tx_hash())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash> {
        let pending = self.provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }

    async fn get_receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptInfo>> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|r| ReceiptInfo {
            success: r.status(),
            contract_address: r.contract_address(),
            gas_used: r.gas_used,
            block_number: r.block_number,
        }))
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        Ok(self
            .provider
            .get_transaction_count(address)
            .pending()
            .await?)
    }

    async fn block_gas_limit(&self) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or(Error::LatestBlockMissing)?;
        Ok(block.header.gas_limit)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn storage_at(&self, address: Address, slot: U256) -> Result<B256> {
        let value = self.provider.get_storage_at(address, slot).await?;
        Ok(B256::from(value))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        Ok(self.provider.get_code_at(address).await?)
    }

    async fn balance_of(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address).await?)
    }
}
