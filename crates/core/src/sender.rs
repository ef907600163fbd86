//! Sending capability: local key or node-managed account.

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, TxHash},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};

use crate::{net::NetworkClient, Result};

/// The closed set of signing capabilities, selected once at startup.
#[derive(Debug, Clone)]
pub enum Sender {
    /// Holds a private key; transactions are signed locally and
    /// submitted raw.
    Local { signer: PrivateKeySigner },
    /// Signing is delegated to the node's account management (the
    /// account must be unlocked there).
    Delegated { address: Address },
}

impl Sender {
    pub fn local(signer: PrivateKeySigner) -> Self {
        Self::Local { signer }
    }

    pub fn delegated(address: Address) -> Self {
        Self::Delegated { address }
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Local { signer } => signer.address(),
            Self::Delegated { address } => *address,
        }
    }

    /// Submits one fully populated request through the appropriate
    /// signing path. Returns once the pending pool accepts it.
    pub async fn submit(&self, client: &dyn NetworkClient, tx: TransactionRequest) -> Result<TxHash> {
        match self {
            Self::Local { signer } => {
                let wallet = EthereumWallet::from(signer.clone());
                let envelope = tx.build(&wallet).await?;
                client.send_tx_envelope(envelope).await
            }
            Self::Delegated { .. } => client.send_transaction(tx).await,
        }
    }
}
