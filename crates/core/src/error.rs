use alloy::{
    network::{Ethereum, TransactionBuilderError},
    primitives::Address,
    signers,
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("rpc error")]
    Rpc(#[from] RpcError<TransportErrorKind>),

    #[error("signer failed to sign transaction")]
    Signer(#[from] signers::Error),

    #[error("failed to build eth transaction")]
    TransactionBuilder(#[from] TransactionBuilderError<Ethereum>),

    #[error("{field} must be {expected} bytes, got {got}")]
    InvalidInputLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error(
        "cannot fit a single item in a block: need {per_item_gas} gas per item, \
         only {usable_gas} usable of a {gas_ceiling} gas ceiling"
    )]
    CapacityTooLow {
        per_item_gas: u64,
        usable_gas: u64,
        gas_ceiling: u64,
    },

    #[error("node returned no latest block")]
    LatestBlockMissing,

    #[error(
        "aborted after {failures} failures (threshold {threshold}); \
         {completed}/{target} items completed, ledger committed"
    )]
    Aborted {
        failures: u64,
        threshold: u64,
        completed: u64,
        target: u64,
    },

    #[error("workload requires init code for caller-salt deployments")]
    InitCodeMissing,

    #[error("salt list exhausted: no salt for target index {0}")]
    SaltExhausted(u64),

    #[error("ledger belongs to factory {recorded}, workload uses {requested}")]
    LedgerFactoryMismatch { recorded: Address, requested: Address },

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
