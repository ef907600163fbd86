//! Workload description: which factory to drive, how salts are
//! assigned, and the opaque content blob being deployed.
//!
//! The core never interprets contract semantics; it only needs the
//! init code bytes (or a reference to them), their hash, and their
//! size for gas estimation.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{create2, error::Error, Result};

/// Opaque deployment payload: init code (when held locally), its
/// keccak hash, and its size in bytes.
#[derive(Debug, Clone)]
pub struct DeployContent {
    pub init_code: Option<Bytes>,
    pub hash: B256,
    pub size: usize,
}

impl DeployContent {
    /// Content held locally; hash and size are derived.
    pub fn from_init_code(init_code: Bytes) -> Self {
        let hash = keccak256(&init_code);
        let size = init_code.len();
        Self {
            init_code: Some(init_code),
            hash,
            size,
        }
    }

    /// Content held elsewhere (e.g. an initcode contract the factory
    /// copies with EXTCODECOPY). Only the hash and size are known.
    pub fn external(hash: B256, size: usize) -> Self {
        Self {
            init_code: None,
            hash,
            size,
        }
    }
}

/// The two factory protocols the pipeline can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    /// The factory assigns salts from its own storage counter
    /// (slot 0) and holds the init code hash in slot 1; any nonempty
    /// calldata triggers one deployment.
    CounterSalt,
    /// The caller supplies the salt; calldata is `salt ++ init_code`
    /// (Nick-style singleton factory).
    CallerSalt,
}

/// One caller-supplied salt, optionally with auxiliary accounts that
/// must exist before the benchmark can touch the deployed artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaltEntry {
    pub salt: B256,
    #[serde(default)]
    pub auxiliary_accounts: Vec<Address>,
}

/// Where salts come from.
#[derive(Debug, Clone)]
pub enum SaltSource {
    /// Salt for target `i` is `i`, left-padded to 32 bytes.
    Sequential,
    /// Pre-mined salt list, indexed by target number.
    Provided(Vec<SaltEntry>),
}

/// A full deployment workload: factory, protocol, content, salts.
#[derive(Debug, Clone)]
pub struct Workload {
    pub factory: Address,
    pub kind: FactoryKind,
    pub content: DeployContent,
    pub salts: SaltSource,
    /// Wei sent to each auxiliary account. 1 wei is enough to create
    /// the account in the state trie.
    pub fund_amount: U256,
}

impl Workload {
    pub fn new(
        factory: Address,
        kind: FactoryKind,
        content: DeployContent,
        salts: SaltSource,
    ) -> Result<Self> {
        if kind == FactoryKind::CallerSalt && content.init_code.is_none() {
            return Err(Error::InitCodeMissing);
        }
        Ok(Self {
            factory,
            kind,
            content,
            salts,
            fund_amount: U256::from(1),
        })
    }

    pub fn with_fund_amount(mut self, fund_amount: U256) -> Self {
        self.fund_amount = fund_amount;
        self
    }

    /// Salt assigned to the target at `index`.
    pub fn salt(&self, index: u64) -> Result<B256> {
        match &self.salts {
            SaltSource::Sequential => Ok(create2::index_salt(index)),
            SaltSource::Provided(entries) => entries
                .get(index as usize)
                .map(|entry| entry.salt)
                .ok_or(Error::SaltExhausted(index)),
        }
    }

    /// Materializes the deployment target at `index`.
    pub fn target(&self, index: u64) -> Result<DeploymentTarget> {
        let salt = self.salt(index)?;
        let auxiliary_accounts = match &self.salts {
            SaltSource::Sequential => vec![],
            SaltSource::Provided(entries) => entries[index as usize].auxiliary_accounts.clone(),
        };
        let call_data = match self.kind {
            FactoryKind::CounterSalt => Bytes::from_static(&[0x01]),
            FactoryKind::CallerSalt => {
                let init_code = self.content.init_code.as_ref().ok_or(Error::InitCodeMissing)?;
                let mut data = Vec::with_capacity(32 + init_code.len());
                data.extend_from_slice(salt.as_slice());
                data.extend_from_slice(init_code);
                Bytes::from(data)
            }
        };
        Ok(DeploymentTarget {
            factory: self.factory,
            salt,
            init_code_hash: self.content.hash,
            call_data,
            auxiliary_accounts,
        })
    }

    /// Address the target at `index` will land at, computed before
    /// the artifact exists on-chain.
    pub fn expected_address(&self, index: u64) -> Result<Address> {
        Ok(self.target(index)?.expected_address())
    }
}

/// One artifact to create, fully materialized for dispatch.
#[derive(Debug, Clone)]
pub struct DeploymentTarget {
    pub factory: Address,
    pub salt: B256,
    pub init_code_hash: B256,
    pub call_data: Bytes,
    pub auxiliary_accounts: Vec<Address>,
}

impl DeploymentTarget {
    pub fn expected_address(&self) -> Address {
        create2::compute_address(self.factory, self.salt, self.init_code_hash)
    }
}
