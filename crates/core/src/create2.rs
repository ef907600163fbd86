//! Deterministic deployment-address derivation (CREATE2, EIP-1014).
//!
//! Addresses are computed before submission so the orchestrator can
//! record expected addresses up front and verify them after the fact.

use alloy::primitives::{keccak256, Address, B256};

use crate::{error::Error, Result};

/// CREATE2 discriminator byte.
const CREATE2_PREFIX: u8 = 0xff;

/// Computes the address a CREATE2 deployment will land at:
/// `keccak256(0xff ++ deployer ++ salt ++ init_code_hash)[12..]`.
///
/// Pure function of its inputs; must match the network's derivation
/// rule exactly or post-deploy verification will flag every item.
pub fn compute_address(deployer: Address, salt: B256, init_code_hash: B256) -> Address {
    let mut preimage = [0u8; 85];
    preimage[0] = CREATE2_PREFIX;
    preimage[1..21].copy_from_slice(deployer.as_slice());
    preimage[21..53].copy_from_slice(salt.as_slice());
    preimage[53..85].copy_from_slice(init_code_hash.as_slice());
    Address::from_slice(&keccak256(preimage)[12..])
}

/// Raw-slice variant for callers holding untyped bytes (e.g. values
/// read straight out of factory storage). Validates fixed widths.
pub fn compute_address_raw(deployer: &[u8], salt: &[u8], init_code_hash: &[u8]) -> Result<Address> {
    let check = |field, expected, got| {
        if got != expected {
            Err(Error::InvalidInputLength {
                field,
                expected,
                got,
            })
        } else {
            Ok(())
        }
    };
    check("deployer", 20, deployer.len())?;
    check("salt", 32, salt.len())?;
    check("init code hash", 32, init_code_hash.len())?;
    Ok(compute_address(
        Address::from_slice(deployer),
        B256::from_slice(salt),
        B256::from_slice(init_code_hash),
    ))
}

/// Convenience for factories that derive salts from a counter: the
/// counter value is left-padded into the 32-byte salt.
pub fn index_salt(index: u64) -> B256 {
    let mut salt = B256::ZERO;
    salt.0[24..].copy_from_slice(&index.to_be_bytes());
    salt
}
