//! Send-rate planning from live network capacity.
//!
//! The planner is re-invoked before every batch with a fresh gas
//! ceiling; it never caches capacity across batches.

use crate::{error::Error, Result};

/// Intrinsic cost of any transaction.
const TX_INTRINSIC_GAS: u64 = 21_000;
/// Approximate overhead of the CREATE2 path inside a factory.
const CREATE2_OVERHEAD_GAS: u64 = 32_000;
/// Code-deposit cost per byte of deployed bytecode.
const CODE_DEPOSIT_GAS_PER_BYTE: u64 = 200;

/// Execution-cost term for one payload-size band. Applies to
/// deployments up to and including `max_bytes`.
#[derive(Debug, Clone, Copy)]
pub struct ExecBand {
    pub max_bytes: usize,
    pub exec_gas: u64,
}

/// Tiered deployment-cost estimate: fixed overheads, linear per-byte
/// storage cost, and a size-banded execution term covering the
/// non-linear work larger init code does. The bands are measured
/// values, not protocol constants, and are meant to be overridden
/// when a workload's init code behaves differently.
#[derive(Debug, Clone)]
pub struct CostModel {
    pub intrinsic_gas: u64,
    pub create_overhead_gas: u64,
    pub per_byte_gas: u64,
    /// Must be sorted ascending by `max_bytes`.
    pub exec_bands: Vec<ExecBand>,
    /// Execution term for payloads beyond the last band.
    pub exec_gas_above_bands: u64,
}

impl Default for CostModel {
    fn default() -> Self {
        // Measured against geth: a 512-byte deployment lands around
        // 183k gas total with these terms.
        Self {
            intrinsic_gas: TX_INTRINSIC_GAS,
            create_overhead_gas: CREATE2_OVERHEAD_GAS,
            per_byte_gas: CODE_DEPOSIT_GAS_PER_BYTE,
            exec_bands: vec![
                ExecBand { max_bytes: 512, exec_gas: 30_000 },
                ExecBand { max_bytes: 1_024, exec_gas: 35_000 },
                ExecBand { max_bytes: 5_120, exec_gas: 150_000 },
                ExecBand { max_bytes: 10_240, exec_gas: 300_000 },
                ExecBand { max_bytes: 24_576, exec_gas: 500_000 },
                ExecBand { max_bytes: 32_768, exec_gas: 700_000 },
            ],
            exec_gas_above_bands: 1_000_000,
        }
    }
}

impl CostModel {
    /// Base cost estimate (no safety buffer) for deploying a payload
    /// of `size` bytes through a factory.
    pub fn deploy_cost(&self, size: usize) -> u64 {
        let exec = self
            .exec_bands
            .iter()
            .find(|band| size <= band.max_bytes)
            .map(|band| band.exec_gas)
            .unwrap_or(self.exec_gas_above_bands);
        self.intrinsic_gas + self.create_overhead_gas + (size as u64 * self.per_byte_gas) + exec
    }

    /// Cost of a plain value transfer (auxiliary-account funding).
    pub fn transfer_cost(&self) -> u64 {
        self.intrinsic_gas
    }
}

/// Per-batch resource budget: the gas limit each item is sent with
/// and how many items fit in one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub per_item_gas: u64,
    pub batch_size: u64,
}

/// Computes a safe per-transaction gas budget and an optimal batch
/// size from the network's current block gas ceiling.
#[derive(Debug, Clone)]
pub struct GasPlanner {
    /// Safety buffer added to the estimated cost (0.10 = +10%).
    pub safety_margin: f64,
    /// No single tx may exceed this fraction of the ceiling, so items
    /// stay includable even under competing load.
    pub cap_fraction: f64,
    /// Fraction of the ceiling a whole batch may claim; the rest is
    /// headroom for other traffic in the block.
    pub usable_fraction: f64,
    pub cost_model: CostModel,
}

impl Default for GasPlanner {
    fn default() -> Self {
        Self {
            safety_margin: 0.10,
            cap_fraction: 0.80,
            usable_fraction: 0.95,
            cost_model: CostModel::default(),
        }
    }
}

impl GasPlanner {
    pub fn with_usable_fraction(mut self, usable_fraction: f64) -> Self {
        self.usable_fraction = usable_fraction;
        self
    }

    pub fn with_safety_margin(mut self, safety_margin: f64) -> Self {
        self.safety_margin = safety_margin;
        self
    }

    /// Plans a batch given the current gas ceiling and a per-item
    /// base cost. Fails with `CapacityTooLow` when not even one item
    /// fits into the usable share of a block.
    pub fn plan(&self, gas_ceiling: u64, per_item_cost: u64) -> Result<BatchPlan> {
        let buffered = (per_item_cost as f64 * (1.0 + self.safety_margin)) as u64;
        let per_item_cap = (gas_ceiling as f64 * self.cap_fraction) as u64;
        let per_item_gas = buffered.min(per_item_cap);

        let usable_gas = (gas_ceiling as f64 * self.usable_fraction) as u64;
        let batch_size = usable_gas / per_item_gas.max(1);
        if batch_size == 0 {
            return Err(Error::CapacityTooLow {
                per_item_gas,
                usable_gas,
                gas_ceiling,
            });
        }
        Ok(BatchPlan {
            per_item_gas,
            batch_size,
        })
    }

    /// Plans a deployment batch for a payload of `size` bytes.
    pub fn plan_deploy(&self, gas_ceiling: u64, size: usize) -> Result<BatchPlan> {
        self.plan(gas_ceiling, self.cost_model.deploy_cost(size))
    }

    /// Plans a funding batch (plain 21k transfers).
    pub fn plan_transfer(&self, gas_ceiling: u64) -> Result<BatchPlan> {
        self.plan(gas_ceiling, self.cost_model.transfer_cost())
    }
}
