use std::{fs, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use alloy::{
    primitives::{hex, Address, Bytes, B256, U256},
    signers::local::PrivateKeySigner,
};
use clap::Args;
use tracing::warn;

use statefill_core::{
    gas::GasPlanner,
    ledger::{CounterLedger, ProgressRecord},
    net::RpcClient,
    orchestrator::{Orchestrator, RunOpts},
    sender::Sender,
    types::FeePolicy,
    workload::{DeployContent, FactoryKind, SaltEntry, SaltSource, Workload},
};
use statefill_manifest::JsonManifest;

use super::{DeployMode, NetworkCliArgs};

/// First dev account of a stock anvil/hardhat node.
const DEV_PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

#[derive(Debug, Args)]
pub struct RunCliArgs {
    #[command(flatten)]
    pub network: NetworkCliArgs,

    /// Total number of deployments that should exist when the run
    /// finishes, counting any from previous runs.
    #[arg(short = 'n', long)]
    pub count: u64,

    /// Hex private key used to sign transactions locally.
    #[arg(short = 'p', long, env = "STATEFILL_PRIVATE_KEY")]
    pub private_key: Option<String>,

    /// Send from a node-managed (unlocked) account instead of signing
    /// locally.
    #[arg(long, conflicts_with = "private_key")]
    pub from: Option<Address>,

    /// File holding the hex-encoded init code to deploy. Required in
    /// salted mode; optional in counter mode.
    #[arg(long)]
    pub init_code: Option<PathBuf>,

    /// Size in bytes of the init code the factory deploys, for gas
    /// planning when the code itself is not held locally.
    #[arg(long)]
    pub init_code_size: Option<usize>,

    /// JSON file of pre-mined salt entries; without it salts are
    /// assigned sequentially from zero.
    #[arg(long)]
    pub salts_file: Option<PathBuf>,

    /// Abort the run once this many items have failed.
    #[arg(long, default_value_t = 20)]
    pub max_failures: u64,

    /// Seconds to wait for each transaction receipt.
    #[arg(long, default_value_t = 60)]
    pub tx_timeout: u64,

    /// Fixed legacy gas price in gwei. Omitted means asking the node
    /// for an estimate once per batch.
    #[arg(long)]
    pub gas_price: Option<u128>,

    /// Fraction of each block's gas ceiling a batch may claim.
    #[arg(long, default_value_t = 0.95)]
    pub usable_fraction: f64,

    /// Wei sent to each auxiliary account that does not exist yet.
    #[arg(long, default_value_t = 1)]
    pub fund_amount: u64,

    /// Plan the first batch and print it without sending anything.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

pub async fn run(args: RunCliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(RpcClient::new(args.network.rpc_url.clone()));

    let sender = match (&args.from, &args.private_key) {
        (Some(address), _) => Sender::delegated(*address),
        (None, Some(key)) => Sender::local(PrivateKeySigner::from_str(key)?),
        (None, None) => {
            warn!("no private key or account given; falling back to the default dev-node key");
            Sender::local(PrivateKeySigner::from_str(DEV_PRIVATE_KEY)?)
        }
    };

    let content = load_content(client.clone(), &args).await?;
    let salts = match &args.salts_file {
        Some(path) => {
            let entries: Vec<SaltEntry> = serde_json::from_str(&fs::read_to_string(path)?)?;
            SaltSource::Provided(entries)
        }
        None => SaltSource::Sequential,
    };
    let kind = match args.network.mode {
        DeployMode::Counter => FactoryKind::CounterSalt,
        DeployMode::Salted => FactoryKind::CallerSalt,
    };
    let workload = Workload::new(args.network.factory, kind, content, salts)?
        .with_fund_amount(U256::from(args.fund_amount));

    let planner = GasPlanner::default().with_usable_fraction(args.usable_fraction);
    let opts = RunOpts {
        max_failures: args.max_failures,
        tx_timeout: Duration::from_secs(args.tx_timeout),
        fee_policy: match args.gas_price {
            Some(gwei) => FeePolicy::FixedGasPrice(gwei * 1_000_000_000),
            None => FeePolicy::Estimated,
        },
        dry_run: args.dry_run,
        ..Default::default()
    };

    let record = match args.network.mode {
        DeployMode::Counter => {
            let ledger = CounterLedger::new(client.clone(), args.network.factory);
            Orchestrator::new(client, sender, workload, ledger)
                .with_planner(planner)
                .with_opts(opts)
                .run(args.count)
                .await?
        }
        DeployMode::Salted => {
            let ledger = JsonManifest::new(
                &args.network.manifest,
                ProgressRecord::new(args.network.factory),
            );
            Orchestrator::new(client, sender, workload, ledger)
                .with_planner(planner)
                .with_opts(opts)
                .run(args.count)
                .await?
        }
    };

    println!(
        "{}/{} deployments complete",
        record.completed_count, record.target_count
    );
    Ok(())
}

/// Resolves the deployment payload. Counter-mode factories carry their
/// init code hash on-chain, so only the size has to be supplied when
/// the code itself is not local.
async fn load_content(
    client: Arc<RpcClient>,
    args: &RunCliArgs,
) -> Result<DeployContent, Box<dyn std::error::Error>> {
    if let Some(path) = &args.init_code {
        let raw = fs::read_to_string(path)?;
        let bytes = hex::decode(raw.trim().trim_start_matches("0x"))?;
        return Ok(DeployContent::from_init_code(Bytes::from(bytes)));
    }
    match args.network.mode {
        DeployMode::Salted => Err("salted mode requires --init-code".into()),
        DeployMode::Counter => {
            let size = args
                .init_code_size
                .ok_or("--init-code-size is required when --init-code is not given")?;
            let ledger = CounterLedger::new(client, args.network.factory);
            let hash = ledger.init_code_hash().await?;
            if hash == B256::ZERO {
                warn!(
                    "factory {} reports a zero init code hash; is it a counter factory?",
                    args.network.factory
                );
            }
            Ok(DeployContent::external(hash, size))
        }
    }
}
