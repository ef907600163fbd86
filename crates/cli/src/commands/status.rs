use std::sync::Arc;

use clap::Args;

use statefill_core::{
    ledger::{CounterLedger, LedgerOps, ProgressRecord},
    net::RpcClient,
};
use statefill_manifest::JsonManifest;

use super::{DeployMode, NetworkCliArgs};

#[derive(Debug, Args)]
pub struct StatusCliArgs {
    #[command(flatten)]
    pub network: NetworkCliArgs,
}

pub async fn status(args: StatusCliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(RpcClient::new(args.network.rpc_url.clone()));
    let mut record = match args.network.mode {
        DeployMode::Counter => {
            CounterLedger::new(client, args.network.factory)
                .load()
                .await?
        }
        DeployMode::Salted => {
            JsonManifest::new(
                &args.network.manifest,
                ProgressRecord::new(args.network.factory),
            )
            .load()
            .await?
        }
    };
    record.reconcile();

    println!("factory:   {}", record.factory);
    println!("completed: {}", record.completed_count);
    if record.target_count > 0 {
        let percent = record.completed_count as f64 / record.target_count as f64 * 100.0;
        println!(
            "target:    {} ({} remaining, {percent:.1}%)",
            record.target_count,
            record.remaining()
        );
    }
    if let Some(last) = record.items.last() {
        println!("latest:    {} (salt {})", last.address, last.salt);
    }
    Ok(())
}
