use std::path::PathBuf;

use alloy::{primitives::Address, transports::http::reqwest::Url};
use clap::{Args, ValueEnum};

/// Which factory protocol the pipeline drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeployMode {
    /// The factory assigns salts from its own storage counter; its
    /// counter doubles as the progress ledger.
    Counter,
    /// The caller supplies `salt ++ init_code` (singleton-factory
    /// style); progress lives in a local JSON manifest.
    Salted,
}

#[derive(Debug, Args)]
pub struct NetworkCliArgs {
    /// HTTP JSON-RPC endpoint of the target node.
    #[arg(short, long, env = "STATEFILL_RPC_URL")]
    pub rpc_url: Url,

    /// Address of the factory contract to deploy through.
    #[arg(short, long)]
    pub factory: Address,

    #[arg(short, long, value_enum, default_value_t = DeployMode::Counter)]
    pub mode: DeployMode,

    /// Path of the JSON progress manifest (salted mode only).
    #[arg(long, default_value = "deployed_contracts.json")]
    pub manifest: PathBuf,
}
