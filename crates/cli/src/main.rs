mod commands;

use clap::Parser;

use commands::{StatefillCli, StatefillSubcommand};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = StatefillCli::parse();
    match args.command {
        StatefillSubcommand::Run { args } => commands::run(*args).await?,
        StatefillSubcommand::Status { args } => commands::status(args).await?,
    }
    Ok(())
}
