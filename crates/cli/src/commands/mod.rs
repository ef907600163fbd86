mod common;
pub mod run;
pub mod status;

use clap::{Parser, Subcommand};

pub use common::{DeployMode, NetworkCliArgs};
pub use run::{run, RunCliArgs};
pub use status::{status, StatusCliArgs};

#[derive(Parser, Debug)]
#[command(
    name = "statefill",
    about = "Populate a test network with deterministic CREATE2 deployments"
)]
pub struct StatefillCli {
    #[command(subcommand)]
    pub command: StatefillSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum StatefillSubcommand {
    #[command(
        name = "run",
        long_about = "Deploy contracts through a factory in gas-limit-sized batches \
                      until the target count is reached. Resumes from the progress \
                      ledger when re-run."
    )]
    Run {
        #[command(flatten)]
        args: Box<RunCliArgs>,
    },

    #[command(name = "status", about = "Show deployment progress without sending anything")]
    Status {
        #[command(flatten)]
        args: StatusCliArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        StatefillCli::command().debug_assert();
    }

    #[test]
    fn run_args_parse_with_defaults() {
        let cli = StatefillCli::parse_from([
            "statefill",
            "run",
            "-r",
            "http://localhost:8545",
            "-f",
            "0x4e59b44847b379578588920ca78fbf26c0b4956c",
            "-n",
            "1000",
        ]);
        let StatefillSubcommand::Run { args } = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.count, 1000);
        assert_eq!(args.network.mode, DeployMode::Counter);
        assert_eq!(args.max_failures, 20);
        assert_eq!(args.tx_timeout, 60);
        assert!(args.gas_price.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn private_key_conflicts_with_from() {
        let result = StatefillCli::try_parse_from([
            "statefill",
            "run",
            "-r",
            "http://localhost:8545",
            "-f",
            "0x4e59b44847b379578588920ca78fbf26c0b4956c",
            "-n",
            "10",
            "-p",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            "--from",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
        ]);
        assert!(result.is_err());
    }
}
