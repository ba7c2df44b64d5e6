use alloy_primitives::{
    Address,
    U256,
};
use bingo_client::model::{
    CardDimensions,
    WinPatterns,
};
use clap::{
    ArgGroup,
    Parser,
    Subcommand,
};
use color_eyre::eyre::Result;
use deployments::DeploymentEnv;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod commands;
mod render;

#[cfg(test)]
mod tests;

const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:8545";
const LOG_FILE_PREFIX: &str = "bingo.log";

#[derive(Parser, Debug)]
#[command(
    name = "bingo",
    about = "Play on-chain bingo: inspect rounds and cards, send game transactions",
    version,
    group(
        ArgGroup::new("network")
            .args(["dev", "test", "local"])
            .required(true)
    )
)]
pub struct Args {
    /// Use the devnet deployment
    #[arg(long)]
    dev: bool,

    /// Use the testnet deployment
    #[arg(long)]
    test: bool,

    /// Use the deployment on a local node
    #[arg(long)]
    local: bool,

    /// Override RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Send transactions from this account (defaults to the node's first account)
    #[arg(long)]
    from: Option<Address>,

    /// Print logs to stderr, filtered by RUST_LOG
    #[arg(long)]
    tracing: bool,

    /// Write daily log files into this directory
    #[arg(long)]
    log_dir: Option<String>,

    /// How often a pending transaction is polled
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Give up waiting on a transaction after this long
    #[arg(long)]
    max_wait_secs: Option<u64>,

    /// Blocks a receipt needs before it counts as confirmed
    #[arg(long)]
    confirmations: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show a round, read fresh from the chain
    Round { id: u64 },
    /// Show a card and its numbers
    Card { id: u64 },
    /// Show the most recent round, if any
    CurrentRound,
    /// Buy a new card at the current price
    CreateCard {
        /// Rows x columns, e.g. 5x5
        dimensions: CardDimensions,
    },
    /// Register the numbers of a card, row by row
    RegisterNumbers {
        card: u64,
        #[arg(value_delimiter = ',', num_args = 1.., required = true)]
        numbers: Vec<u8>,
    },
    /// Give a card to another account
    TransferCard { card: u64, to: Address },
    /// Open a new round
    StartRound {
        #[arg(long, default_value_t = 75)]
        max_number: u8,
        /// Entry fee in ether, e.g. 0.01
        #[arg(long, value_parser = parse_ether)]
        entry_fee: U256,
        #[arg(long, default_value_t = 3600)]
        timeout_secs: u64,
        /// Comma separated: row, column, diagonal, corners, full-house
        #[arg(long, default_value = "full-house")]
        patterns: WinPatterns,
    },
    /// Request the next number of a round
    Draw { round: u64 },
    /// Join a round with a registered card, paying its entry fee
    Join { round: u64, card: u64 },
    /// Pay out a finished round
    Distribute { round: u64 },
    /// List the events of a round
    History {
        round: u64,
        /// Defaults to the recorded deployment block
        #[arg(long)]
        from_block: Option<u64>,
    },
    /// Record where the contracts were deployed on the selected network
    RecordDeployment {
        #[arg(long)]
        cartela: Address,
        #[arg(long)]
        bingo_game: Address,
        /// Block the contracts were deployed at
        #[arg(long)]
        block: Option<u64>,
    },
}

impl Args {
    fn env(&self) -> DeploymentEnv {
        if self.dev {
            DeploymentEnv::Dev
        } else if self.test {
            DeploymentEnv::Test
        } else {
            DeploymentEnv::Local
        }
    }
}

fn parse_ether(raw: &str) -> Result<U256, String> {
    alloy_primitives::utils::parse_ether(raw.trim()).map_err(|e| e.to_string())
}

fn init_tracing(to_stderr: bool, log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let dir = shellexpand::tilde(dir).into_owned();
            let (writer, guard) =
                tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let _ = fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(writer)
                .try_init();
            Some(guard)
        }
        None if to_stderr => {
            let _ = fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
        None => None,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _guard = init_tracing(args.tracing, args.log_dir.as_deref());
    tracing::debug!(env = %args.env(), "starting bingo");
    commands::run(args).await
}
