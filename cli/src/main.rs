//! `stakeindex` — confirmed-block staking and ERC-20 event indexer.
//!
//! `run` polls each configured (contract, family) pair, replays confirmed
//! block ranges into SQLite, and resumes from per-pair checkpoints across
//! restarts. `status`, `reset`, and `info` are one-shot inspection and
//! maintenance commands against the same database.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{bail, Result};
use chrono::DateTime;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use stakeindex_core::checkpoint::{checkpoint_key, CheckpointStore};
use stakeindex_evm::{
    erc20_decoders, staking_decoders, EthClientConfig, EthRpcClient, PollScheduler, ReplayConfig,
    Replayer, ERC20_FAMILY, STAKING_FAMILY,
};
use stakeindex_storage::SqliteStorage;

const DEFAULT_DB: &str = "stakeindex.db";
const DEFAULT_CONFIRMATIONS: u64 = 12;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

#[derive(Parser)]
#[command(name = "stakeindex", version, about = "Confirmed-block staking event indexer")]
struct Cli {
    /// Emit logs as JSON instead of human-readable lines
    #[arg(long, env = "STAKEINDEX_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the replay engine until interrupted
    Run(RunOpts),
    /// Show per-pair checkpoints and stored event counts
    Status(DbOpts),
    /// Delete one pair's checkpoint so its next pass replays from the start block
    Reset(ResetOpts),
    /// Print the indexed event families and their signatures
    Info,
}

#[derive(Args)]
struct DbOpts {
    /// SQLite database path
    #[arg(long, env = "STAKEINDEX_DB", default_value = DEFAULT_DB)]
    db: String,
}

#[derive(Args)]
struct RunOpts {
    #[command(flatten)]
    db: DbOpts,

    /// JSON-RPC endpoint of an Ethereum-compatible node
    #[arg(long, env = "STAKEINDEX_RPC_URL")]
    rpc_url: String,

    /// Staking contract address
    #[arg(long, env = "STAKEINDEX_STAKING_CONTRACT")]
    staking_contract: Address,

    /// ERC-20 token contract to index (repeatable; comma-separated in env)
    #[arg(long = "token", env = "STAKEINDEX_TOKENS", value_delimiter = ',')]
    tokens: Vec<Address>,

    /// First block to scan for a pair with no checkpoint
    #[arg(long, env = "STAKEINDEX_START_BLOCK", default_value_t = 0)]
    start_block: u64,

    /// Blocks a log must be buried under the head before it is indexed
    #[arg(long, env = "STAKEINDEX_CONFIRMATIONS", default_value_t = DEFAULT_CONFIRMATIONS)]
    confirmations: u64,

    /// Seconds between passes for each pair
    #[arg(long, env = "STAKEINDEX_POLL_INTERVAL", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval: u64,

    /// RPC request timeout in seconds
    #[arg(long, env = "STAKEINDEX_RPC_TIMEOUT", default_value_t = DEFAULT_RPC_TIMEOUT_SECS)]
    rpc_timeout: u64,
}

#[derive(Args)]
struct ResetOpts {
    #[command(flatten)]
    db: DbOpts,

    /// Event family of the checkpoint to delete
    #[arg(long)]
    family: String,

    /// Contract address of the checkpoint to delete
    #[arg(long)]
    contract: Address,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run(opts) => cmd_run(opts).await,
        Commands::Status(opts) => cmd_status(opts).await,
        Commands::Reset(opts) => cmd_reset(opts).await,
        Commands::Info => {
            cmd_info();
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn cmd_run(opts: RunOpts) -> Result<()> {
    let storage = Arc::new(SqliteStorage::open(&opts.db.db).await?);
    let client = Arc::new(EthRpcClient::new(
        opts.rpc_url,
        EthClientConfig {
            request_timeout: Duration::from_secs(opts.rpc_timeout),
        },
    )?);
    let interval = Duration::from_secs(opts.poll_interval);

    let mut scheduler = PollScheduler::new();
    scheduler.spawn(
        Replayer::new(
            client.clone(),
            storage.clone(),
            storage.clone(),
            ReplayConfig {
                family: STAKING_FAMILY.into(),
                contract: opts.staking_contract,
                start_block: opts.start_block,
                confirmations: opts.confirmations,
            },
            staking_decoders(),
        ),
        interval,
    );

    let mut seen = HashSet::new();
    for token in opts.tokens {
        // the zero address stands in for "no token configured"
        if token == Address::ZERO || !seen.insert(token) {
            continue;
        }
        scheduler.spawn(
            Replayer::new(
                client.clone(),
                storage.clone(),
                storage.clone(),
                ReplayConfig {
                    family: ERC20_FAMILY.into(),
                    contract: token,
                    start_block: opts.start_block,
                    confirmations: opts.confirmations,
                },
                erc20_decoders(),
            ),
            interval,
        );
    }

    info!(
        pairs = scheduler.pair_count(),
        db = %opts.db.db,
        confirmations = opts.confirmations,
        "replay engine started"
    );

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, stopping pairs");
    scheduler.shutdown().await;
    Ok(())
}

async fn cmd_status(opts: DbOpts) -> Result<()> {
    let storage = SqliteStorage::open(&opts.db).await?;

    let checkpoints = storage.checkpoints().await?;
    if checkpoints.is_empty() {
        println!("no checkpoints recorded");
    } else {
        println!("checkpoints:");
        for cp in checkpoints {
            let updated = DateTime::from_timestamp(cp.updated_at, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| cp.updated_at.to_string());
            println!("  {:<56} block {:>10}  updated {updated}", cp.key, cp.block_number);
        }
    }

    let counts = storage.event_counts().await?;
    if counts.is_empty() {
        println!("no events stored");
    } else {
        println!("events:");
        for (name, count) in counts {
            println!("  {name:<24} {count}");
        }
    }
    Ok(())
}

async fn cmd_reset(opts: ResetOpts) -> Result<()> {
    if opts.family != STAKING_FAMILY && opts.family != ERC20_FAMILY {
        bail!(
            "unknown event family '{}'; expected '{STAKING_FAMILY}' or '{ERC20_FAMILY}'",
            opts.family
        );
    }

    let storage = SqliteStorage::open(&opts.db.db).await?;
    let key = checkpoint_key(&opts.family, &opts.contract.to_checksum(None));
    storage.delete(&key).await?;

    println!("checkpoint '{key}' deleted; the next pass replays from the configured start block");
    Ok(())
}

fn cmd_info() {
    println!("defaults:");
    println!("  db             {DEFAULT_DB}");
    println!("  start-block    0");
    println!("  confirmations  {DEFAULT_CONFIRMATIONS}");
    println!("  poll-interval  {DEFAULT_POLL_INTERVAL_SECS}s");
    println!("  rpc-timeout    {DEFAULT_RPC_TIMEOUT_SECS}s");
    println!();
    println!("event families:");
    for (family, decoders) in [
        (STAKING_FAMILY, staking_decoders()),
        (ERC20_FAMILY, erc20_decoders()),
    ] {
        println!("  {family}:");
        for decoder in decoders {
            println!("    {:<24} topic0 {}", decoder.event_name(), decoder.signature());
        }
    }
}
