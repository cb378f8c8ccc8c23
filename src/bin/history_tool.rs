use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use num_bigint::BigInt;
use serde_json::json;
use std::path::{Path, PathBuf};
use token_history::{
    AggregateRecord, DurabilityMode, FileRecordStore, FixedUpstream, HistoryAccessor, InvocationContext,
    RecordKey, RecordStore,
};

#[derive(Parser)]
#[command(name = "history-tool")]
#[command(about = "Inspect and initialize token history stores")]
struct Cli {
    /// WAL durability: sync, async or none
    #[arg(long, global = true, default_value = "sync")]
    durability: DurabilityMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the history record for a token unless it already exists
    Init {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        token: RecordKey,
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        supply: BigInt,
    },
    /// Print the history record of a token as JSON
    Show {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        token: RecordKey,
    },
    /// Snapshot the store and truncate its WAL
    Checkpoint {
        #[arg(long)]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init {
            data_dir,
            token,
            name,
            symbol,
            supply,
        } => init(&data_dir, cli.durability, token, FixedUpstream::new(supply, &name, &symbol)),
        Command::Show { data_dir, token } => show(&data_dir, cli.durability, &token),
        Command::Checkpoint { data_dir } => checkpoint(&data_dir, cli.durability),
    }
}

fn open_store(data_dir: &Path, durability: DurabilityMode) -> Result<FileRecordStore> {
    FileRecordStore::open(data_dir, durability)
        .with_context(|| format!("Failed to open history store at '{}'", data_dir.display()))
}

/// Open a store that must already exist; read-only commands never create one.
fn open_existing_store(data_dir: &Path, durability: DurabilityMode) -> Result<FileRecordStore> {
    if !data_dir.is_dir() {
        return Err(anyhow!("No history store at '{}'", data_dir.display()));
    }
    open_store(data_dir, durability)
}

fn init(data_dir: &Path, durability: DurabilityMode, token: RecordKey, upstream: FixedUpstream) -> Result<()> {
    let accessor = HistoryAccessor::new(open_store(data_dir, durability)?, upstream);
    let lookup = accessor
        .lookup(&token, &InvocationContext::none())
        .with_context(|| format!("Failed to initialize history for {}", token))?;

    if lookup.was_created() {
        println!("Created history record for {}", token);
    } else {
        println!("History record for {} already exists; left unchanged", token);
    }
    println!("{}", render(lookup.record())?);
    Ok(())
}

fn show(data_dir: &Path, durability: DurabilityMode, token: &RecordKey) -> Result<()> {
    let store = open_existing_store(data_dir, durability)?;
    let record = store
        .load(token)?
        .ok_or_else(|| anyhow!("No history record for {} in '{}'", token, data_dir.display()))?;
    println!("{}", render(&record)?);
    Ok(())
}

fn checkpoint(data_dir: &Path, durability: DurabilityMode) -> Result<()> {
    let store = open_existing_store(data_dir, durability)?;
    store
        .checkpoint()
        .with_context(|| format!("Failed to checkpoint '{}'", data_dir.display()))?;
    println!("Checkpointed {} record(s) in {}", store.len()?, data_dir.display());
    Ok(())
}

fn render(record: &AggregateRecord) -> Result<String> {
    let value = json!({
        "id": record.key.to_string(),
        "name": record.name,
        "symbol": record.symbol,
        "totalSupply": record.total_supply.to_string(),
        "tokenTransferCount": record.transfer_count.to_string(),
        "tokenHolderCount": record.holder_count.to_string(),
        "totalAddressCount": record.address_count.to_string(),
    });
    serde_json::to_string_pretty(&value).context("Failed to render record")
}
