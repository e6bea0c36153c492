use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use abidex::{config, AbiDecoder, AbiRepository, AbiResolver, AbiScanner, AbiStore, DynAbiDecoder};
use alloy_primitives::U256;

#[derive(Debug, Parser)]
#[command(
    name = "abidex",
    version,
    about = "Contract-ABI registry and signature resolution toolkit"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan directories for ABI artifacts and report what was found
    Scan {
        /// Roots to scan (defaults to abi_paths from the config file)
        #[arg(long)]
        path: Vec<PathBuf>,
    },

    /// Look up a 4-byte selector against registered ABIs
    Lookup {
        /// Selector, e.g. 0xa9059cbb
        selector: String,
    },

    /// Decode calldata against registered ABIs
    Decode {
        /// Calldata hex (with or without 0x prefix)
        data: String,

        /// Restrict to one contract: chain id (requires --address)
        #[arg(long)]
        chain: Option<u64>,

        /// Restrict to one contract: address (requires --chain)
        #[arg(long)]
        address: Option<String>,
    },

    /// Resolve a selector from the remote signature databases
    Resolve {
        /// Selector, e.g. 0xa9059cbb
        selector: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let cfg = config::load();

    match args.command {
        Command::Scan { path } => scan(&cfg, path),
        Command::Lookup { selector } => lookup(&cfg, &selector),
        Command::Decode { data, chain, address } => decode(&cfg, &data, chain, address.as_deref()),
        Command::Resolve { selector } => resolve(&cfg, &selector).await,
    }
}

/// Build a repository from the persistent cache plus configured scan roots.
fn build_repository(cfg: &config::Config) -> Result<AbiRepository> {
    let repository = AbiRepository::new();

    if let Some(db_path) = cfg.cache_db_path() {
        if db_path.exists() {
            AbiStore::open(&db_path)?.load_into(&repository)?;
        }
    }

    let roots = cfg.scan_roots();
    let report = AbiScanner::scan_roots(&roots, &repository);
    for error in &report.errors {
        tracing::warn!(%error, "artifact skipped");
    }

    Ok(repository)
}

fn scan(cfg: &config::Config, paths: Vec<PathBuf>) -> Result<()> {
    let repository = AbiRepository::new();
    let mut roots = cfg.scan_roots();
    roots.extend(paths);
    if roots.is_empty() {
        roots.push(PathBuf::from("."));
    }

    let report = AbiScanner::scan_roots(&roots, &repository);
    println!(
        "scanned {} files, registered {} contracts in {} ms",
        report.scanned_files, report.loaded_contracts, report.scan_ms
    );
    for error in &report.errors {
        println!("  skipped: {}", error);
    }
    Ok(())
}

fn lookup(cfg: &config::Config, selector: &str) -> Result<()> {
    let repository = build_repository(cfg)?;

    let functions = repository.functions_for_signature(selector);
    let errors = repository.errors_for_signature(selector);
    if functions.is_empty() && errors.is_empty() {
        println!("no registered member matches {}", selector);
        return Ok(());
    }

    for function in functions {
        println!("function {}  [{}]", function.signature(), function.selector_hex());
    }
    for error in errors {
        println!("error    {}  [{}]", error.signature(), error.selector_hex());
    }
    Ok(())
}

fn decode(
    cfg: &config::Config,
    data: &str,
    chain: Option<u64>,
    address: Option<&str>,
) -> Result<()> {
    let repository = build_repository(cfg)?;

    let candidates = match (chain.or(cfg.chain_id), address) {
        (Some(chain), Some(address)) => repository
            .find_function_by_input_data(U256::from(chain), address, data)
            .into_iter()
            .collect(),
        (None, Some(_)) => bail!("--address requires --chain (or chain_id in the config file)"),
        _ => repository.functions_for_input_data(data),
    };

    if candidates.is_empty() {
        bail!("no registered function matches this calldata");
    }

    let stripped = data
        .strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
        .unwrap_or(data);
    let bytes = hex::decode(stripped)?;

    let decoder = DynAbiDecoder::new();
    for function in candidates {
        match decoder.decode_call(&function, &bytes) {
            Ok(decoded) => {
                println!("{}", decoded.signature);
                for arg in decoded.arguments {
                    println!("  {}: {} = {}", arg.name, arg.kind, arg.value);
                }
            }
            Err(err) => println!("{}: {}", function.signature(), err),
        }
    }
    Ok(())
}

async fn resolve(cfg: &config::Config, selector: &str) -> Result<()> {
    if cfg.offline {
        bail!("remote resolution disabled by config (offline = true)");
    }

    let Some(bytes) = abidex::signature::selector_from_hex(selector) else {
        bail!("'{}' is not a 4-byte selector", selector);
    };

    let resolver = AbiResolver::new();
    match resolver.lookup_selector(bytes).await? {
        Some(resolved) => {
            println!("{}", resolved.signature);

            // Keep the resolution for offline use.
            if let Some(db_path) = cfg.cache_db_path() {
                if let Some(parent) = db_path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                let store = AbiStore::open(&db_path)?;
                store.save_signature(
                    &format!("0x{}", hex::encode(bytes)),
                    &resolved.name,
                    &resolved.signature,
                )?;
            }
        }
        None => println!("selector {} not found in remote databases", selector),
    }
    Ok(())
}
