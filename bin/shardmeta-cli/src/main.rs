//! Shardmeta CLI - node state inspection
//!
//! Reads (and for `import`, writes) the metadata persisted in a node data
//! directory. Output goes to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use shardmeta_common::{GatewayConfig, Index};
use shardmeta_state::{MetaData, MetaDataDocument, MetaStateService};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "shardmeta")]
#[command(about = "Shardmeta node state inspection")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/shardmeta/node.toml")]
    config: String,

    /// Node data directory (overrides the configuration file)
    #[arg(short, long, env = "SHARDMETA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the full state: global state merged with every index state
    Dump,
    /// Print the global state only
    Global,
    /// Print every index state, checking folder names against index UUIDs
    Indices {
        /// Folder identifiers to skip
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Print the state of one index
    Index {
        /// Index name
        name: String,
        /// Index UUID
        uuid: String,
    },
    /// Decode a global state payload and write it as the node's global state
    Import {
        /// JSON text payload
        #[arg(long, conflicts_with = "binary")]
        json: Option<PathBuf>,
        /// Binary payload
        #[arg(long)]
        binary: Option<PathBuf>,
        /// Reason recorded in the write diagnostics
        #[arg(long, default_value = "import")]
        reason: String,
    },
}

fn load_config(args: &Args) -> Result<GatewayConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(&args.config).required(false))
        .add_source(config::Environment::with_prefix("SHARDMETA").separator("__"))
        .build()
        .with_context(|| format!("failed to read configuration {}", args.config))?;
    let mut gateway: GatewayConfig = settings
        .try_deserialize()
        .context("invalid configuration")?;
    if let Some(data_dir) = &args.data_dir {
        gateway.data_dir = data_dir.clone();
    }
    Ok(gateway)
}

fn print_json(document: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(document)?);
    Ok(())
}

fn print_metadata(metadata: &MetaData) -> Result<()> {
    print_json(&MetaDataDocument::from(metadata))
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args)?;
    let service = MetaStateService::open(&config)
        .with_context(|| format!("failed to open node state at {:?}", config.data_dir))?;

    match args.command {
        Commands::Dump => print_metadata(&service.load_full_state()?)?,
        Commands::Global => print_metadata(&service.load_global_state()?)?,
        Commands::Indices { exclude } => {
            let indices = service.load_indices_states(|folder| exclude.iter().any(|e| e == folder))?;
            print_json(&indices)?;
        }
        Commands::Index { name, uuid } => {
            let index = Index::new(name, uuid)?;
            match service.load_index_state(&index)? {
                Some(index_metadata) => print_json(&index_metadata)?,
                None => bail!("no state persisted for {index}"),
            }
        }
        Commands::Import {
            json,
            binary,
            reason,
        } => {
            let metadata = match (json, binary) {
                (Some(path), None) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    service.load_global_state_from_str(&text)?
                }
                (None, Some(path)) => {
                    let bytes = std::fs::read(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    service.load_global_state_from_bytes(&bytes)?
                }
                _ => bail!("exactly one of --json or --binary is required"),
            };
            service.write_global_state(&reason, &metadata)?;
            info!(
                "Imported global state for cluster {} (version {})",
                metadata.cluster_uuid(),
                metadata.version()
            );
        }
    }

    Ok(())
}
