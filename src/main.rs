use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use risusave::block::BlockType;
use risusave::codec::Compression;
use risusave::container::Container;
use risusave::dirty::DirtyTracker;
use risusave::merge::{merge_delta, Delta};
use risusave::sync::{
    FileTokenStore, MemoryTokenStore, PasswordPrompt, PromptKind, SyncClient, SyncConfig,
    SyncError, TokenStore,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "risusave", about = "RISUSAVE container and delta sync CLI")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the blocks of a container
    List {
        input: PathBuf,
    },
    /// Print the decoded content of one block
    Cat {
        input: PathBuf,
        name:  String,
    },
    /// Build a container from files given as NAME=TYPE:PATH
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        /// Compression: gzip (default) or stored
        #[arg(short, long, default_value = "gzip")]
        compression: String,
        #[arg(required = true, num_args = 1..)]
        blocks: Vec<String>,
    },
    /// Apply a delta JSON file ({"blocks": {...}, "deleted": [...]}) locally
    Merge {
        input: PathBuf,
        #[arg(short, long)]
        delta: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Upload every block of a container (plus deletions) as one delta
    Push {
        input: PathBuf,
        /// Block names to delete remotely
        #[arg(long)]
        delete: Vec<String>,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Generic blob storage on the server
    Remote {
        #[command(flatten)]
        remote: RemoteArgs,
        #[command(subcommand)]
        op: RemoteOp,
    },
}

#[derive(clap::Args)]
struct RemoteArgs {
    /// Server URL (default: $RISUSAVE_URL or http://127.0.0.1:6001)
    #[arg(long)]
    url: Option<String>,
    /// Directory for the persisted auth token (default: $RISUSAVE_TOKEN_DIR)
    #[arg(long)]
    token_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum RemoteOp {
    /// List stored keys
    Ls,
    /// Download a blob
    Get {
        key: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Upload a file as a blob
    Put {
        key:   String,
        input: PathBuf,
    },
    /// Delete a blob
    Rm {
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info".into()),
        1 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input } => {
            let container = Container::decode(&std::fs::read(&input)?)?;
            println!("Container: {}", input.display());
            println!("{:<40} {:<10} {:<7} {:>10}", "Name", "Type", "Codec", "Raw size");
            for block in container.iter() {
                let kind = block.kind().map(|k| k.name().to_string())
                    .unwrap_or_else(|| format!("#{}", block.block_type));
                println!("{:<40} {:<10} {:<7} {:>10}",
                    block.name, kind, block.compression.name(), block.raw.len());
            }
            for name in container.dropped() {
                println!("{:<40} (dropped: payload failed to decompress)", name);
            }
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { input, name } => {
            let container = Container::decode(&std::fs::read(&input)?)?;
            let block = container.get(&name)
                .ok_or_else(|| format!("no block named {name:?}"))?;
            println!("{}", block.content.as_deref().unwrap_or_default());
        }

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, compression, blocks } => {
            let compression = parse_compression(&compression);
            let mut container = Container::new();
            for spec in &blocks {
                let (name, block_type, path) = parse_block_spec(spec)?;
                let content = std::fs::read_to_string(&path)?;
                container.insert_block(block_type, compression, &name, &content)?;
                println!("  packed  {} ({})", name, block_type.name());
            }
            std::fs::write(&output, container.encode())?;
            println!("Created: {}", output.display());
        }

        // ── Merge ────────────────────────────────────────────────────────────
        Commands::Merge { input, delta, output } => {
            let existing = std::fs::read(&input)?;
            let delta: Delta = serde_json::from_slice(&std::fs::read(&delta)?)?;
            let merged = merge_delta(&existing, &delta, Compression::Gzip)?;
            std::fs::write(&output, &merged)?;
            println!("Merged → {} ({} bytes)", output.display(), merged.len());
        }

        // ── Push ─────────────────────────────────────────────────────────────
        Commands::Push { input, delete, remote } => {
            let container = Container::decode(&std::fs::read(&input)?)?;
            let client = open_client(remote)?;

            let mut tracker = DirtyTracker::new();
            tracker.enable();
            for name in container.names() {
                tracker.mark_dirty(name);
            }
            for name in &delete {
                tracker.mark_deleted(name);
            }
            match client.flush(&mut tracker, &container).await? {
                Some(report) => println!("Synced: success={} size={}",
                    report.success,
                    report.size.map(|s| s.to_string()).unwrap_or_else(|| "?".into())),
                None => println!("Nothing to sync"),
            }
        }

        // ── Remote ───────────────────────────────────────────────────────────
        Commands::Remote { remote, op } => {
            let client = open_client(remote)?;
            match op {
                RemoteOp::Ls => {
                    for key in client.list().await? {
                        println!("{key}");
                    }
                }
                RemoteOp::Get { key, output } => match client.read(&key).await? {
                    Some(data) => {
                        std::fs::write(&output, &data)?;
                        println!("Saved {} bytes → {}", data.len(), output.display());
                    }
                    None => println!("No data stored under {key:?}"),
                },
                RemoteOp::Put { key, input } => {
                    client.write(&key, &std::fs::read(&input)?).await?;
                    println!("Stored {}", key);
                }
                RemoteOp::Rm { key } => {
                    client.remove(&key).await?;
                    println!("Removed {}", key);
                }
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

struct StdinPrompt;

#[async_trait]
impl PasswordPrompt for StdinPrompt {
    async fn prompt(&self, kind: PromptKind) -> Result<String, SyncError> {
        match kind {
            PromptKind::SetPassword   => eprint!("Set a password for the storage server: "),
            PromptKind::EnterPassword => eprint!("Storage server password: "),
        }
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| SyncError::Prompt(e.to_string()))?;
        if line.is_empty() {
            return Err(SyncError::Prompt("stdin closed".into()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

fn open_client(args: RemoteArgs) -> Result<SyncClient, SyncError> {
    let mut config = SyncConfig::from_env();
    if let Some(url) = args.url {
        config.base_url = url;
    }
    if args.token_dir.is_some() {
        config.token_dir = args.token_dir;
    }
    let tokens: Arc<dyn TokenStore> = match &config.token_dir {
        Some(dir) => Arc::new(FileTokenStore::new(dir)),
        None      => Arc::new(MemoryTokenStore::default()),
    };
    SyncClient::new(config, Arc::new(StdinPrompt), tokens)
}

fn parse_compression(s: &str) -> Compression {
    Compression::from_name(s).unwrap_or_else(|| {
        eprintln!("Unknown compression '{}', defaulting to gzip", s);
        Compression::Gzip
    })
}

/// `NAME=TYPE:PATH`, e.g. `root=root:./root.json`.
fn parse_block_spec(spec: &str) -> Result<(String, BlockType, PathBuf), String> {
    let (name, rest) = spec.split_once('=')
        .ok_or_else(|| format!("expected NAME=TYPE:PATH, got {spec:?}"))?;
    let (kind, path) = rest.split_once(':')
        .ok_or_else(|| format!("expected NAME=TYPE:PATH, got {spec:?}"))?;
    let block_type = BlockType::from_name(kind)
        .ok_or_else(|| format!("unknown block type {kind:?}"))?;
    Ok((name.to_string(), block_type, Path::new(path).to_path_buf()))
}
