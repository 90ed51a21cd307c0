mod config;
mod filesystem;
mod protocol;
mod server;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{parse_root_arg, Config};
use filesystem::config::PaginationStrategy;
use filesystem::roots::{RootConfig, RootRegistry};
use filesystem::FileSystemService;
use server::AppState;

/// Browse, page through and search text files under sandboxed roots.
#[derive(Parser, Debug)]
#[command(name = "rootview")]
#[command(version, about)]
struct Cli {
    /// JSON config file (defaults to ./config.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// IP address to bind
    #[arg(long)]
    bind: Option<String>,

    /// HTTP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Root directory as NAME=PATH or PATH; repeat for several roots.
    /// Replaces the roots from the config file.
    #[arg(long = "root", value_parser = parse_root_arg)]
    roots: Vec<RootConfig>,

    /// Directory holding index.html and front-end assets
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Enable mkdir, upload and delete
    #[arg(long)]
    allow_writes: bool,

    /// Lines per page
    #[arg(long)]
    page_size: Option<usize>,

    /// Files at or above this many bytes are streamed instead of read whole
    #[arg(long)]
    large_file_threshold: Option<u64>,

    /// How streamed files are paginated
    #[arg(long, value_enum)]
    pagination: Option<PaginationStrategy>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if !self.roots.is_empty() {
            config.root_dir = None;
            config.roots = self.roots;
        }
        if let Some(dir) = self.static_dir {
            config.static_dir = dir;
        }
        if self.allow_writes {
            config.filesystem.allow_writes = true;
        }
        if let Some(page_size) = self.page_size {
            config.filesystem.page_size = page_size;
        }
        if let Some(threshold) = self.large_file_threshold {
            config.filesystem.large_file_threshold = threshold;
        }
        if let Some(strategy) = self.pagination {
            config.filesystem.pagination_strategy = strategy;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let addr = config.bind_addr()?;
    let registry = RootRegistry::new(&config.root_configs())?;
    if config.filesystem.allow_writes {
        tracing::warn!("Write operations are enabled");
    }
    tracing::info!(
        "Page size {} lines, streaming files from {} bytes ({:?})",
        config.filesystem.page_size,
        config.filesystem.large_file_threshold,
        config.filesystem.pagination_strategy
    );

    let fs = FileSystemService::new(config.filesystem, registry);
    server::run(addr, AppState::new(fs, config.static_dir)).await?;
    Ok(())
}
