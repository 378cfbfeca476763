//! uploadme entry point.

mod app;
mod config;
mod link;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Uploads files in fixed-size chunks, a few at a time.
#[derive(Parser, Debug)]
#[command(name = "uploadme")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "UPLOADME_CONFIG")]
    config: Option<PathBuf>,

    /// Directory to store uploads in (overrides the configuration)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// List completed uploads and exit
    #[arg(short, long)]
    list: bool,

    /// Files to upload
    #[arg(required_unless_present = "list")]
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting uploadme");

    let mut config = config::Config::load(args.config.as_deref())?;
    if let Some(store) = args.store {
        config.store_dir = store;
    }
    tracing::info!(
        store = %config.store_dir.display(),
        chunk_size = config.chunk_size,
        concurrency_limit = config.concurrency_limit,
        "configuration loaded"
    );

    if args.list {
        return app::list(&config);
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, args.files))
}
