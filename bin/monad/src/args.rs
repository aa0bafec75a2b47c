//! CLI surface (§6), minimal: `monad --block_db <dir> --db <paths...>
//! --genesis_file <path> [--statesync_path <socket>]`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "monad", about = "Execution node")]
pub struct Args {
    #[arg(long)]
    pub block_db: PathBuf,

    #[arg(long, required = true)]
    pub db: Vec<PathBuf>,

    #[arg(long)]
    pub genesis_file: PathBuf,

    #[arg(long)]
    pub statesync_path: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}
