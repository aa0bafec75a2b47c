//! CLI surface (§6), minimal: `replay_ethereum --block_db <dir> --db
//! <paths...> [--genesis_file <path>] [--nblocks N] [--load_snapshot
//! <dir>] [--dump_snapshot <dir>] [--nthreads N] [--nfibers N]
//! [--no-compaction] [--log_level LEVEL]`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "replay_ethereum", about = "Replay Ethereum blocks against the execution pipeline")]
pub struct Args {
    #[arg(long)]
    pub block_db: PathBuf,

    #[arg(long, required = true)]
    pub db: Vec<PathBuf>,

    #[arg(long)]
    pub genesis_file: Option<PathBuf>,

    #[arg(long, default_value_t = 0)]
    pub nblocks: u64,

    #[arg(long)]
    pub load_snapshot: Option<PathBuf>,

    #[arg(long)]
    pub dump_snapshot: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    pub nthreads: u32,

    #[arg(long, default_value_t = 1)]
    pub nfibers: u32,

    #[arg(long = "no-compaction")]
    pub no_compaction: bool,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}
