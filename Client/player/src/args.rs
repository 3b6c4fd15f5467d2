use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "A headless adaptive-streaming client that plays a local smooth-streaming asset."
)]
pub struct Args {
    /// Manifest XML file to play.
    #[arg(short, long)]
    pub manifest: PathBuf,
    /// URL the manifest would have been fetched from; relative chunk
    /// URLs resolve against it.
    #[arg(short = 'u', long, default_value = "http://localhost/stream.ism/Manifest")]
    pub manifest_url: String,
    /// Directory holding <stream>/<bitrate>/<chunk>.m4f files; chunks
    /// missing from it are synthesized.
    #[arg(short, long)]
    pub chunk_dir: Option<PathBuf>,
    /// Heuristics configuration JSON; defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Seconds to run before shutting down.
    #[arg(short, long, default_value = "30")]
    pub duration: u64,
    /// Simulated pipe rate in bits/sec for local and synthetic chunks.
    #[arg(long, default_value = "6000000")]
    pub pipe: u64,
    /// Degrade the simulated frame-rate stats after this many seconds.
    #[arg(long)]
    pub degrade_after: Option<u64>,
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

pub fn parse_args() -> Args {
    Args::parse()
}

pub fn get_log_level_filter(args: &Args) -> LevelFilter {
    // Map the LogLevel enum to the LevelFilter enum
    match args.log_level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}
