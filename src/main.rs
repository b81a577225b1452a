mod config;
mod controller;
mod error;
mod event;
mod keys;
mod pipeline;
mod plan;
mod processor;
mod storage;
mod utils;


#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;

use crate::config::RuntimeConfig;
use crate::event::S3Event;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[clap(author, version, about = "Generates resized variants of newly stored images.")]
struct Args {
    /// The path to the YAML runtime config.
    #[clap(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    config: PathBuf,

    /// Whitespace separated `WxH=suffix` sizes, replacing the ones in the config.
    #[clap(long, env = "TARGET_SIZES")]
    target_sizes: Option<String>,

    /// The S3 event notification to handle, read from stdin if not given.
    #[clap(short, long)]
    event: Option<PathBuf>,

    /// Abandon any in-flight fetches and uploads after this many seconds.
    #[clap(long, env = "DEADLINE_SECS")]
    deadline_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = Args::parse();
    let deadline = args
        .deadline_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    let mut cfg = RuntimeConfig::from_file(&args.config)?;
    if let Some(sizes) = args.target_sizes.as_deref() {
        cfg.override_target_sizes(sizes);
    }

    if let Some(level) = cfg.log_level.as_level() {
        tracing_subscriber::fmt().with_max_level(level).init();
    }

    let event = S3Event::from_slice(&read_event(args.event).await?)?;
    let storage = cfg.backend.connect()?;

    let summary = controller::handle(&cfg, storage, &event, deadline).await?;
    println!("{}", summary);

    Ok(())
}

async fn read_event(path: Option<PathBuf>) -> Result<Vec<u8>> {
    if let Some(path) = path {
        return Ok(tokio::fs::read(path).await?);
    }

    let mut buff = Vec::new();
    tokio::io::stdin().read_to_end(&mut buff).await?;
    Ok(buff)
}
