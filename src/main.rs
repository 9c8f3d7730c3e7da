use anyhow::{Context, Result};
use clap::Parser;
use pathdiff::diff_paths;
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

mod console;
mod tracker;

use console::Console;

#[global_allocator]
static ALLOCATOR: tracker::TrackingAllocator = tracker::TrackingAllocator;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Read commands from this file instead of standard input
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Echo each command before running it
    #[arg(short, long)]
    echo: bool,

    /// Fail every N-th queue allocation (0 disables)
    #[arg(long, default_value_t = 0)]
    fail_every: usize,

    /// Log more (repeat for even more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Show a path relative to the current directory, when there is one.
fn display_path(path: &Path) -> String {
    env::current_dir()
        .ok()
        .and_then(|cwd| diff_paths(path, cwd))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(io::stderr)
                .with_filter(filter),
        )
        .init();
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    init_logging(args.verbose);

    let mut console = Console::new(io::stdout().lock());
    console.set_echo(args.echo);

    if args.fail_every > 0 {
        info!(every = args.fail_every, "injecting allocation failures");
    }
    tracker::set_fail_every(args.fail_every);

    let errors = match &args.file {
        Some(path) => {
            let source = display_path(path);
            let file =
                File::open(path).with_context(|| format!("failed to open script {source}"))?;
            console.run(BufReader::new(file), &source)
        }
        None => console.run(io::stdin().lock(), "<stdin>"),
    };

    if errors > 0 {
        warn!(errors, "finished with errors");
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
