#![forbid(unsafe_code)]
//! blkscrub CLI - destructive write/read-verify test of a block device

use anyhow::{Context, Result, bail};
use blkscrub::types::DEFAULT_PROGRESS_INTERVAL;
use blkscrub::{FileBlockDevice, FillMethod, ScrubEngine, ScrubOptions, Seed};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod console;
mod mounts;

use console::ConsoleProgress;

#[derive(Parser)]
#[command(name = "blkscrub")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Skip the mount check and the confirmation prompt
    #[arg(short, long)]
    force: bool,

    /// Write pseudo-random data instead of the fixed ramp pattern
    #[arg(short, long)]
    random: bool,

    /// Wipe only; don't read the data back
    #[arg(short, long, alias = "wipeonly")]
    wipe_only: bool,

    /// Seed for --random (defaults to the current time)
    #[arg(long)]
    seed: Option<u64>,

    /// Report progress every N blocks
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: u64,

    /// Print the session result as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Block device (or image file) to test. All data on it is destroyed.
    device: PathBuf,
}

impl Cli {
    fn scrub_options(&self) -> ScrubOptions {
        ScrubOptions {
            fill_method: if self.random {
                FillMethod::Random
            } else {
                FillMethod::Fixed
            },
            wipe_only: self.wipe_only,
            seed: self.seed.map(Seed),
            progress_interval: self.progress_interval,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("error: {error:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Returns whether the device passed. A cancelled prompt counts as a pass.
fn run(cli: &Cli) -> Result<bool> {
    let device = &cli.device;

    if !cli.force && mounts::is_mounted(device)? {
        bail!("device {} appears to be mounted", device.display());
    }

    let dev = FileBlockDevice::open(device)
        .with_context(|| format!("can't open {} for read/write", device.display()))?;
    debug!(
        path = %dev.path().display(),
        mode = ?dev.mode(),
        block_device = dev.is_block_device(),
        "device opened"
    );

    if !cli.force {
        let mut stdout = io::stdout().lock();
        if !console::confirm(&mut io::stdin().lock(), &mut stdout, device)? {
            writeln!(stdout, "Operation cancelled")?;
            return Ok(true);
        }
    }

    let options = cli.scrub_options();
    let engine = ScrubEngine::new(dev, options)
        .with_context(|| format!("can't get capacity of {}", device.display()))?;
    info!(seed = engine.seed().0, "session seed");

    // With --json, stdout carries the result document only.
    let result = if cli.json {
        console::print_geometry(&mut io::stderr(), &engine.geometry())?;
        engine.run(&mut ConsoleProgress::new(io::stderr(), io::stderr()))
    } else {
        console::print_geometry(&mut io::stdout(), &engine.geometry())?;
        engine.run(&mut ConsoleProgress::new(io::stdout(), io::stderr()))
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("serialize result")?
        );
    } else if result.passed() {
        println!("Test passed");
    } else {
        println!("Test failed");
    }
    info!(%result, "done");

    Ok(result.passed())
}
