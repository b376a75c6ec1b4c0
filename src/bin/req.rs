//! Fire N simultaneous GETs at one URL and report on each of them.
//!
//! Run examples:
//! # 100 concurrent requests
//! cargo run --bin req -- -u http://127.0.0.1:8080/ -t 100
//!
//! # Save every body under ./out and verify against a known payload
//! cargo run --bin req -- -u http://127.0.0.1:8080/big.bin -t 50 -S -P out -F big.bin
//!
//! # Raise the open file limit and shrink worker stacks for large populations
//! cargo run --bin req -- -u http://127.0.0.1:8080/ -t 5000 --max-open-files 20000 --stack-size 262144

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use req_harness::report::header_line;
use req_harness::unit::RequestUnit;
use req_harness::{limits, summarize, Dispatcher, HttpTransfer, RunConfig, MAX_POPULATION};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

// ============================================================================
// CLI ARGUMENTS
// ============================================================================

#[derive(Parser, Clone)]
#[command(version, about = "Concurrent HTTP request harness", long_about = None)]
struct Cli {
    /// Fetch this URL
    #[arg(short = 'u', long)]
    url: String,

    /// Number of simultaneous requests (one thread each)
    #[arg(short = 't', long, default_value = "1",
          value_parser = clap::value_parser!(u64).range(1..=MAX_POPULATION as u64))]
    threads: u64,

    /// Use this file as the comparison payload
    #[arg(short = 'F', long)]
    file: Option<PathBuf>,

    /// Save every payload to disk
    #[arg(short = 'S', long)]
    save: bool,

    /// Directory for saved payloads
    #[arg(short = 'P', long, default_value = ".")]
    path: PathBuf,

    /// Print the estimated memory footprint of the population
    #[arg(short = 'X', long)]
    stats: bool,

    /// Stack size per worker thread (bytes)
    #[arg(long)]
    stack_size: Option<usize>,

    /// Soft limit for open file descriptors
    #[arg(long)]
    max_open_files: Option<u64>,

    /// Per-request timeout (seconds)
    #[arg(long)]
    timeout: Option<u64>,

    /// User-Agent header to send
    #[arg(long)]
    user_agent: Option<String>,

    /// Also write the report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        let mut config = RunConfig::new(self.url, self.threads as usize);
        if self.save {
            config.save_dir = Some(self.path);
        }
        config.reference = self.file;
        config.stack_size = self.stack_size;
        config.max_open_files = self.max_open_files;
        config.timeout = self.timeout.map(Duration::from_secs);
        if let Some(ua) = self.user_agent {
            config.user_agent = ua;
        }
        config
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("req: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let report_path = cli.report.clone();
    let stats = cli.stats;
    let config = cli.into_config();
    config.validate()?;

    if let Some(n) = config.max_open_files {
        limits::raise_open_files(n).context("could not apply open file limit")?;
    }

    if stats {
        let kb = std::mem::size_of::<RequestUnit<'static>>() * config.population / 1024;
        println!("Test suite will use: {} kb of memory", kb);
    }

    if let Some(dir) = &config.save_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Directory {} inaccessible", dir.display()))?;
    }

    let transfer = HttpTransfer::new(&config)?;

    println!("{}", header_line(&config.url, config.population));
    let population = Dispatcher::new(&config, &transfer).run()?;
    let report = summarize(population);

    for line in report.lines().into_iter().chain(report.summary_lines()) {
        println!("{}", line);
    }

    if let Some(path) = report_path {
        report
            .save_to_file(&path)
            .with_context(|| format!("could not write report to {}", path.display()))?;
        info!("Report saved to {}", path.display());
    }

    Ok(())
}
