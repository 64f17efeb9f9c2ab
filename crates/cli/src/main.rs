//! Data-cache prefetcher trace simulator CLI.
//!
//! This binary replays a memory access trace through the cache model with a
//! configured prefetcher and prints the resulting statistics. It performs:
//! 1. **Config:** Load a JSON configuration file, or use built-in defaults.
//! 2. **Replay:** Feed each trace line to the cache as a demand access.
//! 3. **Report:** Print hit/miss and prefetch statistics.

use clap::{Parser, Subcommand};
use std::{fs, process};

use pfsim_core::cache::CacheSim;
use pfsim_core::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "pfsim",
    author,
    version,
    about = "Data-cache prefetcher trace simulator",
    long_about = "Replay a memory access trace through a cache with a configured prefetcher.\n\nTrace format: one access per line, `[w] <addr> [pc]` in hex; `#` starts a comment.\n\nExamples:\n  pfsim run -t traces/stream.trace\n  pfsim run -t traces/qsort.trace -c configs/ghb.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a trace file through the configured cache.
    Run {
        /// Trace file to replay.
        #[arg(short, long)]
        trace: String,

        /// JSON configuration file (built-in defaults when omitted).
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { trace, config } => cmd_run(trace, config),
    }
}

/// One parsed trace record: write flag, byte address, optional PC.
type TraceRecord = (bool, u64, Option<u64>);

/// Runs the simulator: loads the config, replays the trace, prints stats.
fn cmd_run(trace_path: String, config_path: Option<String>) {
    let config = load_config(config_path.as_deref());

    println!(
        "Configuration: {}  prefetcher: {:?}  degree: {}",
        config_path.as_deref().unwrap_or("default"),
        config.cache.prefetcher,
        config.cache.prefetch_degree
    );
    println!();

    let trace = fs::read_to_string(&trace_path).unwrap_or_else(|e| {
        eprintln!("Error reading trace {}: {}", trace_path, e);
        process::exit(1);
    });

    let mut cache = CacheSim::new(&config.cache);

    for (lineno, line) in trace.lines().enumerate() {
        match parse_trace_line(line) {
            Ok(None) => {}
            Ok(Some((is_write, addr, pc))) => {
                cache.access(addr, pc, is_write, config.memory_latency);
            }
            Err(e) => {
                eprintln!("{}:{}: {}", trace_path, lineno + 1, e);
                process::exit(1);
            }
        }
    }

    cache.stats.print();
}

/// Loads the JSON configuration file, or the defaults when none is given.
fn load_config(path: Option<&str>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config {}: {}", path, e);
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing config {}: {}", path, e);
        process::exit(1);
    })
}

/// Parses one trace line.
///
/// Format: `[w|r] <addr> [pc]` with hex values (leading `0x` optional).
/// Returns `Ok(None)` for blank lines and `#` comments.
fn parse_trace_line(line: &str) -> Result<Option<TraceRecord>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace().peekable();
    let is_write = match tokens.peek() {
        Some(&"w") | Some(&"W") => {
            tokens.next();
            true
        }
        Some(&"r") | Some(&"R") => {
            tokens.next();
            false
        }
        _ => false,
    };

    let addr = match tokens.next() {
        Some(tok) => parse_hex(tok)?,
        None => return Err("missing address".to_string()),
    };
    let pc = match tokens.next() {
        Some(tok) => Some(parse_hex(tok)?),
        None => None,
    };
    if tokens.next().is_some() {
        return Err("trailing tokens after pc".to_string());
    }

    Ok(Some((is_write, addr, pc)))
}

/// Parses a hex value with an optional `0x` prefix.
fn parse_hex(token: &str) -> Result<u64, String> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u64::from_str_radix(digits, 16).map_err(|e| format!("bad hex value {:?}: {}", token, e))
}
