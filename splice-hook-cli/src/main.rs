//! Splice Hook CLI Application
//!
//! Command-line front end for the splice-hook library. It loads the pipeline
//! configuration (INI or TOML), replays a load trace (TOML) through an in-process host
//! with the interception controller attached, and reports:
//! - Which loads were cached, cleared or spliced
//! - Per-resource counters and lifecycle phases
//! - The final payloads (optional, written to a directory)

use anyhow::Result;
use clap::Parser;
use splice_hook::SpliceError;
use std::path::{Path, PathBuf};

mod config;
mod replay;
mod report;

/// Splice Hook - Replay script loads through the interception pipeline
#[derive(Parser, Debug)]
#[command(name = "splice-hook-cli")]
#[command(about = "Replay a script load trace through the splice pipeline", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the pipeline configuration (INI, or TOML by extension)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the load trace (TOML)
    #[arg(short, long, value_name = "FILE")]
    trace: Option<PathBuf>,

    /// Directory to write the final payloads to
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Override the injection target substring
    #[arg(long, value_name = "NAME")]
    target: Option<String>,

    /// Override the injection target index
    #[arg(long, value_name = "INDEX", allow_hyphen_values = true)]
    target_index: Option<i64>,

    /// Override the number of internal loads to skip
    #[arg(long, value_name = "COUNT")]
    skip_offset: Option<i64>,

    /// Disable script caching
    #[arg(long)]
    no_cache: bool,

    /// Disable payload injection
    #[arg(long)]
    no_script: bool,

    /// Replay each resource on its own worker thread
    #[arg(long)]
    parallel: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Splice Hook CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using splice-hook library v{}", splice_hook::VERSION);

    match &args.trace {
        Some(trace_path) => replay_mode(trace_path, &args)?,
        None => {
            // No trace - show help
            println!("Splice Hook - No trace specified");
            println!("\nQuick Start:");
            println!("  splice-hook-cli --trace trace.toml");
            println!("  splice-hook-cli --config splice.ini --trace trace.toml --parallel");
            println!("\nUse --help for more options");
        }
    }

    Ok(())
}

/// Replay mode - load config and trace, run the pipeline, print the report
fn replay_mode(trace_path: &Path, args: &Args) -> Result<()> {
    let overrides = config::Overrides {
        no_cache: args.no_cache,
        no_script: args.no_script,
        cache_path: args.cache_dir.clone(),
        target: args.target.clone(),
        target_index: args.target_index,
        skip_offset: args.skip_offset,
    };
    let splice_config = config::load_config(args.config.as_deref(), &overrides)?;
    log::debug!("Configuration: {:?}", splice_config);

    let trace = config::load_trace(trace_path)?;
    let base = trace_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();

    let extension = splice_config.cache_extension.clone();
    let controller = splice_hook::InterceptionController::with_fs(splice_config);
    let host = replay::build_host(&trace);

    let runs = match replay::replay(&trace, &host, &controller, &base, args.parallel) {
        Ok(runs) => runs,
        Err(e) if matches!(e.downcast_ref::<SpliceError>(), Some(SpliceError::HostUnavailable(_))) => {
            // Nothing to attach to; report and leave cleanly
            log::error!("Replay aborted: {:#}", e);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if let Some(output) = &args.output {
        report::write_payloads(output, &runs, &extension)?;
    }

    let report = report::Report::build(trace.session.clone(), &runs, &controller);
    if args.json {
        println!("{}", report.to_json()?);
    } else if !args.quiet {
        print!("{}", report.to_text());
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
