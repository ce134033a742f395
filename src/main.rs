use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use owo_colors::{OwoColorize, Stream};
use tracing_subscriber::EnvFilter;

use quantbench::clock::MonotonicClock;
use quantbench::command::CommandTarget;
use quantbench::config::{self, FileConfig, Options};
use quantbench::display;
use quantbench::runner::Benchmark;

#[derive(Parser)]
#[command(
    name = "quantbench",
    version,
    about = "Benchmark commands and report mean, median and percentiles"
)]
struct Cli {
    /// Commands to benchmark, one per argument (e.g. "sleep 0.01")
    #[arg(required = true)]
    commands: Vec<String>,

    /// Collection window per command, e.g. 500ms, 2s, 1m30s
    #[arg(short, long, value_parser = config::parse_duration)]
    duration: Option<Duration>,

    /// Untimed runs before collection starts
    #[arg(short, long)]
    warm_ups: Option<u32>,

    /// Comma-separated percentiles to report, e.g. "5,99"; "" reports none
    #[arg(short, long)]
    quantiles: Option<String>,

    /// Allowed rank error of the percentile estimates, as a fraction of runs
    #[arg(long)]
    tolerance: Option<f64>,

    /// Width of the value columns
    #[arg(long)]
    column_size: Option<usize>,

    /// How many times each command repeats its work; reported times are divided by it
    #[arg(long)]
    inner_repeats: Option<u32>,

    /// Run each command through `sh -c`
    #[arg(long)]
    shell: bool,

    /// Print a JSON report instead of the table
    #[arg(long)]
    json: bool,

    /// Config file [default: <config dir>/quantbench/config.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Flags override the config file, which overrides built-in defaults.
fn apply_flags(cli: &Cli, mut options: Options) -> Result<Options> {
    if let Some(duration) = cli.duration {
        options = options.with_duration(duration);
    }
    if let Some(warm_ups) = cli.warm_ups {
        options = options.with_warm_ups(warm_ups);
    }
    if let Some(ref quantiles) = cli.quantiles {
        options = options.with_quantiles(&config::parse_percentiles(quantiles)?);
    }
    if let Some(tolerance) = cli.tolerance {
        options = options.with_tolerance(tolerance);
    }
    if let Some(column_size) = cli.column_size {
        options = options.with_column_size(column_size);
    }
    if let Some(inner_repeats) = cli.inner_repeats {
        options = options.with_inner_repeats(inner_repeats);
    }
    Ok(options)
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file_config = FileConfig::discover(cli.config.as_deref())?;
    let options = apply_flags(&cli, file_config.apply(Options::default())?)?;
    options.validate()?;

    let mut functions = Vec::with_capacity(cli.commands.len());
    for line in &cli.commands {
        let target = CommandTarget::parse(line, cli.shell)?;
        target.probe()?;
        functions.push(target.into_named_function());
    }

    let mut benchmark = Benchmark::new(functions).with_options(options);
    if cli.json {
        let started_at = Utc::now();
        let results = benchmark.run_to(&mut io::sink(), &MonotonicClock::new())?;
        println!(
            "{}",
            display::format_json(&results, benchmark.options(), started_at)
        );
    } else {
        benchmark.run()?;
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!(
            "{} {}",
            "error:".if_supports_color(Stream::Stderr, |s| s.red()),
            err
        );
        process::exit(1);
    }
}
