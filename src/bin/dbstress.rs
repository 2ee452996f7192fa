//! dbstress: run a benchmark suite file and print the generated statements.
//!
//! A suite is a JSON array of benchmarks:
//!
//! ```text
//! [
//!   {"name": "create", "type": "once", "stmt": "CREATE TABLE t (id BIGINT, v BIGINT)"},
//!   {"name": "insert", "type": "loop", "stmt": "INSERT INTO t VALUES ({{Iter}}, {{RandInt63}})"},
//!   {"name": "scan",   "type": "loop", "parallel": true, "stmt": "SELECT * FROM t WHERE id = {{RandInt63n 1000}}"}
//! ]
//! ```
//!
//! Statements go to stdout, one per line, so the output can be piped into a
//! database shell. Timings go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dbstress::{BenchRunner, CancellationSource, RunnerConfig, StdoutExecutor};
use tracing::info;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "dbstress",
    about = "Generate templated statement load from a benchmark suite",
    long_about = "
dbstress renders the statement template of every benchmark in a suite file
and executes it once or in a loop across worker threads. The built-in
executor writes each statement to stdout.

Example:
    dbstress suite.json                          # Run all benchmarks
    dbstress suite.json -n 10000 -t 8            # 10000 iterations on 8 threads
    dbstress suite.json --filter insert --seed 1 # Reproducible subset
    dbstress suite.json --quiet                  # Only report timings
    dbstress suite.json --no-report              # Only print statements

Defaults for the numeric options come from BENCH_ITERATIONS, BENCH_THREADS,
BENCH_SEED and BENCH_FILTER; BENCH_VERBOSE=false turns
the timing report off. Press Ctrl-C to stop after the statements in
flight.
"
)]
struct Cli {
    /// JSON file holding an array of benchmarks
    suite: PathBuf,

    /// Iterations per loop benchmark
    #[arg(long, short = 'n')]
    iterations: Option<u64>,

    /// Worker threads per loop benchmark
    #[arg(long, short = 't')]
    threads: Option<usize>,

    /// Base seed for the random template helpers
    #[arg(long)]
    seed: Option<u64>,

    /// Only run benchmarks whose name contains this substring
    #[arg(long)]
    filter: Option<String>,

    /// List benchmarks without running them
    #[arg(long)]
    list: bool,

    /// Discard statements instead of printing them
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Do not print the timing report
    #[arg(long)]
    no_report: bool,
}

impl Cli {
    fn config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::from_env();
        if let Some(n) = self.iterations {
            config = config.iterations(n);
        }
        if let Some(n) = self.threads {
            config = config.threads(n);
        }
        if let Some(seed) = self.seed {
            config = config.seed(seed);
        }
        if let Some(filter) = &self.filter {
            config = config.filter(filter.clone());
        }
        if self.no_report {
            config = config.verbose(false);
        }
        config
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "dbstress=debug" } else { "dbstress=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let benchmarks = StdoutExecutor::load_suite(&cli.suite)
        .with_context(|| format!("failed to load suite {}", cli.suite.display()))?;

    if cli.list {
        for b in &benchmarks {
            let mode = if b.parallel { "parallel" } else { "sequential" };
            println!("{} ({:?}, {})", b.name, b.kind, mode);
        }
        return Ok(());
    }

    let cancel = CancellationSource::global();
    #[cfg(feature = "ctrl-c")]
    dbstress::forward_ctrl_c(cancel.clone()).context("failed to install Ctrl-C handler")?;

    let executor = if cli.quiet {
        StdoutExecutor::sink(benchmarks)
    } else {
        StdoutExecutor::new(benchmarks)
    };

    let suite = cli
        .suite
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("suite")
        .to_string();
    let mut runner = BenchRunner::with_config(&suite, Arc::new(executor), cli.config())
        .with_cancellation(cancel);

    let ran = runner.run_all();
    let result = runner.finish();
    ran.context("benchmark run failed")?;

    if result.interrupted() {
        info!("suite {} interrupted", result.suite);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_override_env_config_with_flags() {
        let cli = Cli::parse_from([
            "dbstress",
            "suite.json",
            "-n",
            "25",
            "--threads",
            "3",
            "--seed",
            "9",
            "--filter",
            "ins",
        ]);
        let config = cli.config();
        assert_eq!(config.iterations, 25);
        assert_eq!(config.threads, 3);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.filter.as_deref(), Some("ins"));
    }

    #[test]
    fn should_disable_report_when_requested() {
        let cli = Cli::parse_from(["dbstress", "suite.json", "--no-report"]);
        assert!(!cli.config().verbose);
    }

    #[test]
    fn should_require_suite_path() {
        assert!(Cli::try_parse_from(["dbstress"]).is_err());
    }
}
