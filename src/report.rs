//! Pluggable reporters for suite progress.

use std::io::Write;
use std::time::Duration;

use crate::benchmark::{BenchType, Benchmark};
use crate::config::RunnerConfig;
use crate::error::Error;
use crate::result::{BenchResult, SuiteResult};

/// Trait for benchmark result reporters.
pub trait Reporter: Send + Sync {
    /// Called when a suite starts.
    fn suite_start(&self, _suite: &str, _config: &RunnerConfig) {}

    /// Called when a benchmark starts.
    fn bench_start(&self, _benchmark: &Benchmark) {}

    /// Called when a benchmark returns control.
    fn bench_end(&self, _result: &BenchResult) {}

    /// Called when a benchmark could not run.
    fn bench_failed(&self, _benchmark: &Benchmark, _error: &Error) {}

    /// Called when a detached benchmark's work completes.
    fn bench_completed(&self, _result: &BenchResult) {}

    /// Called when a suite completes.
    fn suite_end(&self, _result: &SuiteResult) {}
}

/// Console reporter that prints results to stderr.
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }

    fn format_duration(d: Duration) -> String {
        if d.as_secs() > 0 {
            format!("{:.2}s", d.as_secs_f64())
        } else if d.as_millis() > 0 {
            format!("{:.2}ms", d.as_secs_f64() * 1000.0)
        } else {
            format!("{:.2}µs", d.as_secs_f64() * 1_000_000.0)
        }
    }

    fn format_mode(kind: BenchType, parallel: bool) -> &'static str {
        match (kind, parallel) {
            (BenchType::Once, false) => "once",
            (BenchType::Once, true) => "once, detached",
            (BenchType::Loop, false) => "loop",
            (BenchType::Loop, true) => "loop, detached",
        }
    }

    fn format_result(result: &BenchResult) -> String {
        let mut line = Self::format_duration(result.elapsed);
        if result.parallel {
            line.push_str(" (dispatch)");
        }
        if let Some(executed) = result.executed {
            line.push_str(&format!(", {executed} statements"));
        }
        if result.interrupted {
            line.push_str(", interrupted");
        }
        line
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn suite_start(&self, suite: &str, config: &RunnerConfig) {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("  Benchmark Suite: {}", suite);
        eprintln!(
            "  Iterations: {}, Threads: {}",
            config.iterations, config.threads
        );
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    fn bench_start(&self, benchmark: &Benchmark) {
        eprint!(
            "  {} [{}] ... ",
            benchmark.name,
            Self::format_mode(benchmark.kind, benchmark.parallel)
        );
        std::io::stderr().flush().ok();
    }

    fn bench_end(&self, result: &BenchResult) {
        eprintln!("{}", Self::format_result(result));
    }

    fn bench_failed(&self, _benchmark: &Benchmark, error: &Error) {
        eprintln!("failed: {}", error);
    }

    fn bench_completed(&self, result: &BenchResult) {
        if let Some(d) = result.completed_in {
            eprintln!(
                "  {} finished in {}",
                result.name,
                Self::format_duration(d)
            );
        }
    }

    fn suite_end(&self, result: &SuiteResult) {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!(
            "  Completed {} benchmarks in {:.2}s{}",
            result.results.len(),
            result.total_duration.as_secs_f64(),
            if result.interrupted() { " (interrupted)" } else { "" }
        );
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

/// Combines multiple reporters.
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        Self { reporters }
    }
}

impl Reporter for MultiReporter {
    fn suite_start(&self, suite: &str, config: &RunnerConfig) {
        for r in &self.reporters {
            r.suite_start(suite, config);
        }
    }

    fn bench_start(&self, benchmark: &Benchmark) {
        for r in &self.reporters {
            r.bench_start(benchmark);
        }
    }

    fn bench_end(&self, result: &BenchResult) {
        for r in &self.reporters {
            r.bench_end(result);
        }
    }

    fn bench_failed(&self, benchmark: &Benchmark, error: &Error) {
        for r in &self.reporters {
            r.bench_failed(benchmark, error);
        }
    }

    fn bench_completed(&self, result: &BenchResult) {
        for r in &self.reporters {
            r.bench_completed(result);
        }
    }

    fn suite_end(&self, result: &SuiteResult) {
        for r in &self.reporters {
            r.suite_end(result);
        }
    }
}
