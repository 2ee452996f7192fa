//! The statement executor capability and a built-in stdout implementation.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::benchmark::Benchmark;
use crate::error::{Error, Result};

/// Runs concrete statements against the system under test.
///
/// Statements arrive from several worker threads at once, so implementations
/// take `&self` and synchronize internally. `exec` reports nothing back:
/// logging, retrying or aborting on failure is up to the implementation.
pub trait Executor: Send + Sync {
    /// Prepare external resources before the first benchmark.
    fn setup(&self) {}

    /// Release external resources after the last benchmark.
    fn cleanup(&self) {}

    /// Benchmarks to run, in order.
    fn benchmarks(&self) -> Vec<Benchmark>;

    /// Execute one rendered statement.
    fn exec(&self, statement: &str);
}

/// Executor that writes every statement, one per line, to a writer.
///
/// Useful to preview the load a suite generates before pointing it at a
/// real database.
pub struct StdoutExecutor {
    benchmarks: Vec<Benchmark>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdoutExecutor {
    /// Print to stdout.
    pub fn new(benchmarks: Vec<Benchmark>) -> Self {
        Self::with_writer(benchmarks, Box::new(std::io::stdout()))
    }

    /// Discard statements; only timings remain.
    pub fn sink(benchmarks: Vec<Benchmark>) -> Self {
        Self::with_writer(benchmarks, Box::new(std::io::sink()))
    }

    pub fn with_writer(benchmarks: Vec<Benchmark>, out: Box<dyn Write + Send>) -> Self {
        Self {
            benchmarks,
            out: Mutex::new(out),
        }
    }

    /// Load benchmark definitions from a JSON array.
    pub fn load_suite(path: impl AsRef<Path>) -> Result<Vec<Benchmark>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::SuiteIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| Error::SuiteFormat {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Executor for StdoutExecutor {
    fn cleanup(&self) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = out.flush() {
            tracing::warn!(error = %e, "failed to flush statements");
        }
    }

    fn benchmarks(&self) -> Vec<Benchmark> {
        self.benchmarks.clone()
    }

    fn exec(&self, statement: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(out, "{statement}") {
            tracing::warn!(error = %e, "failed to write statement");
        }
    }
}
