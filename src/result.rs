//! Benchmark result types.

use std::time::Duration;

use crate::benchmark::BenchType;

/// What happened when one benchmark ran.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchResult {
    /// Full name including suite: "suite/benchmark"
    pub name: String,
    pub kind: BenchType,
    pub parallel: bool,
    /// Time until the run returned control. Dispatch latency for parallel benchmarks.
    pub elapsed: Duration,
    /// Duration of the work itself, once known.
    pub completed_in: Option<Duration>,
    /// Statements executed, once known.
    pub executed: Option<u64>,
    /// Workers stopped early on an interrupt.
    pub interrupted: bool,
}

impl BenchResult {
    /// Parallel benchmark whose work has not been waited for yet.
    pub fn is_pending(&self) -> bool {
        self.completed_in.is_none()
    }
}

/// Results for an entire benchmark suite.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteResult {
    /// Suite name
    pub suite: String,
    /// Individual benchmark results, in run order
    pub results: Vec<BenchResult>,
    /// Total suite duration
    pub total_duration: Duration,
}

impl SuiteResult {
    /// Whether any benchmark was cut short by an interrupt.
    pub fn interrupted(&self) -> bool {
        self.results.iter().any(|r| r.interrupted)
    }

    /// Result for `name` (without the suite prefix).
    pub fn get(&self, name: &str) -> Option<&BenchResult> {
        let full = format!("{}/{}", self.suite, name);
        self.results.iter().find(|r| r.name == full)
    }
}
