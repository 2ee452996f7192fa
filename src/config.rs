//! Configuration for the suite runner.

/// Configuration for the suite runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Statements executed per `Loop` benchmark.
    pub iterations: u64,
    /// Worker threads per `Loop` benchmark.
    pub threads: usize,
    /// Base seed for worker generators; entropy when unset.
    pub seed: Option<u64>,
    /// Filter benchmarks by name substring.
    pub filter: Option<String>,
    /// Print results to stderr.
    pub verbose: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            threads: 1,
            seed: None,
            filter: None,
            verbose: true,
        }
    }
}

impl RunnerConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from environment variables.
    ///
    /// Supported variables:
    /// - `BENCH_ITERATIONS`: iterations per loop benchmark (default: 1000)
    /// - `BENCH_THREADS`: worker threads (default: 1)
    /// - `BENCH_SEED`: base generator seed
    /// - `BENCH_FILTER`: filter benchmarks by name
    /// - `BENCH_VERBOSE`: verbose output (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(n) = lookup("BENCH_ITERATIONS").and_then(|v| v.parse().ok()) {
            cfg.iterations = n;
        }
        if let Some(n) = lookup("BENCH_THREADS").and_then(|v| v.parse().ok()) {
            cfg.threads = n;
        }
        if let Some(seed) = lookup("BENCH_SEED").and_then(|v| v.parse().ok()) {
            cfg.seed = Some(seed);
        }
        if let Some(v) = lookup("BENCH_FILTER") {
            cfg.filter = Some(v);
        }
        if let Some(v) = lookup("BENCH_VERBOSE") {
            cfg.verbose = v != "0" && !v.eq_ignore_ascii_case("false");
        }

        cfg
    }

    /// Set the number of iterations per loop benchmark.
    pub fn iterations(mut self, n: u64) -> Self {
        self.iterations = n;
        self
    }

    /// Set the number of worker threads.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    /// Seed worker generators deterministically.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set verbose output.
    pub fn verbose(mut self, v: bool) -> Self {
        self.verbose = v;
        self
    }

    /// Set filter pattern.
    pub fn filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    /// Clear filter pattern.
    pub fn no_filter(mut self) -> Self {
        self.filter = None;
        self
    }
}
