//! The suite runner.

use std::sync::Arc;
use std::time::Instant;

use crate::benchmark::Benchmark;
use crate::cancel::{CancellationSource, Listener};
use crate::config::RunnerConfig;
use crate::error::Result;
use crate::executor::Executor;
use crate::report::{ConsoleReporter, Reporter};
use crate::result::{BenchResult, SuiteResult};
use crate::scheduler::{RunHandle, RunOutcome, Scheduler};

/// Runs the benchmarks of an executor and reports their timings.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use dbstress::{BenchRunner, Benchmark, RunnerConfig, StdoutExecutor};
///
/// let executor = Arc::new(StdoutExecutor::new(vec![
///     Benchmark::once("create", "CREATE TABLE t (id INT, v BIGINT)"),
///     Benchmark::looped("insert", "INSERT INTO t VALUES ({{Iter}}, {{RandInt63}})"),
/// ]));
///
/// let mut runner = BenchRunner::with_config(
///     "demo",
///     executor,
///     RunnerConfig::new().iterations(100).threads(4),
/// );
/// runner.run_all().unwrap();
/// let results = runner.finish();
/// ```
pub struct BenchRunner<E> {
    suite: String,
    config: RunnerConfig,
    scheduler: Scheduler<E>,
    results: Vec<BenchResult>,
    pending: Vec<(usize, RunHandle)>,
    suite_start: Instant,
    started: bool,
    reporters: Vec<Box<dyn Reporter>>,
}

impl<E: Executor + 'static> BenchRunner<E> {
    /// Create a new runner with config from environment.
    pub fn new(suite: &str, executor: Arc<E>) -> Self {
        Self::with_config(suite, executor, RunnerConfig::from_env())
    }

    /// Create a new runner with explicit config.
    pub fn with_config(suite: &str, executor: Arc<E>, config: RunnerConfig) -> Self {
        let mut scheduler = Scheduler::new(executor);
        if let Some(seed) = config.seed {
            scheduler = scheduler.seed(seed);
        }

        let reporters: Vec<Box<dyn Reporter>> = if config.verbose {
            vec![Box::new(ConsoleReporter::new())]
        } else {
            Vec::new()
        };

        Self {
            suite: suite.to_string(),
            config,
            scheduler,
            results: Vec::new(),
            pending: Vec::new(),
            suite_start: Instant::now(),
            started: false,
            reporters,
        }
    }

    /// Listen on `cancel` instead of the process-wide source.
    pub fn with_cancellation(mut self, cancel: CancellationSource) -> Self {
        self.scheduler = self.scheduler.with_cancellation(cancel);
        self
    }

    /// Replace reporters with a custom set.
    pub fn reporters(&mut self, reporters: Vec<Box<dyn Reporter>>) -> &mut Self {
        self.reporters = reporters;
        self
    }

    /// Add an additional reporter.
    pub fn add_reporter(&mut self, reporter: Box<dyn Reporter>) -> &mut Self {
        self.reporters.push(reporter);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn should_run(&self, name: &str) -> bool {
        match &self.config.filter {
            Some(f) => name.contains(f.as_str()),
            None => true,
        }
    }

    fn ensure_started(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.suite_start = Instant::now();
        for r in &self.reporters {
            r.suite_start(&self.suite, &self.config);
        }
    }

    /// Run one benchmark with the configured iterations and threads.
    ///
    /// Parallel benchmarks are left running; their completion is collected
    /// by [`run_all`](Self::run_all) or [`finish`](Self::finish).
    pub fn run(&mut self, benchmark: &Benchmark) -> Result<()> {
        if !self.should_run(&benchmark.name) {
            return Ok(());
        }
        self.ensure_started();

        for r in &self.reporters {
            r.bench_start(benchmark);
        }

        let outcome = self
            .scheduler
            .run(benchmark, self.config.iterations, self.config.threads);
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                for r in &self.reporters {
                    r.bench_failed(benchmark, &e);
                }
                return Err(e);
            }
        };

        let mut result = BenchResult {
            name: format!("{}/{}", self.suite, benchmark.name),
            kind: benchmark.kind,
            parallel: benchmark.parallel,
            elapsed: outcome.elapsed(),
            completed_in: None,
            executed: None,
            interrupted: false,
        };
        match outcome {
            RunOutcome::Finished { summary, .. } => {
                result.completed_in = Some(summary.elapsed);
                result.executed = Some(summary.executed);
                result.interrupted = summary.interrupted;
            }
            RunOutcome::Detached { handle, .. } => {
                self.pending.push((self.results.len(), handle));
            }
        }

        for r in &self.reporters {
            r.bench_end(&result);
        }
        self.results.push(result);
        Ok(())
    }

    /// Set up the executor, run all its benchmarks in order, wait for
    /// parallel ones, then clean up.
    ///
    /// Cleanup also runs when a benchmark fails. No further benchmark
    /// starts after an interrupt.
    pub fn run_all(&mut self) -> Result<()> {
        let executor = Arc::clone(self.scheduler.executor());
        let mut listener = self.scheduler.cancellation().listen();

        executor.setup();
        let ran = self.run_benchmarks(&executor.benchmarks(), &mut listener);
        let waited = self.wait_pending();
        executor.cleanup();

        ran.and(waited)
    }

    fn run_benchmarks(&mut self, benchmarks: &[Benchmark], listener: &mut Listener) -> Result<()> {
        for benchmark in benchmarks {
            if listener.interrupted() {
                tracing::warn!(suite = %self.suite, "interrupted, skipping remaining benchmarks");
                break;
            }
            self.run(benchmark)?;
        }
        Ok(())
    }

    /// Wait for every parallel benchmark launched so far.
    ///
    /// Returns the first failure after all of them have been collected.
    pub fn wait_pending(&mut self) -> Result<()> {
        let mut failure = None;
        for (index, handle) in std::mem::take(&mut self.pending) {
            let name = handle.name().to_string();
            match handle.wait() {
                Ok(summary) => {
                    let result = &mut self.results[index];
                    result.completed_in = Some(summary.elapsed);
                    result.executed = Some(summary.executed);
                    result.interrupted = summary.interrupted;
                    for r in &self.reporters {
                        r.bench_completed(result);
                    }
                }
                Err(e) => {
                    tracing::error!(benchmark = %name, error = %e, "parallel benchmark failed");
                    failure.get_or_insert(e);
                }
            }
        }
        failure.map_or(Ok(()), Err)
    }

    /// Finish the suite and return results.
    ///
    /// Waits for outstanding parallel benchmarks first.
    pub fn finish(mut self) -> SuiteResult {
        if let Err(e) = self.wait_pending() {
            tracing::error!(suite = %self.suite, error = %e, "suite finished with failures");
        }
        self.ensure_started();

        let suite_result = SuiteResult {
            suite: self.suite.clone(),
            results: self.results,
            total_duration: self.suite_start.elapsed(),
        };

        for r in &self.reporters {
            r.suite_end(&suite_result);
        }

        suite_result
    }
}
