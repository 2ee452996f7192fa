//! Running a benchmark: template compilation, timing and dispatch.
//!
//! | type   | parallel | behaviour                                          |
//! |--------|----------|----------------------------------------------------|
//! | `Once` | `false`  | render `Iter = 1`, execute, return                 |
//! | `Once` | `true`   | same on a detached thread                          |
//! | `Loop` | `false`  | one worker thread per [`WorkRange`], join them all |
//! | `Loop` | `true`   | the whole loop on a detached thread                |
//!
//! The elapsed time in a [`RunOutcome`] always stops when [`Scheduler::run`]
//! returns. For detached runs that is only the time it took to launch the
//! work; the work's own duration is in the [`RunSummary`] returned by
//! [`RunHandle::wait`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::benchmark::{BenchType, Benchmark};
use crate::cancel::CancellationSource;
use crate::context::Generator;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::partition::{partition, WorkRange};
use crate::template::StatementTemplate;

/// What a finished run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Statements handed to the executor.
    pub executed: u64,
    /// At least one worker stopped early because of an interrupt.
    pub interrupted: bool,
    /// Duration of the work itself.
    pub elapsed: Duration,
}

/// Result of [`Scheduler::run`].
#[derive(Debug)]
pub enum RunOutcome {
    /// The work completed before `run` returned.
    Finished { elapsed: Duration, summary: RunSummary },
    /// The work was launched on a background thread; `elapsed` is dispatch latency.
    Detached { elapsed: Duration, handle: RunHandle },
}

impl RunOutcome {
    /// Time from the start of the run until `run` returned.
    pub fn elapsed(&self) -> Duration {
        match self {
            RunOutcome::Finished { elapsed, .. } | RunOutcome::Detached { elapsed, .. } => *elapsed,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, RunOutcome::Detached { .. })
    }

    /// Block until the work is done.
    pub fn wait(self) -> Result<RunSummary> {
        match self {
            RunOutcome::Finished { summary, .. } => Ok(summary),
            RunOutcome::Detached { handle, .. } => handle.wait(),
        }
    }
}

/// Handle on a detached run.
#[derive(Debug)]
pub struct RunHandle {
    name: String,
    inner: JoinHandle<Result<RunSummary>>,
}

impl RunHandle {
    /// Name of the benchmark being run.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the run to complete.
    pub fn wait(self) -> Result<RunSummary> {
        let RunHandle { name, inner } = self;
        inner
            .join()
            .unwrap_or_else(|_| Err(Error::WorkerPanicked { name, worker: 0 }))
    }
}

/// Drives benchmarks against one executor.
pub struct Scheduler<E> {
    executor: Arc<E>,
    cancel: CancellationSource,
    seed: Option<u64>,
}

impl<E: Executor + 'static> Scheduler<E> {
    /// Scheduler listening on the process-wide cancellation source, with
    /// generators seeded from entropy.
    pub fn new(executor: Arc<E>) -> Self {
        Self {
            executor,
            cancel: CancellationSource::global(),
            seed: None,
        }
    }

    /// Listen on `cancel` instead of the process-wide source.
    pub fn with_cancellation(mut self, cancel: CancellationSource) -> Self {
        self.cancel = cancel;
        self
    }

    /// Seed worker `i`'s generator with `seed + i`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn cancellation(&self) -> &CancellationSource {
        &self.cancel
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    /// Run `benchmark`. `iterations` and `threads` only apply to `Loop` benchmarks.
    ///
    /// Template syntax errors are returned before any statement executes.
    pub fn run(&self, benchmark: &Benchmark, iterations: u64, threads: usize) -> Result<RunOutcome> {
        let template = StatementTemplate::compile(&benchmark.name, &benchmark.stmt)?;
        if benchmark.kind == BenchType::Loop && threads == 0 {
            return Err(Error::NoThreads {
                name: benchmark.name.clone(),
            });
        }

        let job = Job {
            executor: Arc::clone(&self.executor),
            template,
            cancel: self.cancel.clone(),
            seed: self.seed,
        };
        info!(
            benchmark = %benchmark.name,
            kind = ?benchmark.kind,
            parallel = benchmark.parallel,
            iterations,
            threads,
            "running benchmark"
        );

        let start = Instant::now();
        let outcome = match (benchmark.kind, benchmark.parallel) {
            (BenchType::Once, false) => {
                let summary = job.once()?;
                RunOutcome::Finished {
                    elapsed: start.elapsed(),
                    summary,
                }
            }
            (BenchType::Once, true) => {
                let handle = job.detach(|job| job.once())?;
                RunOutcome::Detached {
                    elapsed: start.elapsed(),
                    handle,
                }
            }
            (BenchType::Loop, false) => {
                let summary = job.looped(iterations, threads)?;
                RunOutcome::Finished {
                    elapsed: start.elapsed(),
                    summary,
                }
            }
            (BenchType::Loop, true) => {
                let handle = job.detach(move |job| job.looped(iterations, threads))?;
                RunOutcome::Detached {
                    elapsed: start.elapsed(),
                    handle,
                }
            }
        };
        Ok(outcome)
    }
}

/// Run `benchmark` on `executor` with the default [`Scheduler`].
pub fn run<E: Executor + 'static>(
    executor: &Arc<E>,
    benchmark: &Benchmark,
    iterations: u64,
    threads: usize,
) -> Result<RunOutcome> {
    Scheduler::new(Arc::clone(executor)).run(benchmark, iterations, threads)
}

/// Everything a run needs, owned so it can move to a detached thread.
struct Job<E> {
    executor: Arc<E>,
    template: StatementTemplate,
    cancel: CancellationSource,
    seed: Option<u64>,
}

#[derive(Debug, Default)]
struct WorkerReport {
    executed: u64,
    interrupted: bool,
}

impl<E: Executor + 'static> Job<E> {
    fn generator(&self, worker: usize) -> Generator {
        match self.seed {
            Some(seed) => Generator::from_seed(seed.wrapping_add(worker as u64)),
            None => Generator::from_entropy(),
        }
    }

    fn once(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let statement = self.template.renderer(self.generator(0)).render(1)?;
        self.executor.exec(&statement);
        Ok(RunSummary {
            executed: 1,
            interrupted: false,
            elapsed: started.elapsed(),
        })
    }

    fn looped(&self, iterations: u64, threads: usize) -> Result<RunSummary> {
        let started = Instant::now();
        let name = self.template.name();
        // Raised by the first worker that fails to render.
        let abort = AtomicBool::new(false);

        let joined = thread::scope(|s| {
            let mut handles = Vec::with_capacity(threads);
            for (worker, range) in partition(iterations, threads).into_iter().enumerate() {
                let abort = &abort;
                let spawned = thread::Builder::new()
                    .name(format!("{name}-{worker}"))
                    .spawn_scoped(s, move || self.work(worker, range, abort));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        abort.store(true, Ordering::SeqCst);
                        return Err(Error::Spawn(e));
                    }
                }
            }
            Ok(handles.into_iter().map(|h| h.join()).collect::<Vec<_>>())
        })?;

        let mut summary = RunSummary {
            executed: 0,
            interrupted: false,
            elapsed: Duration::ZERO,
        };
        let mut failure = None;
        for (worker, result) in joined.into_iter().enumerate() {
            match result {
                Ok(Ok(report)) => {
                    summary.executed += report.executed;
                    summary.interrupted |= report.interrupted;
                }
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    failure.get_or_insert(Error::WorkerPanicked {
                        name: name.to_string(),
                        worker,
                    });
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    fn work(&self, worker: usize, range: WorkRange, abort: &AtomicBool) -> Result<WorkerReport> {
        let name = self.template.name();
        let mut listener = self.cancel.listen();
        let renderer = self.template.renderer(self.generator(worker));
        let mut report = WorkerReport::default();

        debug!(benchmark = name, worker, from = range.from, to = range.to, "worker started");
        for iter in range.iter() {
            if listener.interrupted() {
                warn!(benchmark = name, worker, iter, "worker interrupted");
                report.interrupted = true;
                break;
            }
            if abort.load(Ordering::SeqCst) {
                break;
            }

            let statement = match renderer.render(iter) {
                Ok(statement) => statement,
                Err(e) => {
                    warn!(benchmark = name, worker, iter, error = %e, "aborting run");
                    abort.store(true, Ordering::SeqCst);
                    return Err(e);
                }
            };
            self.executor.exec(&statement);
            report.executed += 1;
        }
        debug!(benchmark = name, worker, executed = report.executed, "worker finished");

        Ok(report)
    }

    fn detach<F>(self, task: F) -> Result<RunHandle>
    where
        F: FnOnce(&Self) -> Result<RunSummary> + Send + 'static,
    {
        let name = self.template.name().to_string();
        let inner = thread::Builder::new()
            .name(format!("{name}-detached"))
            .spawn(move || task(&self))?;
        Ok(RunHandle { name, inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Mutex;

    /// Records every statement together with the thread that executed it.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String)>>,
        delay: Option<Duration>,
        interrupt_after: Option<(usize, CancellationSource)>,
        panic_on: Option<&'static str>,
    }

    impl Recorder {
        fn statements(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
        }

        fn iterations(&self) -> Vec<u64> {
            self.statements().iter().map(|s| s.parse().unwrap()).collect()
        }
    }

    impl Executor for Recorder {
        fn benchmarks(&self) -> Vec<Benchmark> {
            Vec::new()
        }

        fn exec(&self, statement: &str) {
            if self.panic_on.is_some_and(|p| p == statement) {
                panic!("connection lost at {statement}");
            }
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            let thread_name = thread::current().name().unwrap_or_default().to_string();
            let count = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((thread_name, statement.to_string()));
                calls.len()
            };
            if let Some((after, cancel)) = &self.interrupt_after {
                if count == *after {
                    cancel.interrupt();
                }
            }
        }
    }

    fn scheduler(recorder: Recorder) -> Scheduler<Recorder> {
        Scheduler::new(Arc::new(recorder)).with_cancellation(CancellationSource::new())
    }

    #[test]
    fn should_execute_once_when_once_sequential() {
        let s = scheduler(Recorder::default());
        let outcome = s.run(&Benchmark::once("once", "{{Iter}}"), 100, 4).unwrap();

        assert!(!outcome.is_detached());
        assert_eq!(s.executor().iterations(), vec![1]);
        assert_eq!(outcome.wait().unwrap().executed, 1);
    }

    #[test]
    fn should_execute_once_in_background_when_once_parallel() {
        let s = scheduler(Recorder::default());
        let outcome = s
            .run(&Benchmark::once("once", "{{Iter}}").parallel(true), 100, 4)
            .unwrap();

        assert!(outcome.is_detached());
        let summary = outcome.wait().unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(s.executor().iterations(), vec![1]);
    }

    #[test]
    fn should_execute_every_iteration_exactly_once_when_loop_sequential() {
        let s = scheduler(Recorder::default());
        let outcome = s.run(&Benchmark::looped("loop", "{{Iter}}"), 10, 3).unwrap();

        assert!(!outcome.is_detached());
        let summary = outcome.wait().unwrap();
        assert_eq!(summary.executed, 10);
        assert!(!summary.interrupted);

        let mut iters = s.executor().iterations();
        iters.sort_unstable();
        assert_eq!(iters, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn should_split_work_between_named_workers() {
        let s = scheduler(Recorder::default());
        s.run(&Benchmark::looped("split", "{{Iter}}"), 10, 3).unwrap();

        let mut per_worker: HashMap<String, Vec<u64>> = HashMap::new();
        for (thread_name, stmt) in s.executor().calls.lock().unwrap().iter() {
            per_worker
                .entry(thread_name.clone())
                .or_default()
                .push(stmt.parse().unwrap());
        }
        assert_eq!(per_worker["split-0"], vec![1, 2, 3]);
        assert_eq!(per_worker["split-1"], vec![4, 5, 6]);
        assert_eq!(per_worker["split-2"], vec![7, 8, 9, 10]);
    }

    #[test]
    fn should_only_use_last_worker_when_fewer_iterations_than_threads() {
        let s = scheduler(Recorder::default());
        let summary = s
            .run(&Benchmark::looped("few", "{{Iter}}"), 2, 3)
            .unwrap()
            .wait()
            .unwrap();

        assert_eq!(summary.executed, 2);
        let threads: BTreeSet<String> = s
            .executor()
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect();
        assert_eq!(threads.into_iter().collect::<Vec<_>>(), vec!["few-2".to_string()]);
    }

    #[test]
    fn should_run_whole_loop_in_background_when_loop_parallel() {
        let s = scheduler(Recorder::default());
        let outcome = s
            .run(&Benchmark::looped("bg", "{{Iter}}").parallel(true), 12, 4)
            .unwrap();

        assert!(outcome.is_detached());
        let summary = outcome.wait().unwrap();
        assert_eq!(summary.executed, 12);
        assert_eq!(s.executor().statements().len(), 12);
    }

    #[test]
    fn should_report_dispatch_latency_only_when_detached() {
        let s = scheduler(Recorder {
            delay: Some(Duration::from_millis(10)),
            ..Default::default()
        });
        let outcome = s
            .run(&Benchmark::looped("slow", "{{Iter}}").parallel(true), 3, 1)
            .unwrap();
        let dispatched = outcome.elapsed();
        let summary = outcome.wait().unwrap();

        assert!(summary.elapsed >= Duration::from_millis(30));
        assert!(dispatched < summary.elapsed);
    }

    #[test]
    fn should_wait_for_workers_when_sequential() {
        let s = scheduler(Recorder {
            delay: Some(Duration::from_millis(10)),
            ..Default::default()
        });
        let outcome = s.run(&Benchmark::looped("slow", "{{Iter}}"), 3, 1).unwrap();
        assert!(outcome.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn should_execute_in_increasing_order_within_worker() {
        let s = scheduler(Recorder::default());
        s.run(&Benchmark::looped("ordered", "{{Iter}}"), 50, 1).unwrap();
        assert_eq!(s.executor().iterations(), (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn should_reject_loop_without_threads() {
        let s = scheduler(Recorder::default());
        let err = s.run(&Benchmark::looped("none", "{{Iter}}"), 10, 0).unwrap_err();
        assert!(matches!(err, Error::NoThreads { .. }));
        assert!(s.executor().statements().is_empty());
    }

    #[test]
    fn should_ignore_thread_count_when_once() {
        let s = scheduler(Recorder::default());
        let outcome = s.run(&Benchmark::once("once", "{{Iter}}"), 10, 0).unwrap();
        assert_eq!(outcome.wait().unwrap().executed, 1);
    }

    #[test]
    fn should_report_panicking_worker_when_loop_sequential() {
        let s = scheduler(Recorder {
            panic_on: Some("7"),
            ..Default::default()
        });
        let err = s.run(&Benchmark::looped("boom", "{{Iter}}"), 10, 2).unwrap_err();
        match err {
            Error::WorkerPanicked { name, worker } => {
                assert_eq!(name, "boom");
                assert_eq!(worker, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(s.executor().iterations().contains(&5));
    }

    #[test]
    fn should_report_panic_from_detached_run() {
        let s = scheduler(Recorder {
            panic_on: Some("1"),
            ..Default::default()
        });
        let outcome = s
            .run(&Benchmark::once("boom", "{{Iter}}").parallel(true), 1, 1)
            .unwrap();
        assert!(matches!(
            outcome.wait(),
            Err(Error::WorkerPanicked { worker: 0, .. })
        ));
    }

    #[test]
    fn should_fail_before_executing_when_template_invalid() {
        let s = scheduler(Recorder::default());
        let err = s.run(&Benchmark::looped("bad", "SELECT {{Iter"), 10, 2).unwrap_err();
        assert!(matches!(err, Error::TemplateSyntax { .. }));
        assert!(s.executor().statements().is_empty());
    }

    #[test]
    fn should_abort_run_when_render_fails() {
        let s = scheduler(Recorder::default());
        let err = s
            .run(&Benchmark::looped("render", "{{RandInt63n 0}}"), 10, 2)
            .unwrap_err();
        assert!(matches!(err, Error::TemplateRender { .. }));
        assert!(s.executor().statements().is_empty());
    }

    #[test]
    fn should_surface_render_error_from_detached_run() {
        let s = scheduler(Recorder::default());
        let outcome = s
            .run(&Benchmark::once("render", "{{Nope}}").parallel(true), 1, 1)
            .unwrap();
        assert!(matches!(outcome.wait(), Err(Error::TemplateRender { iter: 1, .. })));
    }

    #[test]
    fn should_stop_after_in_flight_iteration_when_interrupted() {
        let cancel = CancellationSource::new();
        let recorder = Recorder {
            interrupt_after: Some((5, cancel.clone())),
            ..Default::default()
        };
        let s = Scheduler::new(Arc::new(recorder)).with_cancellation(cancel);

        let summary = s
            .run(&Benchmark::looped("cancel", "{{Iter}}"), 100, 1)
            .unwrap()
            .wait()
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.executed, 5);
        assert_eq!(s.executor().iterations(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn should_stop_every_worker_when_interrupted() {
        let cancel = CancellationSource::new();
        let recorder = Recorder {
            interrupt_after: Some((5, cancel.clone())),
            ..Default::default()
        };
        let s = Scheduler::new(Arc::new(recorder)).with_cancellation(cancel);

        let summary = s
            .run(&Benchmark::looped("cancel", "{{Iter}}"), 100, 4)
            .unwrap()
            .wait()
            .unwrap();

        assert!(summary.interrupted);
        assert!(summary.executed < 100);
        assert_eq!(summary.executed as usize, s.executor().statements().len());
    }

    #[test]
    fn should_ignore_interrupt_raised_before_run() {
        let s = scheduler(Recorder::default());
        s.cancellation().interrupt();

        let summary = s
            .run(&Benchmark::looped("late", "{{Iter}}"), 8, 2)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(summary.executed, 8);
        assert!(!summary.interrupted);
    }

    #[test]
    fn should_generate_same_statements_when_seeded() {
        let bench = Benchmark::looped("seeded", "{{RandInt63}}");

        let a = scheduler(Recorder::default()).seed(7);
        a.run(&bench, 20, 1).unwrap();
        let b = scheduler(Recorder::default()).seed(7);
        b.run(&bench, 20, 1).unwrap();

        assert_eq!(a.executor().statements(), b.executor().statements());
    }

    #[test]
    fn should_give_workers_independent_generators() {
        let bench = Benchmark::looped("streams", "{{RandInt63}}");
        let s = scheduler(Recorder::default()).seed(3);
        s.run(&bench, 4, 2).unwrap();

        let calls = s.executor().calls.lock().unwrap().clone();
        let first = |worker: &str| {
            calls
                .iter()
                .find(|(t, _)| t == worker)
                .map(|(_, stmt)| stmt.clone())
                .unwrap()
        };
        assert_ne!(first("streams-0"), first("streams-1"));
    }

    #[test]
    fn should_run_through_free_function() {
        let executor = Arc::new(Recorder::default());
        let outcome = run(&executor, &Benchmark::once("free", "SELECT {{Iter}}"), 1, 1).unwrap();
        assert_eq!(outcome.wait().unwrap().executed, 1);
        assert_eq!(executor.statements(), vec!["SELECT 1".to_string()]);
    }
}
