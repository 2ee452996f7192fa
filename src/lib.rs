//! # dbstress
//!
//! A template-driven statement load generator for database stress tests.
//!
//! A [`Benchmark`] pairs a statement template with an execution mode. The
//! [`Scheduler`] compiles the template once, renders one concrete statement
//! per iteration and hands it to an [`Executor`], either once or in a loop
//! split across a fixed number of worker threads. Workers stop early, at an
//! iteration boundary, when the process receives Ctrl-C.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dbstress::{Benchmark, Executor, Scheduler};
//!
//! struct Client;
//!
//! impl Executor for Client {
//!     fn benchmarks(&self) -> Vec<Benchmark> {
//!         vec![Benchmark::looped(
//!             "insert",
//!             "INSERT INTO t (id, v) VALUES ({{Iter}}, {{RandInt63n 1000}})",
//!         )]
//!     }
//!
//!     fn exec(&self, statement: &str) {
//!         // send `statement` to the database
//!         let _ = statement;
//!     }
//! }
//!
//! let client = Arc::new(Client);
//! let scheduler = Scheduler::new(Arc::clone(&client));
//! for benchmark in client.benchmarks() {
//!     let outcome = scheduler.run(&benchmark, 10_000, 8).unwrap();
//!     println!("{}: {:?}", benchmark.name, outcome.elapsed());
//! }
//! ```
//!
//! ## Features
//!
//! - **`ctrl-c`** (default): [`forward_ctrl_c`] turns SIGINT into an interrupt
//!   on a [`CancellationSource`]

mod benchmark;
mod cancel;
mod config;
mod context;
mod error;
mod executor;
mod partition;
mod report;
mod result;
mod runner;
mod scheduler;
mod template;

pub use benchmark::{BenchType, Benchmark};
pub use cancel::{CancellationSource, Listener};
pub use config::RunnerConfig;
pub use context::{Generator, InvalidBound, IterationContext};
pub use error::{Error, Result};
pub use executor::{Executor, StdoutExecutor};
pub use partition::{partition, work_range, WorkRange};
pub use report::{ConsoleReporter, MultiReporter, Reporter};
pub use result::{BenchResult, SuiteResult};
pub use runner::BenchRunner;
pub use scheduler::{run, RunHandle, RunOutcome, RunSummary, Scheduler};
pub use template::{Renderer, StatementTemplate};

#[cfg(feature = "ctrl-c")]
pub use cancel::forward_ctrl_c;
