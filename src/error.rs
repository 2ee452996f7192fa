//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compiling, rendering or scheduling a benchmark.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse template of benchmark '{name}': {source}")]
    TemplateSyntax {
        name: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("failed to render statement {iter} of benchmark '{name}': {source}")]
    TemplateRender {
        name: String,
        iter: u64,
        #[source]
        source: Box<handlebars::RenderError>,
    },

    #[error("benchmark '{name}' needs at least one worker thread")]
    NoThreads { name: String },

    #[error("worker {worker} of benchmark '{name}' panicked")]
    WorkerPanicked { name: String, worker: usize },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("failed to read suite {path}: {source}")]
    SuiteIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid suite {path}: {source}")]
    SuiteFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Whether the error comes from the benchmark's template.
    pub fn is_template(&self) -> bool {
        matches!(
            self,
            Error::TemplateSyntax { .. } | Error::TemplateRender { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
