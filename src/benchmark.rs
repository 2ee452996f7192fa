//! Benchmark descriptors.

use serde::{Deserialize, Serialize};

/// How often a benchmark's statement is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchType {
    /// Execute the statement `iterations` times across `threads` workers.
    #[default]
    Loop,
    /// Execute the statement exactly once, with `Iter = 1`.
    Once,
}

/// A named statement template plus its execution mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benchmark {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: BenchType,
    /// Launch the run on a detached thread instead of blocking the caller.
    #[serde(default)]
    pub parallel: bool,
    /// Statement template source.
    pub stmt: String,
}

impl Benchmark {
    pub fn new(name: impl Into<String>, kind: BenchType, stmt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            parallel: false,
            stmt: stmt.into(),
        }
    }

    /// Shorthand for a looping benchmark.
    pub fn looped(name: impl Into<String>, stmt: impl Into<String>) -> Self {
        Self::new(name, BenchType::Loop, stmt)
    }

    /// Shorthand for a single-shot benchmark.
    pub fn once(name: impl Into<String>, stmt: impl Into<String>) -> Self {
        Self::new(name, BenchType::Once, stmt)
    }

    /// Mark the benchmark as detached from the caller.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_sequential_loop_when_fields_missing() {
        let b: Benchmark = serde_json::from_str(r#"{"name": "x", "stmt": "SELECT 1"}"#).unwrap();
        assert_eq!(b.kind, BenchType::Loop);
        assert!(!b.parallel);
    }

    #[test]
    fn should_parse_lowercase_type_when_deserializing() {
        let b: Benchmark = serde_json::from_str(
            r#"{"name": "create", "type": "once", "parallel": true, "stmt": "CREATE TABLE t (id INT)"}"#,
        )
        .unwrap();
        assert_eq!(b, Benchmark::once("create", "CREATE TABLE t (id INT)").parallel(true));
    }
}
