//! Error types and the aggregation of evaluation errors.

use crate::value::Kind;
use std::fmt::{self, Write as _};
use thiserror::Error;
use unicfg_eval::{BasicType, EvalError};

/// Everything that can fail while loading, reading or decoding configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A fragment could not be parsed; no document was built.
    #[error("{source} (path: {path})")]
    Fragment {
        path: String,
        #[source]
        source: Box<ConfigError>,
    },

    /// Exactly one evaluation error, passed through unchanged.
    #[error(transparent)]
    Eval(EvalError),

    /// Two or more evaluation errors.
    #[error(transparent)]
    Multi(MultiError),

    #[error("cannot use {found} value as {expected} (position: {position})")]
    TypeMismatch {
        expected: &'static str,
        found: Kind,
        position: String,
    },

    /// The node is a constraint that no fragment made concrete.
    #[error("incomplete value {constraint} (position: {position})")]
    Incomplete {
        constraint: BasicType,
        position: String,
    },

    #[error("value {value} out of range for {target} (position: {position})")]
    OutOfRange {
        value: String,
        target: &'static str,
        position: String,
    },

    #[error("cannot select {selector} from {kind} value (position: {position})")]
    InvalidSelector {
        selector: String,
        kind: Kind,
        position: String,
    },

    #[error("invalid source type {kind} (position: {position})")]
    UnsupportedKind { kind: Kind, position: String },

    #[error("marshal error: {message} (position: {position})")]
    Serialization { message: String, position: String },

    #[error("structural decode failed: {source} (position: {position})")]
    StructuralDecode {
        #[source]
        source: serde_json::Error,
        position: String,
    },

    /// A list element failed to extract.
    #[error("{source} (field: {label})")]
    Element {
        label: String,
        #[source]
        source: Box<ConfigError>,
    },

    /// A target's own decoder failed on the node at `position`.
    #[error("{source} (position: {position})")]
    AtPosition {
        position: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("{0}")]
    Custom(String),
}

impl ConfigError {
    /// Build an error from a target's own decoding logic.
    pub fn custom(message: impl fmt::Display) -> Self {
        ConfigError::Custom(message.to_string())
    }
}

/// Two or more evaluation errors, rendered most recently discovered first.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiError {
    errors: Vec<EvalError>,
}

impl MultiError {
    /// Errors in discovery order.
    pub fn errors(&self) -> &[EvalError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("Multiple config errors:\n");
        for (index, error) in self.errors.iter().enumerate().rev() {
            writeln!(out, "  {}) {}", index, error.message())?;
            writeln!(out, "  \tPath: {}", error.path().join("."))?;
            for (n, position) in error.positions().iter().enumerate() {
                writeln!(out, "  \tPos #{}: {}", n, position)?;
            }
        }
        f.write_str(out.trim())
    }
}

impl std::error::Error for MultiError {}

/// Normalize an evaluation error set: none is `None`, one is returned as is,
/// more become a [`MultiError`].
pub fn aggregate(mut errors: Vec<EvalError>) -> Option<ConfigError> {
    match errors.len() {
        0 => None,
        1 => errors.pop().map(ConfigError::Eval),
        _ => Some(ConfigError::Multi(MultiError { errors })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unicfg_eval::{EvalErrorKind, SourceInfo};

    fn pos(file: &str, line: usize, col: usize) -> SourceInfo {
        SourceInfo::new(Some(file.into()), 0, line, col, 0)
    }

    fn conflict(path: &str, a: &str, b: &str) -> EvalError {
        EvalError::new(
            EvalErrorKind::Conflict,
            "conflicting values {} and {}",
            vec![a.into(), b.into()],
        )
        .at_path(&path.split('.').map(str::to_string).collect::<Vec<_>>())
        .with_positions([&pos("a.yaml", 1, 4), &pos("b.yaml", 2, 6)])
    }

    #[test]
    fn test_aggregate_empty_is_none() {
        assert!(aggregate(Vec::new()).is_none());
    }

    #[test]
    fn test_aggregate_single_is_unchanged() {
        let original = conflict("server.port", "1", "2");
        match aggregate(vec![original.clone()]) {
            Some(ConfigError::Eval(e)) => assert_eq!(e, original),
            other => panic!("expected single error, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_error_renders_in_reverse_order() {
        let errors = vec![
            conflict("server.port", "1", "2"),
            EvalError::new(
                EvalErrorKind::UnresolvedReference,
                "reference {} not found",
                vec!["db.host".into()],
            )
            .at_path(&["backup".into()])
            .with_positions([&pos("c.yaml", 3, 9)]),
        ];
        let Some(ConfigError::Multi(multi)) = aggregate(errors) else {
            panic!("expected multi error");
        };
        assert_eq!(multi.len(), 2);
        insta::assert_snapshot!(multi.to_string(), @"Multiple config errors:\n  1) reference db.host not found\n  \tPath: backup\n  \tPos #0: c.yaml:3:9\n  0) conflicting values 1 and 2\n  \tPath: server.port\n  \tPos #0: a.yaml:1:4\n  \tPos #1: b.yaml:2:6");
    }

    #[test]
    fn test_fragment_error_names_path() {
        let err = ConfigError::Fragment {
            path: "conf/app.yaml".into(),
            source: Box::new(ConfigError::custom("boom")),
        };
        assert_eq!(err.to_string(), "boom (path: conf/app.yaml)");
    }
}
