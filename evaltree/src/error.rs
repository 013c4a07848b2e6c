// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Two families live here. [`EvalError`] is what a caller gets back from an
//! invalid call (an unknown path, a duplicate entity name, a malformed
//! configuration). [`PathError`] is data: it describes why one property
//! failed during a pass and is collected into the per-path error map, never
//! returned as `Err`.

use serde::Serialize;
use thiserror::Error;

/// Result type for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;

/// Caller-visible failures.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A path that is not part of the entity tree was named in a change set.
    #[error("unknown path: {0}")]
    UnknownPath(String),

    /// An entity that is not part of the tree was named.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Two entities in one load share a name.
    #[error("duplicate entity name: {0}")]
    DuplicateEntity(String),

    /// A path or entity name is not well formed.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// An extractor produced a dependency map for paths its entity does not own.
    #[error("malformed dependency map for {entity}: {path} is not one of its paths")]
    Integrity {
        /// The entity whose extractor misbehaved.
        entity: String,
        /// The offending key.
        path: String,
    },

    /// Configuration or batch could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a single expression execution.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The expression text could not be parsed.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// What went wrong.
        message: String,
        /// Byte offset into the expression text.
        offset: usize,
    },

    /// The expression parsed but failed while running.
    #[error("{0}")]
    Runtime(String),

    /// The expression used up its step or time budget.
    #[error("execution budget exceeded")]
    BudgetExceeded,
}

/// Classification of a per-path error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathErrorKind {
    /// The expression text could not be parsed.
    Syntax,
    /// The expression failed at runtime.
    Runtime,
    /// The expression exceeded its execution budget.
    BudgetExceeded,
    /// The path is a member of a dependency cycle.
    Cycle,
}

/// An error attached to one path in an evaluation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PathError {
    /// What kind of failure this is.
    pub kind: PathErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl PathError {
    /// Creates the error reported for members of a dependency cycle.
    #[must_use]
    pub fn cycle(path: &str) -> Self {
        Self {
            kind: PathErrorKind::Cycle,
            message: format!("cyclic dependency found while evaluating {path}"),
        }
    }
}

impl From<ExecutionError> for PathError {
    fn from(err: ExecutionError) -> Self {
        let kind = match &err {
            ExecutionError::Syntax { .. } => PathErrorKind::Syntax,
            ExecutionError::Runtime(_) => PathErrorKind::Runtime,
            ExecutionError::BudgetExceeded => PathErrorKind::BudgetExceeded,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_errors_map_to_kinds() {
        let err: PathError = ExecutionError::BudgetExceeded.into();
        assert_eq!(err.kind, PathErrorKind::BudgetExceeded);

        let err: PathError = ExecutionError::Syntax {
            message: "unexpected ')'".into(),
            offset: 3,
        }
        .into();
        assert_eq!(err.kind, PathErrorKind::Syntax);
        assert_eq!(err.message, "syntax error at offset 3: unexpected ')'");
    }

    #[test]
    fn cycle_error_names_the_path() {
        let err = PathError::cycle("Text1.text");
        assert_eq!(err.kind, PathErrorKind::Cycle);
        assert!(err.message.contains("Text1.text"));
    }
}
