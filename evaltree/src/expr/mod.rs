// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Expression execution.
//!
//! The evaluator does not care how an expression is run. It hands the code,
//! a read-only [`Scope`] over the current snapshot and a [`Budget`] to an
//! [`ExpressionEngine`] and stores whatever comes back. [`SimpleEngine`] is
//! the bundled engine: literals, path and index access, arithmetic,
//! comparison, logic and the conditional operator.

mod interp;
pub(crate) mod lexer;
mod parser;

use core::fmt;
use core::time::Duration;
use std::time::Instant;

use crate::binding::{self, Segment};
use crate::error::ExecutionError;
use crate::value::Value;

pub use interp::SimpleEngine;

/// Read access to evaluated values during a pass.
pub trait Scope {
    /// Returns the value at `segments` (`["Input1", "text"]`), or `None` if
    /// nothing lives there.
    fn lookup(&self, segments: &[&str]) -> Option<Value>;

    /// Returns `true` if `root` names an entity.
    fn is_defined(&self, root: &str) -> bool;
}

/// Runs expression code.
pub trait ExpressionEngine: fmt::Debug + Send + Sync {
    /// Evaluates `code` against `scope`, charging work to `budget`.
    fn evaluate(&self, code: &str, scope: &dyn Scope, budget: &mut Budget)
    -> Result<Value, ExecutionError>;
}

/// Step and time allowance of one expression.
///
/// Engines call [`tick`](Self::tick) once per unit of work. The deadline is
/// checked every few ticks rather than on each one.
#[derive(Clone, Debug)]
pub struct Budget {
    steps_left: u64,
    used: u64,
    deadline: Option<Instant>,
}

impl Budget {
    const CLOCK_INTERVAL: u64 = 64;

    /// Creates a budget of `steps` with an optional wall-clock limit.
    #[must_use]
    pub fn new(steps: u64, time: Option<Duration>) -> Self {
        Self {
            steps_left: steps,
            used: 0,
            deadline: time.map(|t| Instant::now() + t),
        }
    }

    /// Creates a budget that never runs out.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(u64::MAX, None)
    }

    /// Charges one step.
    pub fn tick(&mut self) -> Result<(), ExecutionError> {
        if self.steps_left == 0 {
            return Err(ExecutionError::BudgetExceeded);
        }
        self.steps_left -= 1;
        self.used += 1;
        if self.used % Self::CLOCK_INTERVAL == 0
            && self.deadline.is_some_and(|d| Instant::now() >= d)
        {
            return Err(ExecutionError::BudgetExceeded);
        }
        Ok(())
    }

    /// Steps charged so far.
    #[must_use]
    pub fn used(&self) -> u64 {
        self.used
    }
}

/// Evaluates a `{{ }}` template.
///
/// A value that is exactly one binding yields the binding's raw value. Any
/// surrounding text makes the result a string with each binding substituted.
pub fn evaluate_template(
    engine: &dyn ExpressionEngine,
    text: &str,
    scope: &dyn Scope,
    budget: &mut Budget,
) -> Result<Value, ExecutionError> {
    let segments = binding::segments(text);
    if let [Segment::Binding(code)] = segments.as_slice() {
        return engine.evaluate(code, scope, budget);
    }
    let mut out = String::with_capacity(text.len());
    for segment in segments {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Binding(code) => {
                out.push_str(&engine.evaluate(code, scope, budget)?.to_template_string());
            }
        }
    }
    Ok(Value::Data(serde_json::Value::String(out)))
}
