// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Evaluator configuration.

use core::time::Duration;

use serde::Deserialize;

use crate::error::EvalResult;

/// How to react when an extractor returns a dependency map with keys that do
/// not belong to the entity it was asked about.
///
/// Such a map means the entity modeling is broken, which is a programming
/// error rather than a user error.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityHandling {
    /// Panic in debug builds, degrade in release builds.
    #[default]
    DebugAssert,
    /// Fail the structural update with [`EvalError::Integrity`](crate::EvalError::Integrity).
    Fatal,
    /// Log a warning and treat the entity as having no dependencies.
    Degrade,
}

/// Runtime knobs of an [`Evaluator`](crate::Evaluator).
///
/// Every field has a default, so a partial JSON document is accepted:
///
/// ```
/// use core::time::Duration;
/// use evaltree::EvaluatorConfig;
///
/// let config = EvaluatorConfig::from_json_str(r#"{ "debounce_ms": 16 }"#).unwrap();
/// assert_eq!(config.debounce, Duration::from_millis(16));
/// assert_eq!(config.step_budget, 10_000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluatorConfig {
    /// Maximum interpreter steps per expression.
    pub step_budget: u64,
    /// Wall-clock budget per expression; zero disables the deadline.
    #[serde(rename = "time_budget_ms", with = "millis")]
    pub time_budget: Duration,
    /// How long the scheduler waits for more changes before running a pass.
    #[serde(rename = "debounce_ms", with = "millis")]
    pub debounce: Duration,
    /// Reaction to malformed extractor output.
    pub integrity: IntegrityHandling,
    /// Keep a path's previous value when its evaluation fails. When `false`
    /// the path becomes `undefined` instead.
    pub stale_on_error: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            step_budget: 10_000,
            time_budget: Duration::from_millis(50),
            debounce: Duration::ZERO,
            integrity: IntegrityHandling::default(),
            stale_on_error: true,
        }
    }
}

impl EvaluatorConfig {
    /// Parses a configuration from JSON, filling in defaults.
    pub fn from_json_str(json: &str) -> EvalResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> EvaluatorConfigBuilder {
        EvaluatorConfigBuilder::default()
    }

    /// Returns the per-expression deadline, if one is configured.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        (!self.time_budget.is_zero()).then_some(self.time_budget)
    }
}

/// Builder for [`EvaluatorConfig`].
#[derive(Clone, Debug, Default)]
pub struct EvaluatorConfigBuilder {
    config: EvaluatorConfig,
}

impl EvaluatorConfigBuilder {
    /// Sets the per-expression step budget.
    #[must_use]
    pub fn step_budget(mut self, steps: u64) -> Self {
        self.config.step_budget = steps;
        self
    }

    /// Sets the per-expression time budget.
    #[must_use]
    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.config.time_budget = budget;
        self
    }

    /// Sets the scheduler debounce window.
    #[must_use]
    pub fn debounce(mut self, window: Duration) -> Self {
        self.config.debounce = window;
        self
    }

    /// Sets the integrity handling policy.
    #[must_use]
    pub fn integrity(mut self, handling: IntegrityHandling) -> Self {
        self.config.integrity = handling;
        self
    }

    /// Sets whether failed paths keep their previous value.
    #[must_use]
    pub fn stale_on_error(mut self, stale: bool) -> Self {
        self.config.stale_on_error = stale;
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> EvaluatorConfig {
        self.config
    }
}

mod millis {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
