// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-pass measurements.

use core::time::Duration;
use std::time::Instant;

use serde::Serialize;

/// What one evaluation pass did and how long it took.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Wall-clock time of the pass, in microseconds.
    pub duration_us: u64,
    /// Paths visited by the pass.
    pub affected_paths: usize,
    /// Paths in the whole graph.
    pub total_paths: usize,
    /// Paths flagged as members of a dependency cycle.
    pub cyclic_paths: usize,
}

impl Diagnostics {
    /// Finishes a measurement started at `start` and logs it.
    pub(crate) fn finish(start: Instant, affected: usize, total: usize, cyclic: usize) -> Self {
        let diagnostics = Self {
            duration_us: u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
            affected_paths: affected,
            total_paths: total,
            cyclic_paths: cyclic,
        };
        tracing::debug!(
            duration_us = diagnostics.duration_us,
            affected,
            total,
            cyclic,
            "evaluation pass finished"
        );
        diagnostics
    }

    /// The pass duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_us)
    }

    /// Share of the graph the pass had to visit, between 0 and 1.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        reason = "a ratio does not need more than 52 bits of precision"
    )]
    pub fn affected_ratio(&self) -> f64 {
        if self.total_paths == 0 {
            0.0
        } else {
            self.affected_paths as f64 / self.total_paths as f64
        }
    }
}
