// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Delivering pass results to the consumer.
//!
//! The evaluator runs apart from whoever renders its results. Each pass is
//! packaged into one [`UpdateBatch`] and handed to a [`PatchSink`]. Batches
//! serialize to JSON for consumers on the other side of a process or thread
//! boundary.

use std::collections::BTreeMap;
use std::sync::mpsc;

use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::diff::Patch;
use crate::error::{EvalResult, PathError};

/// The outcome of one evaluation pass, as seen by the consumer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatch {
    /// Value changes, in evaluation order.
    pub patches: Vec<Patch>,
    /// Errors of this pass, by path.
    pub errors: BTreeMap<String, Vec<PathError>>,
    /// Paths that ran in this pass, in the order they ran.
    pub evaluation_order: Vec<String>,
    /// Members of dependency cycles.
    pub cyclic_paths: Vec<String>,
    /// Leaf paths that stopped existing in this pass.
    pub removed_paths: Vec<String>,
    /// Paths whose value is `undefined` after this pass.
    pub undefined_paths: Vec<String>,
    /// Whether this batch came from the first pass over a fresh tree.
    pub is_first_tree: bool,
    /// Timing and size of the pass.
    pub diagnostics: Diagnostics,
}

impl UpdateBatch {
    /// A batch that changes nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if the batch carries no patches and no errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.errors.is_empty() && self.removed_paths.is_empty()
    }

    /// Serializes the batch to a JSON string.
    pub fn to_json(&self) -> EvalResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Receives update batches.
pub trait PatchSink {
    /// Takes ownership of one batch.
    fn deliver(&mut self, batch: UpdateBatch);
}

impl PatchSink for Vec<UpdateBatch> {
    fn deliver(&mut self, batch: UpdateBatch) {
        self.push(batch);
    }
}

impl PatchSink for mpsc::Sender<UpdateBatch> {
    fn deliver(&mut self, batch: UpdateBatch) {
        if self.send(batch).is_err() {
            tracing::warn!("update batch dropped: receiver is gone");
        }
    }
}

/// Adapts a closure into a [`PatchSink`].
pub struct FnSink<F>(pub F);

impl<F> core::fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FnSink").finish_non_exhaustive()
    }
}

impl<F: FnMut(UpdateBatch)> PatchSink for FnSink<F> {
    fn deliver(&mut self, batch: UpdateBatch) {
        (self.0)(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn empty_batch_serializes_with_every_field() {
        let out: serde_json::Value = serde_json::from_str(&UpdateBatch::empty().to_json().unwrap()).unwrap();
        assert_eq!(
            out,
            json!({
                "patches": [],
                "errors": {},
                "evaluationOrder": [],
                "cyclicPaths": [],
                "removedPaths": [],
                "undefinedPaths": [],
                "isFirstTree": false,
                "diagnostics": {
                    "durationUs": 0,
                    "affectedPaths": 0,
                    "totalPaths": 0,
                    "cyclicPaths": 0,
                },
            })
        );
        assert!(UpdateBatch::empty().is_empty());
    }

    #[test]
    fn channel_sink_delivers_in_order() {
        let (mut tx, rx) = mpsc::channel();
        for i in 0..3 {
            let mut batch = UpdateBatch::empty();
            batch.patches.push(Patch::set("A.x", Value::from(json!(i))));
            tx.deliver(batch);
        }
        let received: Vec<UpdateBatch> = rx.try_iter().collect();
        assert_eq!(received.len(), 3);
        assert_eq!(received[2].patches[0].value, Some(Value::from(json!(2))));
    }

    #[test]
    fn closed_channel_does_not_panic() {
        let (mut tx, rx) = mpsc::channel::<UpdateBatch>();
        drop(rx);
        tx.deliver(UpdateBatch::empty());
    }

    #[test]
    fn closures_are_sinks() {
        let mut count = 0;
        let mut sink = FnSink(|_batch: UpdateBatch| count += 1);
        sink.deliver(UpdateBatch::empty());
        sink.deliver(UpdateBatch::empty());
        drop(sink);
        assert_eq!(count, 2);
    }
}
