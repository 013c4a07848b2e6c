// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coalescing change submissions into passes.
//!
//! Producers submit [`ChangeBatch`]es whenever something changes. The
//! [`Scheduler`] folds everything submitted while a debounce window is open
//! into one batch and runs a single pass for it, delivering the result to its
//! [`PatchSink`]. The scheduler owns no thread or clock; the host calls
//! [`Scheduler::poll`] with the current time from whatever loop it runs.

use core::time::Duration;
use std::time::Instant;

use crate::batch::ChangeBatch;
use crate::error::EvalResult;
use crate::evaluator::Evaluator;
use crate::snapshot::Snapshot;
use crate::transport::PatchSink;

/// Runs passes for submitted changes and delivers their results.
#[derive(Debug)]
pub struct Scheduler<S> {
    evaluator: Evaluator,
    sink: S,
    pending: ChangeBatch,
    pending_since: Option<Instant>,
    debounce: Duration,
    passes: u64,
}

impl<S: PatchSink> Scheduler<S> {
    /// Wraps `evaluator`, using its configured debounce window.
    pub fn new(evaluator: Evaluator, sink: S) -> Self {
        let debounce = evaluator.config().debounce;
        Self {
            evaluator,
            sink,
            pending: ChangeBatch::new(),
            pending_since: None,
            debounce,
            passes: 0,
        }
    }

    /// Queues `batch`, merging it with whatever is already pending.
    ///
    /// The batch is checked against the pending changes first. A batch that
    /// names an unknown entity or path is rejected here and leaves the
    /// pending changes as they were. The debounce window opens with the
    /// first submission after a pass and is not extended by later ones.
    pub fn submit(&mut self, batch: ChangeBatch) -> EvalResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.evaluator.validate_all(&[&self.pending, &batch])?;
        self.pending.merge(batch);
        self.pending_since.get_or_insert_with(Instant::now);
        Ok(())
    }

    /// Queues `batch`, discarding whatever is pending.
    ///
    /// A rejected batch leaves the pending changes in place.
    pub fn replace_pending(&mut self, batch: ChangeBatch) -> EvalResult<()> {
        self.evaluator.validate_all(&[&batch])?;
        if !self.pending.is_empty() {
            tracing::warn!("pending changes superseded by a newer batch");
        }
        self.pending_since = (!batch.is_empty()).then(Instant::now);
        self.pending = batch;
        Ok(())
    }

    /// Returns `true` if changes are waiting for a pass.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Returns `true` if the pending changes have waited out the window.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.pending_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.debounce)
    }

    /// Runs a pass if one is due. Returns `true` if a batch was delivered.
    pub fn poll(&mut self, now: Instant) -> EvalResult<bool> {
        if self.is_due(now) {
            self.flush()
        } else {
            Ok(false)
        }
    }

    /// Runs a pass for the pending changes now, ignoring the window.
    ///
    /// Returns `true` if a batch was delivered. Submissions were checked on
    /// arrival, so the pass only fails if the tree was changed through
    /// [`evaluator_mut`](Self::evaluator_mut) in the meantime or an extractor
    /// reports a fatal integrity error. The pending changes are dropped and
    /// the error returned.
    pub fn flush(&mut self) -> EvalResult<bool> {
        if self.pending_since.take().is_none() {
            return Ok(false);
        }
        let batch = core::mem::take(&mut self.pending);
        let update = self.evaluator.apply(batch)?;
        self.passes += 1;
        tracing::debug!(
            pass = self.passes,
            patches = update.patches.len(),
            "delivering update batch"
        );
        self.sink.deliver(update);
        Ok(true)
    }

    /// Number of passes run so far.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// The wrapped evaluator.
    #[must_use]
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Mutable access to the wrapped evaluator, for loading or queries.
    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    /// A copy of the current evaluated values.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.evaluator.snapshot().clone()
    }

    /// The sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Splits the scheduler back into its evaluator and sink. Pending
    /// changes are dropped.
    pub fn into_parts(self) -> (Evaluator, S) {
        (self.evaluator, self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorConfig;
    use crate::entity::{Entity, EntityConfig, EntityKind, EntityRecord};
    use crate::error::EvalError;
    use crate::transport::UpdateBatch;
    use serde_json::json;

    fn scheduler(debounce: Duration) -> Scheduler<Vec<UpdateBatch>> {
        let config = EvaluatorConfig::builder().debounce(debounce).build();
        let mut evaluator = Evaluator::new(config);
        evaluator
            .load([
                EntityRecord::new(
                    EntityConfig::new("Input1", EntityKind::WIDGET),
                    Entity::from_json(json!({ "text": "a" })),
                ),
                EntityRecord::new(
                    EntityConfig::new("Text1", EntityKind::WIDGET).with_dynamic_path("text"),
                    Entity::from_json(json!({ "text": "{{Input1.text}}" })),
                ),
            ])
            .unwrap();
        Scheduler::new(evaluator, Vec::new())
    }

    #[test]
    fn submissions_in_one_window_run_once() {
        let mut s = scheduler(Duration::from_secs(60));
        s.submit(ChangeBatch::new().set_value("Input1.text", json!("b")))
            .unwrap();
        s.submit(ChangeBatch::new().set_value("Input1.text", json!("c")))
            .unwrap();
        assert!(!s.poll(Instant::now()).unwrap());
        assert!(s.has_pending());

        assert!(s.flush().unwrap());
        assert_eq!(s.passes(), 1);
        assert_eq!(s.sink().len(), 1);
        assert_eq!(
            s.snapshot().get("Text1.text").map(|v| v.to_json()),
            Some(json!("c"))
        );
        assert!(!s.flush().unwrap());
    }

    #[test]
    fn zero_window_is_due_immediately() {
        let mut s = scheduler(Duration::ZERO);
        s.submit(ChangeBatch::new().set_value("Input1.text", json!("b")))
            .unwrap();
        assert!(s.poll(Instant::now()).unwrap());
        assert!(!s.has_pending());
    }

    #[test]
    fn replacing_drops_earlier_submissions() {
        let mut s = scheduler(Duration::ZERO);
        s.submit(ChangeBatch::new().set_value("Input1.text", json!("b")))
            .unwrap();
        s.replace_pending(ChangeBatch::new().force_update("Text1.text"))
            .unwrap();
        s.flush().unwrap();
        let (evaluator, sink) = s.into_parts();
        assert_eq!(
            evaluator.value("Input1.text").map(|v| v.to_json()),
            Some(json!("a"))
        );
        assert_eq!(sink[0].patches.len(), 1);
        assert_eq!(sink[0].patches[0].path, "Text1.text");
    }

    #[test]
    fn rejected_submissions_keep_earlier_edits() {
        let mut s = scheduler(Duration::ZERO);
        s.submit(ChangeBatch::new().set_value("Input1.text", json!("b")))
            .unwrap();
        let err = s.submit(ChangeBatch::new().remove_entity("Nope")).unwrap_err();
        assert!(matches!(err, EvalError::UnknownEntity(n) if n == "Nope"));
        assert!(s
            .replace_pending(ChangeBatch::new().mark_changed("Input1.nope"))
            .is_err());

        assert!(s.flush().unwrap());
        assert_eq!(
            s.snapshot().get("Text1.text").map(|v| v.to_json()),
            Some(json!("b"))
        );
        assert_eq!(s.sink().len(), 1);
    }

    #[test]
    fn submissions_are_checked_in_order() {
        let mut s = scheduler(Duration::ZERO);
        s.submit(ChangeBatch::new().set_value("Input1.text", json!("b")))
            .unwrap();
        s.submit(ChangeBatch::new().remove_entity("Input1")).unwrap();
        assert!(s
            .submit(ChangeBatch::new().set_value("Input1.text", json!("c")))
            .is_err());
        s.submit(ChangeBatch::new().upsert_entity(
            EntityConfig::new("Input1", EntityKind::WIDGET),
            Entity::from_json(json!({ "text": "d" })),
        ))
        .unwrap();

        assert!(s.flush().unwrap());
        assert_eq!(
            s.snapshot().get("Text1.text").map(|v| v.to_json()),
            Some(json!("d"))
        );
    }

    #[test]
    fn passes_over_a_changed_tree_can_still_fail() {
        let mut s = scheduler(Duration::ZERO);
        s.submit(ChangeBatch::new().set_value("Input1.text", json!("b")))
            .unwrap();
        s.evaluator_mut().load([]).unwrap();
        assert!(s.flush().is_err());
        assert!(!s.has_pending());
        assert!(s.sink().is_empty());
    }
}
