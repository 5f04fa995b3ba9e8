//! The applied log: decrements a saga has made and must be able to undo.

use inventory::ProductId;
use serde::{Deserialize, Serialize};

/// One successful forward decrement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedStep {
    /// Position in the applied log, starting at 0.
    pub sequence: usize,
    pub product_id: ProductId,
    pub quantity: u64,
    /// Set once the matching compensating increment has succeeded.
    pub compensated: bool,
}

/// Ordered record of applied decrements.
///
/// Compensation walks the log newest-first and marks entries as it undoes
/// them, so an interrupted or partially failed rollback can be resumed from
/// exactly the entries still outstanding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedLog {
    steps: Vec<AppliedStep>,
}

impl AppliedLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a decrement and returns its sequence number.
    pub fn push(&mut self, product_id: ProductId, quantity: u64) -> usize {
        let sequence = self.steps.len();
        self.steps.push(AppliedStep {
            sequence,
            product_id,
            quantity,
            compensated: false,
        });
        sequence
    }

    /// Marks the step as compensated. Returns false if it was unknown or
    /// already compensated.
    pub fn mark_compensated(&mut self, sequence: usize) -> bool {
        match self.steps.get_mut(sequence) {
            Some(step) if !step.compensated => {
                step.compensated = true;
                true
            }
            _ => false,
        }
    }

    /// Steps still to be undone, newest first.
    pub fn outstanding(&self) -> impl Iterator<Item = &AppliedStep> {
        self.steps.iter().rev().filter(|s| !s.compensated)
    }

    pub fn outstanding_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.compensated).count()
    }

    /// All steps in application order.
    pub fn steps(&self) -> &[AppliedStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns true if every applied step has been undone.
    pub fn is_fully_compensated(&self) -> bool {
        self.steps.iter().all(|s| s.compensated)
    }
}
