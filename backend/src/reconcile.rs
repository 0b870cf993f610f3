//! Kill-set computation.

use crate::types::{NoBaselineReason, ProcError, ProcessSet};

/// `current \ (baseline ∪ protected)`.
pub fn reconcile(current: &ProcessSet, baseline: &ProcessSet, protected: &ProcessSet) -> ProcessSet {
    current.difference_of_both(baseline, protected)
}

/// Reconciles snapshots against a keep-list with a fixed protected set.
#[derive(Debug, Clone)]
pub struct Reconciler {
    protected: ProcessSet,
}

impl Reconciler {
    pub fn new(protected: ProcessSet) -> Self {
        Self { protected }
    }

    pub fn protected(&self) -> &ProcessSet {
        &self.protected
    }

    /// Kill-set for `current`. An empty keep-list is an error: it means
    /// nothing was configured, not that everything should go.
    pub fn kill_set(&self, current: &ProcessSet, baseline: &ProcessSet) -> Result<ProcessSet, ProcError> {
        if baseline.is_empty() {
            return Err(ProcError::NoBaseline(NoBaselineReason::Empty));
        }
        Ok(reconcile(current, baseline, &self.protected))
    }

    /// Drop protected names from a set computed elsewhere.
    pub fn strip_protected(&self, set: &ProcessSet) -> ProcessSet {
        set.difference_of_both(&self.protected, &ProcessSet::new())
    }
}
