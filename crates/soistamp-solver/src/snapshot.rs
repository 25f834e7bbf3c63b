//! Caller-owned copy of per-iteration instance state.
//!
//! Taken before a trial Newton step or timestep; restored if the trial is
//! abandoned, discarded if it is kept.

use soistamp_devices::soi::SavedIteration;
use soistamp_devices::Registry;

use crate::error::{Error, Result};

/// Operating points, modes and previous-iteration states of every
/// instance, in registry order.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSnapshot {
    saved: Vec<SavedIteration>,
}

impl IterationSnapshot {
    pub fn save(registry: &Registry) -> Self {
        let saved = registry
            .models()
            .iter()
            .flat_map(|m| m.instances())
            .map(|inst| inst.save_iteration())
            .collect();
        Self { saved }
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// Put every instance back to the saved state.
    ///
    /// Fails without touching anything if instances were added since.
    pub fn restore(self, registry: &mut Registry) -> Result<()> {
        let actual = registry.num_instances();
        if actual != self.saved.len() {
            return Err(Error::SnapshotMismatch {
                expected: self.saved.len(),
                actual,
            });
        }
        let instances = registry
            .models_mut()
            .iter_mut()
            .flat_map(|m| m.instances_mut().iter_mut());
        for (inst, saved) in instances.zip(self.saved) {
            inst.restore_iteration(saved);
        }
        Ok(())
    }

    /// Keep the current state.
    pub fn discard(self) {}
}
