//! Immutable probability/cost snapshots shared by concurrent evaluators.
//!
//! A [`CostModel`] pairs a [`ProbabilityModel`] with the [`CostTable`] derived
//! from it. Readers only ever see a complete snapshot: a new pass builds a new
//! model and publishes it through [`SharedCostModel`] by swapping a pointer.

#[cfg(feature = "std")]
use alloc::sync::Arc;
#[cfg(feature = "std")]
use std::sync::{PoisonError, RwLock};

use super::level_costs::CostTable;
use super::proba::ProbabilityModel;

/// Probabilities and their derived costs for one encoding pass.
#[derive(Clone, Debug)]
pub struct CostModel {
    probas: ProbabilityModel,
    costs: CostTable,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(ProbabilityModel::default())
    }
}

impl CostModel {
    /// Build a snapshot, rebuilding the cost table from `probas`.
    pub fn new(probas: ProbabilityModel) -> Self {
        let costs = probas.rebuild_cost_table();
        tracing::debug!("rebuilt residual cost table");
        Self { probas, costs }
    }

    /// Probabilities this snapshot was built from.
    #[inline]
    pub fn probabilities(&self) -> &ProbabilityModel {
        &self.probas
    }

    /// Derived cost table.
    #[inline]
    pub fn costs(&self) -> &CostTable {
        &self.costs
    }
}

#[cfg(feature = "std")]
struct Published {
    generation: u64,
    model: Arc<CostModel>,
}

/// Publication point for the current [`CostModel`].
///
/// Evaluators call [`load`](Self::load) once per pass and keep the returned
/// `Arc`; [`publish`](Self::publish) is called at the pass boundary. A reader
/// holding an older snapshot keeps using it undisturbed.
#[cfg(feature = "std")]
pub struct SharedCostModel {
    current: RwLock<Published>,
}

#[cfg(feature = "std")]
impl Default for SharedCostModel {
    fn default() -> Self {
        Self::new(CostModel::default())
    }
}

#[cfg(feature = "std")]
impl SharedCostModel {
    /// Start with `model` as generation 0.
    pub fn new(model: CostModel) -> Self {
        Self {
            current: RwLock::new(Published {
                generation: 0,
                model: Arc::new(model),
            }),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<CostModel> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard.model)
    }

    /// Current snapshot together with its generation number.
    pub fn load_with_generation(&self) -> (u64, Arc<CostModel>) {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        (guard.generation, Arc::clone(&guard.model))
    }

    /// Number of snapshots published since construction.
    pub fn generation(&self) -> u64 {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Rebuild costs for `probas` and make the result current.
    ///
    /// The table is built before the lock is taken, so readers are only
    /// blocked for the pointer swap. Returns the new snapshot.
    pub fn publish(&self, probas: ProbabilityModel) -> Arc<CostModel> {
        let model = Arc::new(CostModel::new(probas));
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        guard.generation += 1;
        guard.model = Arc::clone(&model);
        tracing::debug!(generation = guard.generation, "published cost model");
        model
    }
}

#[cfg(feature = "std")]
impl core::fmt::Debug for SharedCostModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedCostModel")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::encoder::cost::CoeffType;

    #[test]
    fn default_snapshot_uses_default_probabilities() {
        let model = CostModel::default();
        assert_eq!(model.probabilities(), &ProbabilityModel::default());
        assert!(model
            .costs()
            .same_as(&ProbabilityModel::default().rebuild_cost_table()));
    }

    #[test]
    fn publish_swaps_without_touching_old_snapshot() {
        let shared = SharedCostModel::default();
        let old = shared.load();
        assert_eq!(shared.generation(), 0);

        let next = ProbabilityModel::default().with_probability(CoeffType::I4, 0, 0, 1, 3);
        let published = shared.publish(next.clone());
        assert_eq!(shared.generation(), 1);

        let (generation, current) = shared.load_with_generation();
        assert_eq!(generation, 1);
        assert!(Arc::ptr_eq(&current, &published));
        assert_eq!(current.probabilities(), &next);
        // the old reader still sees the old table
        assert_eq!(old.probabilities(), &ProbabilityModel::default());
        assert!(!old.costs().same_as(current.costs()));
    }
}
