//! Cost estimation for VP8 residual coefficients.
//!
//! Rate-distortion search compares candidate quantizations by their estimated
//! coding cost instead of running the entropy coder. Costs are fixed-point, in
//! 1/256 bit units, and only meaningful relative to other costs from the same
//! [`CostTable`].
//!
//! ## Module organization
//!
//! - [`proba`]: the probability snapshot ([`ProbabilityModel`]) and [`CoeffType`]
//! - [`level_costs`]: the derived [`CostTable`]
//! - [`model`]: immutable (probabilities, costs) snapshots and their publication

pub mod level_costs;
pub mod model;
pub mod proba;

pub use level_costs::{BranchCost, CostEntry, CostTable, LevelCostArray, TypeCosts};
#[cfg(feature = "std")]
pub use model::SharedCostModel;
pub use model::CostModel;
pub use proba::{CoeffType, ProbabilityModel};

use super::tables::VP8_ENTROPY_COST;

/// Cost of a branch taken with probability `p / 256`, `p` clamped to `[1, 255]`.
///
/// `round(-log2(p / 256) * 256)`: 2048 at `p = 1`, 256 at `p = 128`, 1 at `p = 255`.
#[inline]
pub fn entropy_cost(p: u8) -> u16 {
    VP8_ENTROPY_COST[p.max(1) as usize]
}

/// Calculate bit cost for coding a boolean value with given probability.
///
/// `prob` is the probability of a zero, scaled by 256. Returns cost in 1/256 bit units.
#[inline]
pub fn vp8_bit_cost(bit: bool, prob: u8) -> u16 {
    let p = prob.max(1) as usize;
    if bit {
        VP8_ENTROPY_COST[256 - p]
    } else {
        VP8_ENTROPY_COST[p]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_cost_monotonic() {
        for p in 2..=255u8 {
            assert!(
                entropy_cost(p) <= entropy_cost(p - 1),
                "entropy cost not monotonic at {}",
                p
            );
        }
    }

    #[test]
    fn test_entropy_cost_clamps_zero() {
        assert_eq!(entropy_cost(0), entropy_cost(1));
        assert_eq!(entropy_cost(1), 2048);
        assert_eq!(entropy_cost(255), 1);
    }

    #[test]
    fn test_bit_cost() {
        // Cost of 0 with prob 128 should equal cost of 1 with prob 128
        assert_eq!(vp8_bit_cost(false, 128), vp8_bit_cost(true, 128));
        assert_eq!(vp8_bit_cost(false, 128), 256);

        // Cost of 0 with high prob should be low
        assert!(vp8_bit_cost(false, 250) < vp8_bit_cost(false, 128));

        // Cost of 1 with high prob should be high
        assert!(vp8_bit_cost(true, 250) > vp8_bit_cost(true, 128));

        // The two branches are complementary
        assert_eq!(vp8_bit_cost(true, 200), entropy_cost(56));
    }
}
