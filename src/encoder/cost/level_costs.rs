//! Cost tables derived from a [`ProbabilityModel`].
//!
//! For every (type, band, context) the table mirrors the probability entry as
//! per-node branch costs, and lumps the token-tree path of each magnitude
//! 0..=MAX_VARIABLE_LEVEL into a single lookup for the residual walk. The extra
//! bits of large magnitudes don't depend on the probabilities and come from
//! `VP8_LEVEL_FIXED_COSTS`.

#![allow(clippy::needless_range_loop)]

use super::proba::{CoeffType, ProbabilityModel};
use super::vp8_bit_cost;
use crate::common::types::{TokenProbs, NUM_BANDS, NUM_CTX, NUM_PROBAS, NUM_TYPES};

use super::super::tables::{
    MAX_LEVEL, MAX_VARIABLE_LEVEL, VP8_ENC_BANDS, VP8_LEVEL_CODES, VP8_LEVEL_FIXED_COSTS,
};

/// Cost of both branches of one token-tree node, in 1/256 bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BranchCost {
    /// Cost of taking branch 0
    pub zero: u16,
    /// Cost of taking branch 1
    pub one: u16,
}

impl BranchCost {
    #[inline]
    fn from_proba(p: u8) -> Self {
        Self {
            zero: vp8_bit_cost(false, p),
            one: vp8_bit_cost(true, p),
        }
    }

    /// Cost of `bit`.
    #[inline]
    pub fn get(self, bit: bool) -> u16 {
        if bit {
            self.one
        } else {
            self.zero
        }
    }
}

/// Mirrors one probability entry: a branch cost per decision node.
pub type CostEntry = [BranchCost; NUM_PROBAS];

/// Cost for each level 0..=MAX_VARIABLE_LEVEL
pub type LevelCostArray = [u16; MAX_VARIABLE_LEVEL + 1];

/// Token-tree cost of magnitude `level >= 1` from node 2 down to its leaf.
fn variable_level_cost(level: usize, entry: &CostEntry) -> u16 {
    if level == 0 {
        return 0;
    }
    let idx = level.min(MAX_VARIABLE_LEVEL) - 1;
    let mut pattern = VP8_LEVEL_CODES[idx][0];
    let mut bits = VP8_LEVEL_CODES[idx][1];

    let mut cost = 0u16;
    let mut i = 2;
    while pattern != 0 {
        if (pattern & 1) != 0 {
            cost += entry[i].get((bits & 1) != 0);
        }
        bits >>= 1;
        pattern >>= 1;
        i += 1;
    }
    cost
}

/// Costs for all bands and contexts of one coefficient type.
#[derive(Clone)]
pub struct TypeCosts {
    entries: [[CostEntry; NUM_CTX]; NUM_BANDS],
    /// Lumped level costs indexed \[band\]\[ctx\]\[level\]
    level_cost: [[LevelCostArray; NUM_CTX]; NUM_BANDS],
    /// Cost of signaling "no more coefficients" (node 0, branch 0)
    eob_cost: [[u16; NUM_CTX]; NUM_BANDS],
    /// Cost of signaling "a coefficient follows" (node 0, branch 1)
    init_cost: [[u16; NUM_CTX]; NUM_BANDS],
}

impl TypeCosts {
    fn new() -> Self {
        Self {
            entries: [[[BranchCost::default(); NUM_PROBAS]; NUM_CTX]; NUM_BANDS],
            level_cost: [[[0; MAX_VARIABLE_LEVEL + 1]; NUM_CTX]; NUM_BANDS],
            eob_cost: [[0; NUM_CTX]; NUM_BANDS],
            init_cost: [[0; NUM_CTX]; NUM_BANDS],
        }
    }

    fn fill(&mut self, band: usize, ctx: usize, p: &TokenProbs) {
        let entry = &mut self.entries[band][ctx];
        for (cost, &proba) in entry.iter_mut().zip(p.iter()) {
            *cost = BranchCost::from_proba(proba);
        }
        let entry = &self.entries[band][ctx];

        // After a zero the bitstream codes no end-of-block decision, and a zero
        // is exactly what ctx == 0 means past the first position. The first
        // position with ctx0 == 0 is charged separately by the estimator.
        let cost0 = if ctx > 0 { entry[0].one } else { 0 };
        let cost_base = entry[1].one + cost0;

        let levels = &mut self.level_cost[band][ctx];
        levels[0] = entry[1].zero + cost0;
        for v in 1..=MAX_VARIABLE_LEVEL {
            levels[v] = cost_base + variable_level_cost(v, entry);
        }

        self.eob_cost[band][ctx] = entry[0].zero;
        self.init_cost[band][ctx] = entry[0].one;
    }

    /// Mirrored branch costs for (band, ctx).
    #[inline]
    pub fn entry(&self, band: usize, ctx: usize) -> &CostEntry {
        &self.entries[band][ctx]
    }

    /// Full cost of coding magnitude `level` at scan `position` in context `ctx`,
    /// sign and extra bits included.
    #[inline]
    pub fn get_level_cost(&self, position: usize, ctx: usize, level: usize) -> u32 {
        let fixed = VP8_LEVEL_FIXED_COSTS[level.min(MAX_LEVEL)] as u32;
        let band = VP8_ENC_BANDS[position] as usize;
        let variable = self.level_cost[band][ctx][level.min(MAX_VARIABLE_LEVEL)] as u32;
        fixed + variable
    }

    /// Lumped level costs for a scan position and context.
    #[inline]
    pub fn get_cost_table(&self, position: usize, ctx: usize) -> &LevelCostArray {
        let band = VP8_ENC_BANDS[position] as usize;
        &self.level_cost[band][ctx]
    }

    /// End-of-block cost after the coefficient at `position`, whose magnitude
    /// class is `ctx`. Signaled in the band of `position + 1`.
    #[inline]
    pub fn get_eob_cost(&self, position: usize, ctx: usize) -> u16 {
        let band = VP8_ENC_BANDS[position + 1] as usize;
        self.eob_cost[band][ctx]
    }

    /// End-of-block cost at `first`: the whole block is zero.
    #[inline]
    pub fn get_skip_eob_cost(&self, first: usize, ctx: usize) -> u16 {
        let band = VP8_ENC_BANDS[first] as usize;
        self.eob_cost[band][ctx]
    }

    /// "Block has coefficients" cost at `first`.
    #[inline]
    pub fn get_init_cost(&self, first: usize, ctx: usize) -> u16 {
        let band = VP8_ENC_BANDS[first] as usize;
        self.init_cost[band][ctx]
    }
}

/// Bit-cost approximation for every probability entry of a [`ProbabilityModel`].
///
/// Always a pure function of the probabilities it was built from; there is no
/// way to edit it afterwards.
#[derive(Clone)]
pub struct CostTable {
    types: [TypeCosts; NUM_TYPES],
}

impl CostTable {
    /// Derive costs from probabilities.
    pub fn from_probabilities(model: &ProbabilityModel) -> Self {
        let mut types = [
            TypeCosts::new(),
            TypeCosts::new(),
            TypeCosts::new(),
            TypeCosts::new(),
        ];
        for ctype in CoeffType::ALL {
            let costs = &mut types[ctype.index()];
            for band in 0..NUM_BANDS {
                for ctx in 0..NUM_CTX {
                    costs.fill(band, ctx, model.probabilities(ctype, band, ctx));
                }
            }
        }
        Self { types }
    }

    /// Costs for one coefficient type.
    #[inline]
    pub fn type_costs(&self, ctype: CoeffType) -> &TypeCosts {
        &self.types[ctype.index()]
    }

    /// Mirrored branch costs for a (type, band, ctx) triple.
    #[inline]
    pub fn entry(&self, ctype: CoeffType, band: usize, ctx: usize) -> &CostEntry {
        self.types[ctype.index()].entry(band, ctx)
    }

    /// Bitwise comparison of two tables, including the lumped level costs.
    pub fn same_as(&self, other: &CostTable) -> bool {
        self.types.iter().zip(other.types.iter()).all(|(a, b)| {
            a.entries == b.entries
                && a.level_cost == b.level_cost
                && a.eob_cost == b.eob_cost
                && a.init_cost == b.init_cost
        })
    }
}

impl core::fmt::Debug for CostTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CostTable").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::tables::VP8_ENTROPY_COST;

    #[test]
    fn entries_mirror_probabilities() {
        let model = ProbabilityModel::new();
        let table = model.rebuild_cost_table();
        for ctype in CoeffType::ALL {
            for band in 0..NUM_BANDS {
                for ctx in 0..NUM_CTX {
                    let p = model.probabilities(ctype, band, ctx);
                    let e = table.entry(ctype, band, ctx);
                    assert_eq!(p.len(), e.len());
                    for (&proba, cost) in p.iter().zip(e.iter()) {
                        assert_eq!(cost.zero, vp8_bit_cost(false, proba));
                        assert_eq!(cost.one, vp8_bit_cost(true, proba));
                    }
                }
            }
        }
    }

    #[test]
    fn rebuild_is_idempotent() {
        let model = ProbabilityModel::new().with_probability(CoeffType::Chroma, 3, 2, 4, 17);
        let a = model.rebuild_cost_table();
        let b = model.rebuild_cost_table();
        assert!(a.same_as(&b));
        assert!(!a.same_as(&ProbabilityModel::new().rebuild_cost_table()));
    }

    #[test]
    fn level_zero_and_one_costs() {
        let table = ProbabilityModel::new().rebuild_cost_table();
        let costs = table.type_costs(CoeffType::I4);
        let e = *costs.entry(1, 1);
        let lc = costs.get_cost_table(1, 1);
        // ctx > 0 includes the "not end-of-block" branch
        assert_eq!(lc[0], e[1].zero + e[0].one);
        assert_eq!(lc[1], e[1].one + e[0].one + e[2].zero);
        assert_eq!(lc[2], e[1].one + e[0].one + e[2].one + e[3].zero + e[4].zero);

        let e0 = *costs.entry(1, 0);
        assert_eq!(costs.get_cost_table(1, 0)[1], e0[1].one + e0[2].zero);
    }

    #[test]
    fn large_levels_share_the_cat6_entry() {
        let table = ProbabilityModel::new().rebuild_cost_table();
        let costs = table.type_costs(CoeffType::I16DC);
        let at_67 = costs.get_level_cost(0, 0, 67) - VP8_LEVEL_FIXED_COSTS[67] as u32;
        let at_500 = costs.get_level_cost(0, 0, 500) - VP8_LEVEL_FIXED_COSTS[500] as u32;
        assert_eq!(at_67, at_500);
        // clamped past MAX_LEVEL
        assert_eq!(
            costs.get_level_cost(0, 0, MAX_LEVEL),
            costs.get_level_cost(0, 0, 30_000)
        );
    }

    #[test]
    fn eob_uses_next_band() {
        let model = ProbabilityModel::new();
        let table = model.rebuild_cost_table();
        let costs = table.type_costs(CoeffType::I4);
        // position 3 -> EOB coded in band of position 4, which is 6
        let p = model.probabilities(CoeffType::I4, 6, 2)[0];
        assert_eq!(costs.get_eob_cost(3, 2), VP8_ENTROPY_COST[p as usize]);
        // position 14 -> band 7
        let p = model.probabilities(CoeffType::I4, 7, 1)[0];
        assert_eq!(costs.get_eob_cost(14, 1), VP8_ENTROPY_COST[p as usize]);
    }
}
