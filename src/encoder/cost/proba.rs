//! Token probability snapshot for one encoding pass.
//!
//! A [`ProbabilityModel`] is never edited after construction. When statistics
//! change between passes the encoder builds a new one and rebuilds the costs.

use crate::common::types::{
    TokenProbTables, TokenProbs, TypeProbs, COEFF_PROBS, NUM_BANDS, NUM_CTX, NUM_TYPES,
};

use super::level_costs::CostTable;

/// Coefficient type of a residual block.
///
/// Discriminants match the bitstream's plane indices:
/// - `I16AC = 0` (Y1 blocks of an i16 macroblock, DC coded in Y2, `first = 1`)
/// - `I16DC = 1` (Y2 / WHT block)
/// - `Chroma = 2`
/// - `I4 = 3`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CoeffType {
    /// I16 AC coefficients (Y1 blocks with DC moved to Y2)
    I16AC = 0,
    /// I16 DC coefficients (Y2/WHT)
    I16DC = 1,
    /// Chroma (U and V) coefficients
    Chroma = 2,
    /// I4 luma coefficients
    I4 = 3,
}

impl CoeffType {
    /// All types in table order.
    pub const ALL: [CoeffType; NUM_TYPES] = [
        CoeffType::I16AC,
        CoeffType::I16DC,
        CoeffType::Chroma,
        CoeffType::I4,
    ];

    /// Table index of this type.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// First scan position coded for this type: 1 when DC travels in Y2.
    #[inline]
    pub const fn first_coeff(self) -> usize {
        match self {
            CoeffType::I16AC => 1,
            _ => 0,
        }
    }

    /// Type for a table index, or `None` when out of range.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(CoeffType::I16AC),
            1 => Some(CoeffType::I16DC),
            2 => Some(CoeffType::Chroma),
            3 => Some(CoeffType::I4),
            _ => None,
        }
    }
}

/// Canonical token probabilities, `[type][band][ctx][node]`, each byte
/// approximating P(branch = 0) * 256.
#[derive(Clone, PartialEq, Eq)]
pub struct ProbabilityModel {
    probs: TokenProbTables,
}

impl Default for ProbabilityModel {
    /// The bitstream's default probabilities.
    fn default() -> Self {
        Self {
            probs: COEFF_PROBS,
        }
    }
}

impl core::fmt::Debug for ProbabilityModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProbabilityModel")
            .field("is_default", &(self.probs == COEFF_PROBS))
            .finish_non_exhaustive()
    }
}

impl ProbabilityModel {
    /// Model holding the bitstream's default probabilities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a full probability table produced by a statistics pass.
    pub fn from_tables(probs: TokenProbTables) -> Self {
        Self { probs }
    }

    /// Probabilities for one (type, band, context) triple.
    ///
    /// Out-of-range `band` or `ctx` is a caller bug and panics.
    #[inline]
    pub fn probabilities(&self, ctype: CoeffType, band: usize, ctx: usize) -> &TokenProbs {
        debug_assert!(band < NUM_BANDS && ctx < NUM_CTX);
        &self.probs[ctype.index()][band][ctx]
    }

    /// All bands and contexts of one coefficient type.
    #[inline]
    pub fn type_probs(&self, ctype: CoeffType) -> &TypeProbs {
        &self.probs[ctype.index()]
    }

    /// The whole table.
    #[inline]
    pub fn tables(&self) -> &TokenProbTables {
        &self.probs
    }

    /// Derive the cost table for this snapshot.
    ///
    /// Pure: rebuilding from the same probabilities yields identical tables.
    pub fn rebuild_cost_table(&self) -> CostTable {
        CostTable::from_probabilities(self)
    }

    /// Copy of this model with a single probability replaced.
    ///
    /// Intended for building the next pass's snapshot; the receiver is untouched.
    pub fn with_probability(
        &self,
        ctype: CoeffType,
        band: usize,
        ctx: usize,
        node: usize,
        proba: u8,
    ) -> Self {
        let mut probs = self.probs;
        probs[ctype.index()][band][ctx][node] = proba;
        Self { probs }
    }
}
