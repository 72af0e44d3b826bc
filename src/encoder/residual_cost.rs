//! Residual coefficient cost estimation using probability-dependent tables.
//!
//! Contains the [`Residual`] scratch object, the per-block cost walk (scalar, and
//! SSE2-assisted with the `simd` feature) and the block-level cost functions
//! ([`get_cost_luma4`], [`get_cost_luma16`], [`get_cost_uv`]).

#![allow(clippy::needless_range_loop)]

#[cfg(all(target_arch = "x86_64", feature = "simd"))]
use archmage::{arcane, SimdToken, X64V3Token};
#[cfg(all(target_arch = "x86_64", feature = "simd"))]
use core::arch::x86_64::*;
#[cfg(all(target_arch = "x86_64", feature = "simd"))]
use safe_unaligned_simd::x86_64 as simd_mem;

use super::cost::{CoeffType, CostModel, TypeCosts};
#[cfg(all(target_arch = "x86_64", feature = "simd"))]
use super::tables::{MAX_LEVEL, MAX_VARIABLE_LEVEL, VP8_LEVEL_FIXED_COSTS};
use crate::common::types::{NUM_COEFFS, NUM_CTX};

/// How [`Residual::set_coeffs_with`] locates the last non-zero coefficient.
///
/// Every strategy yields the same `last` for the same input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStrategy {
    /// Reverse scan, one coefficient at a time.
    Scalar,
    /// Build a 16-bit non-zero mask, take its highest set bit.
    Bitmask,
    /// SSE2 pack/compare/movemask; falls back to scalar without CPU support.
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    Sse2,
}

impl ScanStrategy {
    /// Strategies compiled into this build.
    pub const ALL: &'static [ScanStrategy] = &[
        ScanStrategy::Scalar,
        ScanStrategy::Bitmask,
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        ScanStrategy::Sse2,
    ];
}

/// Residual coefficients of one block, prepared for costing.
///
/// Scratch state: re-initialized with [`init`](Self::init) /
/// [`set_coeffs`](Self::set_coeffs) for every candidate. It borrows the cost
/// sub-table of its coefficient type and never copies table data.
#[derive(Clone)]
pub struct Residual<'a> {
    first: usize,
    last: i32,
    coeffs: [i16; NUM_COEFFS],
    coeff_type: CoeffType,
    costs: &'a TypeCosts,
}

impl core::fmt::Debug for Residual<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Residual")
            .field("first", &self.first)
            .field("last", &self.last)
            .field("coeffs", &self.coeffs)
            .field("coeff_type", &self.coeff_type)
            .finish_non_exhaustive()
    }
}

impl<'a> Residual<'a> {
    /// Empty residual of `coeff_type`, first position taken from the type.
    pub fn new(coeff_type: CoeffType, model: &'a CostModel) -> Self {
        Self {
            first: coeff_type.first_coeff(),
            last: -1,
            coeffs: [0; NUM_COEFFS],
            coeff_type,
            costs: model.costs().type_costs(coeff_type),
        }
    }

    /// Rebind type, first position and tables. Clears the coefficients.
    pub fn init(&mut self, first: usize, coeff_type: CoeffType, model: &'a CostModel) {
        debug_assert!(first <= 1, "first must be 0 or 1, got {first}");
        self.first = first;
        self.coeff_type = coeff_type;
        self.costs = model.costs().type_costs(coeff_type);
        self.coeffs = [0; NUM_COEFFS];
        self.last = -1;
    }

    /// Load coefficients (scan order) and locate the last non-zero one.
    #[inline]
    pub fn set_coeffs(&mut self, coeffs: &[i16; NUM_COEFFS]) {
        debug_assert!(
            self.first == 0 || coeffs[0] == 0,
            "DC must be zero when it is coded separately"
        );
        self.coeffs = *coeffs;
        self.last = find_last_nonzero(coeffs);
    }

    /// [`set_coeffs`](Self::set_coeffs) with an explicit scan strategy.
    pub fn set_coeffs_with(&mut self, coeffs: &[i16; NUM_COEFFS], strategy: ScanStrategy) {
        debug_assert!(self.first == 0 || coeffs[0] == 0);
        self.coeffs = *coeffs;
        self.last = match strategy {
            ScanStrategy::Scalar => find_last_nonzero_scalar(coeffs),
            ScanStrategy::Bitmask => find_last_nonzero_bitmask(coeffs),
            #[cfg(all(target_arch = "x86_64", feature = "simd"))]
            ScanStrategy::Sse2 => match X64V3Token::summon() {
                Some(token) => find_last_nonzero_sse2(token, coeffs),
                None => find_last_nonzero_scalar(coeffs),
            },
        };
    }

    /// First scan position considered.
    #[inline]
    pub fn first(&self) -> usize {
        self.first
    }

    /// Index of the last non-zero coefficient, -1 if all are zero.
    #[inline]
    pub fn last(&self) -> i32 {
        self.last
    }

    /// Coefficients in scan order.
    #[inline]
    pub fn coeffs(&self) -> &[i16; NUM_COEFFS] {
        &self.coeffs
    }

    /// Coefficient type.
    #[inline]
    pub fn coeff_type(&self) -> CoeffType {
        self.coeff_type
    }

    /// Whether any coefficient is non-zero.
    #[inline]
    pub fn has_nonzero(&self) -> bool {
        self.last >= 0
    }

    /// Estimated cost of coding this residual, in 1/256 bit units.
    ///
    /// `ctx0` is the initial context class (0, 1 or 2), normally the sum of the
    /// neighbouring blocks' non-zero flags.
    #[inline]
    pub fn residual_cost(&self, ctx0: usize) -> u32 {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        {
            if let Some(token) = X64V3Token::summon() {
                return get_residual_cost_sse2(token, ctx0, self);
            }
        }
        get_residual_cost_scalar(ctx0, self)
    }
}

#[inline]
fn find_last_nonzero(coeffs: &[i16; NUM_COEFFS]) -> i32 {
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    {
        if let Some(token) = X64V3Token::summon() {
            return find_last_nonzero_sse2(token, coeffs);
        }
    }
    find_last_nonzero_scalar(coeffs)
}

#[inline]
fn find_last_nonzero_scalar(coeffs: &[i16; NUM_COEFFS]) -> i32 {
    coeffs
        .iter()
        .rposition(|&c| c != 0)
        .map(|i| i as i32)
        .unwrap_or(-1)
}

#[inline]
fn find_last_nonzero_bitmask(coeffs: &[i16; NUM_COEFFS]) -> i32 {
    let mask = coeffs
        .iter()
        .enumerate()
        .fold(0u32, |m, (i, &c)| m | (u32::from(c != 0) << i));
    if mask == 0 {
        -1
    } else {
        (31 - mask.leading_zeros()) as i32
    }
}

/// Find last non-zero coefficient using SIMD.
/// Ported from libwebp's SetResidualCoeffs_SSE2.
#[cfg(all(target_arch = "x86_64", feature = "simd"))]
#[arcane]
fn find_last_nonzero_sse2(_token: X64V3Token, coeffs: &[i16; NUM_COEFFS]) -> i32 {
    let zero = _mm_setzero_si128();
    let (lo, hi) = split_halves(coeffs);
    let c0 = simd_mem::_mm_loadu_si128(&lo);
    let c1 = simd_mem::_mm_loadu_si128(&hi);

    // Saturating pack keeps non-zero values non-zero
    let m0 = _mm_packs_epi16(c0, c1);
    let m1 = _mm_cmpeq_epi8(m0, zero);

    // Bit set for each non-zero coefficient
    let mask = 0x0000_ffff_u32 ^ (_mm_movemask_epi8(m1) as u32);
    if mask == 0 {
        -1
    } else {
        (31 - mask.leading_zeros()) as i32
    }
}

#[cfg(all(target_arch = "x86_64", feature = "simd"))]
#[inline]
fn split_halves(coeffs: &[i16; NUM_COEFFS]) -> ([i16; 8], [i16; 8]) {
    let mut lo = [0i16; 8];
    let mut hi = [0i16; 8];
    lo.copy_from_slice(&coeffs[..8]);
    hi.copy_from_slice(&coeffs[8..]);
    (lo, hi)
}

/// Scalar residual cost walk.
/// Ported from libwebp's GetResidualCost_C.
#[inline]
fn get_residual_cost_scalar(ctx0: usize, res: &Residual) -> u32 {
    debug_assert!(ctx0 < NUM_CTX);
    let costs = res.costs;
    let mut n = res.first;

    // If no non-zero coefficients, just return EOB cost
    if res.last < 0 {
        return costs.get_skip_eob_cost(n, ctx0) as u32;
    }
    let last = res.last as usize;
    debug_assert!(last >= n && last < NUM_COEFFS, "last {last} outside {n}..16");

    // "Coefficient follows" is folded into the level costs only for ctx > 0.
    let mut cost = if ctx0 == 0 {
        costs.get_init_cost(n, ctx0) as u32
    } else {
        0
    };
    let mut ctx = ctx0;

    while n < last {
        let v = res.coeffs[n].unsigned_abs() as usize;
        cost += costs.get_level_cost(n, ctx, v);
        ctx = v.min(2);
        n += 1;
    }

    // Last coefficient is always non-zero
    let v = res.coeffs[n].unsigned_abs() as usize;
    debug_assert!(v != 0, "last coefficient should be non-zero");
    cost += costs.get_level_cost(n, ctx, v);
    if n < NUM_COEFFS - 1 {
        let next_ctx = if v == 1 { 1 } else { 2 };
        cost += costs.get_eob_cost(n, next_ctx) as u32;
    }

    cost
}

/// Residual cost walk with contexts and clamped levels precomputed by SSE2.
#[cfg(all(target_arch = "x86_64", feature = "simd"))]
fn get_residual_cost_sse2(token: X64V3Token, ctx0: usize, res: &Residual) -> u32 {
    debug_assert!(ctx0 < NUM_CTX);
    let costs = res.costs;
    let mut n = res.first;

    if res.last < 0 {
        return costs.get_skip_eob_cost(n, ctx0) as u32;
    }
    let last = res.last as usize;
    debug_assert!(last >= n && last < NUM_COEFFS);

    let (ctxs, levels, abs_levels) = precompute_levels_sse2(token, &res.coeffs);

    let mut cost = if ctx0 == 0 {
        costs.get_init_cost(n, ctx0) as u32
    } else {
        0
    };
    let mut ctx = ctx0;

    while n < last {
        let fixed = VP8_LEVEL_FIXED_COSTS[(abs_levels[n] as usize).min(MAX_LEVEL)] as u32;
        let variable = costs.get_cost_table(n, ctx)[levels[n] as usize] as u32;
        cost += fixed + variable;
        ctx = ctxs[n] as usize;
        n += 1;
    }

    debug_assert!(abs_levels[n] != 0, "last coefficient should be non-zero");
    let fixed = VP8_LEVEL_FIXED_COSTS[(abs_levels[n] as usize).min(MAX_LEVEL)] as u32;
    let variable = costs.get_cost_table(n, ctx)[levels[n] as usize] as u32;
    cost += fixed + variable;
    if n < NUM_COEFFS - 1 {
        cost += costs.get_eob_cost(n, ctxs[n] as usize) as u32;
    }

    cost
}

/// Per-coefficient context class, level clamped to MAX_VARIABLE_LEVEL, and
/// absolute value.
#[cfg(all(target_arch = "x86_64", feature = "simd"))]
#[arcane]
fn precompute_levels_sse2(
    _token: X64V3Token,
    coeffs: &[i16; NUM_COEFFS],
) -> ([u8; NUM_COEFFS], [u8; NUM_COEFFS], [u16; NUM_COEFFS]) {
    let zero = _mm_setzero_si128();
    let k_cst2 = _mm_set1_epi8(2);
    let k_cst67 = _mm_set1_epi8(MAX_VARIABLE_LEVEL as i8);

    let (lo, hi) = split_halves(coeffs);
    let c0 = simd_mem::_mm_loadu_si128(&lo);
    let c1 = simd_mem::_mm_loadu_si128(&hi);

    // abs(v) = max(v, -v)
    let d0 = _mm_sub_epi16(zero, c0);
    let d1 = _mm_sub_epi16(zero, c1);
    let e0 = _mm_max_epi16(c0, d0);
    let e1 = _mm_max_epi16(c1, d1);

    // 16 x u8, saturated at 127
    let f = _mm_packs_epi16(e0, e1);
    let g = _mm_min_epu8(f, k_cst2);
    let h = _mm_min_epu8(f, k_cst67);

    let mut ctxs = [0u8; NUM_COEFFS];
    let mut levels = [0u8; NUM_COEFFS];
    let mut abs_lo = [0u16; 8];
    let mut abs_hi = [0u16; 8];
    simd_mem::_mm_storeu_si128(&mut ctxs, g);
    simd_mem::_mm_storeu_si128(&mut levels, h);
    simd_mem::_mm_storeu_si128(&mut abs_lo, e0);
    simd_mem::_mm_storeu_si128(&mut abs_hi, e1);

    let mut abs_levels = [0u16; NUM_COEFFS];
    abs_levels[..8].copy_from_slice(&abs_lo);
    abs_levels[8..].copy_from_slice(&abs_hi);
    (ctxs, levels, abs_levels)
}

/// Non-zero flags of the blocks bordering a macroblock.
///
/// Layout follows the encoder's iterator: luma 0..4, U 4..6, V 6..8, Y2 at 8.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NzContext {
    /// Bottom row of the macroblock above
    pub top: [bool; 9],
    /// Right column of the macroblock to the left
    pub left: [bool; 9],
}

/// Calculate the cost of encoding a 4x4 luma block (I4 mode).
/// Ported from libwebp's VP8GetCostLuma4.
///
/// # Returns
/// (cost, has_nonzero) - Cost in 1/256 bits and whether this block has non-zero coeffs
pub fn get_cost_luma4(
    levels: &[i16; NUM_COEFFS],
    top_nz: bool,
    left_nz: bool,
    model: &CostModel,
) -> (u32, bool) {
    // Initial context is sum of top and left non-zero flags (0, 1, or 2)
    let ctx = (top_nz as usize) + (left_nz as usize);

    let mut res = Residual::new(CoeffType::I4, model);
    res.set_coeffs(levels);

    (res.residual_cost(ctx), res.has_nonzero())
}

/// Calculate the cost of encoding all 16 luma blocks in I16 mode: the Y2 DC
/// block plus 16 AC blocks. Position 0 of each AC block is ignored.
/// Ported from libwebp's VP8GetCostLuma16.
pub fn get_cost_luma16(
    dc_levels: &[i16; NUM_COEFFS],
    ac_levels: &[[i16; NUM_COEFFS]; 16],
    nz: &NzContext,
    model: &CostModel,
) -> u32 {
    let mut res = Residual::new(CoeffType::I16DC, model);
    res.set_coeffs(dc_levels);
    let mut total_cost = res.residual_cost(nz.top[8] as usize + nz.left[8] as usize);

    res.init(1, CoeffType::I16AC, model);
    let mut top_nz = [nz.top[0], nz.top[1], nz.top[2], nz.top[3]];
    let mut left_nz = [nz.left[0], nz.left[1], nz.left[2], nz.left[3]];

    for y in 0..4 {
        for x in 0..4 {
            let mut block = ac_levels[y * 4 + x];
            block[0] = 0;
            res.set_coeffs(&block);
            let ctx = (top_nz[x] as usize) + (left_nz[y] as usize);
            total_cost += res.residual_cost(ctx);
            let has_nz = res.has_nonzero();
            top_nz[x] = has_nz;
            left_nz[y] = has_nz;
        }
    }

    total_cost
}

/// Cost of the 8 chroma blocks of a macroblock (U blocks 0..4 then V blocks
/// 4..8, raster order within each plane).
/// Port of libwebp's VP8GetCostUV.
pub fn get_cost_uv(uv_levels: &[[i16; NUM_COEFFS]; 8], nz: &NzContext, model: &CostModel) -> u32 {
    let mut res = Residual::new(CoeffType::Chroma, model);
    let mut top_nz = [false; 4];
    let mut left_nz = [false; 4];
    top_nz.copy_from_slice(&nz.top[4..8]);
    left_nz.copy_from_slice(&nz.left[4..8]);

    let mut total_cost = 0u32;
    for ch in [0, 2] {
        for y in 0..2 {
            for x in 0..2 {
                res.set_coeffs(&uv_levels[ch * 2 + y * 2 + x]);
                let ctx = (top_nz[ch + x] as usize) + (left_nz[ch + y] as usize);
                total_cost += res.residual_cost(ctx);
                let has_nz = res.has_nonzero();
                top_nz[ch + x] = has_nz;
                left_nz[ch + y] = has_nz;
            }
        }
    }

    total_cost
}
