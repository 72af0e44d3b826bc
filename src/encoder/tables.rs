//! Fixed VP8 encoder tables used by the residual cost model.
//!
//! Values that follow from the bitstream (band map, token tree layout, extra-bit
//! probabilities) are reproduced as-is. The entropy cost table is
//! `round(-log2(p / 256) * 256)` precomputed, so costs never depend on the
//! platform's floating point.

use crate::common::types::{DCT_CAT_BASE, NUM_COEFFS, PROB_DCT_CAT};

/// Largest magnitude with a dedicated token-tree cost entry (start of DCT_CAT6).
pub const MAX_VARIABLE_LEVEL: usize = 67;

/// Largest magnitude costed exactly; larger values are clamped.
pub const MAX_LEVEL: usize = 2047;

/// Scan position to band. The trailing entry is a sentinel so that
/// `VP8_ENC_BANDS[n + 1]` is valid for the end-of-block lookup at position 15.
pub const VP8_ENC_BANDS: [u8; NUM_COEFFS + 1] = [0, 1, 2, 3, 6, 4, 5, 6, 6, 6, 6, 6, 6, 6, 6, 7, 0];

/// Cost in 1/256 bit of a branch taken with probability `p / 256`.
/// Index 0 holds the cost of `p = 1`.
#[rustfmt::skip]
pub const VP8_ENTROPY_COST: [u16; 256] = [
    2048, 2048, 1792, 1642, 1536, 1454, 1386, 1329, 1280, 1236, 1198, 1162,
    1130, 1101, 1073, 1048, 1024, 1002, 980, 961, 942, 924, 906, 890,
    874, 859, 845, 831, 817, 804, 792, 780, 768, 757, 746, 735,
    724, 714, 705, 695, 686, 676, 668, 659, 650, 642, 634, 626,
    618, 611, 603, 596, 589, 582, 575, 568, 561, 555, 548, 542,
    536, 530, 524, 518, 512, 506, 501, 495, 490, 484, 479, 474,
    468, 463, 458, 453, 449, 444, 439, 434, 430, 425, 420, 416,
    412, 407, 403, 399, 394, 390, 386, 382, 378, 374, 370, 366,
    362, 358, 355, 351, 347, 343, 340, 336, 333, 329, 326, 322,
    319, 315, 312, 309, 305, 302, 299, 296, 292, 289, 286, 283,
    280, 277, 274, 271, 268, 265, 262, 259, 256, 253, 250, 247,
    245, 242, 239, 236, 234, 231, 228, 226, 223, 220, 218, 215,
    212, 210, 207, 205, 202, 200, 197, 195, 193, 190, 188, 185,
    183, 181, 178, 176, 174, 171, 169, 167, 164, 162, 160, 158,
    156, 153, 151, 149, 147, 145, 143, 140, 138, 136, 134, 132,
    130, 128, 126, 124, 122, 120, 118, 116, 114, 112, 110, 108,
    106, 104, 102, 101, 99, 97, 95, 93, 91, 89, 87, 86,
    84, 82, 80, 78, 77, 75, 73, 71, 70, 68, 66, 64,
    63, 61, 59, 58, 56, 54, 53, 51, 49, 48, 46, 44,
    43, 41, 40, 38, 36, 35, 33, 32, 30, 28, 27, 25,
    24, 22, 21, 19, 18, 16, 15, 13, 12, 10, 9, 7,
    6, 4, 3, 1,
];

/// Token-tree path of each magnitude 1..=MAX_VARIABLE_LEVEL, starting at node 2.
///
/// Column 0 is the set of visited nodes (bit `i` = node `i + 2`), column 1 the
/// branch taken at each of them.
#[rustfmt::skip]
pub const VP8_LEVEL_CODES: [[u16; 2]; MAX_VARIABLE_LEVEL] = [
    [0x001, 0x000], [0x007, 0x001], [0x00f, 0x005], [0x00f, 0x00d],
    [0x033, 0x003], [0x033, 0x003], [0x033, 0x023], [0x033, 0x023],
    [0x033, 0x023], [0x033, 0x023], [0x0d3, 0x013], [0x0d3, 0x013],
    [0x0d3, 0x013], [0x0d3, 0x013], [0x0d3, 0x013], [0x0d3, 0x013],
    [0x0d3, 0x013], [0x0d3, 0x013], [0x0d3, 0x093], [0x0d3, 0x093],
    [0x0d3, 0x093], [0x0d3, 0x093], [0x0d3, 0x093], [0x0d3, 0x093],
    [0x0d3, 0x093], [0x0d3, 0x093], [0x0d3, 0x093], [0x0d3, 0x093],
    [0x0d3, 0x093], [0x0d3, 0x093], [0x0d3, 0x093], [0x0d3, 0x093],
    [0x0d3, 0x093], [0x0d3, 0x093], [0x153, 0x053], [0x153, 0x053],
    [0x153, 0x053], [0x153, 0x053], [0x153, 0x053], [0x153, 0x053],
    [0x153, 0x053], [0x153, 0x053], [0x153, 0x053], [0x153, 0x053],
    [0x153, 0x053], [0x153, 0x053], [0x153, 0x053], [0x153, 0x053],
    [0x153, 0x053], [0x153, 0x053], [0x153, 0x053], [0x153, 0x053],
    [0x153, 0x053], [0x153, 0x053], [0x153, 0x053], [0x153, 0x053],
    [0x153, 0x053], [0x153, 0x053], [0x153, 0x053], [0x153, 0x053],
    [0x153, 0x053], [0x153, 0x053], [0x153, 0x053], [0x153, 0x053],
    [0x153, 0x053], [0x153, 0x053], [0x153, 0x153],
];

/// Probability-independent part of a level's cost: the sign bit plus the extra
/// bits of the DCT_CAT tokens, which use fixed probabilities.
pub const VP8_LEVEL_FIXED_COSTS: [u16; MAX_LEVEL + 1] = build_level_fixed_costs();

const fn bit_cost(bit: bool, prob: u8) -> u16 {
    let p = if prob == 0 { 1 } else { prob as usize };
    if bit {
        VP8_ENTROPY_COST[256 - p]
    } else {
        VP8_ENTROPY_COST[p]
    }
}

const fn build_level_fixed_costs() -> [u16; MAX_LEVEL + 1] {
    let mut out = [0u16; MAX_LEVEL + 1];
    let mut level = 1;
    while level <= MAX_LEVEL {
        // sign
        let mut cost = 256u16;
        if level >= DCT_CAT_BASE[0] as usize {
            let mut cat = DCT_CAT_BASE.len() - 1;
            while level < DCT_CAT_BASE[cat] as usize {
                cat -= 1;
            }
            let probas = PROB_DCT_CAT[cat];
            let extra = level - DCT_CAT_BASE[cat] as usize;
            let nbits = probas.len();
            let mut i = 0;
            while i < nbits {
                let bit = (extra >> (nbits - 1 - i)) & 1 != 0;
                cost += bit_cost(bit, probas[i]);
                i += 1;
            }
        }
        out[level] = cost;
        level += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entropy_cost_matches_formula() {
        for p in 1..256usize {
            let exact = -(p as f64 / 256.0).log2() * 256.0;
            assert_eq!(VP8_ENTROPY_COST[p], exact.round() as u16, "p = {p}");
        }
        assert_eq!(VP8_ENTROPY_COST[0], VP8_ENTROPY_COST[1]);
    }

    #[test]
    fn entropy_cost_extremes() {
        assert_eq!(VP8_ENTROPY_COST[128], 256);
        assert_eq!(VP8_ENTROPY_COST[255], 1);
        assert_eq!(VP8_ENTROPY_COST[1], 2048);
    }

    #[test]
    fn bands() {
        assert_eq!(VP8_ENC_BANDS[0], 0);
        assert_eq!(VP8_ENC_BANDS[1], 1);
        assert_eq!(VP8_ENC_BANDS[4], 6);
        assert_eq!(VP8_ENC_BANDS[5], 4);
        assert_eq!(VP8_ENC_BANDS[15], 7);
    }

    #[test]
    fn level_codes_known_entries() {
        // level 1: node 2 only, branch 0
        assert_eq!(VP8_LEVEL_CODES[0], [0x001, 0x000]);
        // level 4: nodes 2..=5, branches 1,0,1,1
        assert_eq!(VP8_LEVEL_CODES[3], [0x00f, 0x00d]);
        // DCT_CAT3 (11..=18): nodes 2,3,6,8,9
        assert_eq!(VP8_LEVEL_CODES[10], [0x0d3, 0x013]);
        // DCT_CAT6
        assert_eq!(VP8_LEVEL_CODES[MAX_VARIABLE_LEVEL - 1], [0x153, 0x153]);
    }

    #[test]
    fn level_fixed_costs() {
        assert_eq!(VP8_LEVEL_FIXED_COSTS[0], 0);
        // Tokens ONE..FOUR carry only the sign.
        for level in 1..=4 {
            assert_eq!(VP8_LEVEL_FIXED_COSTS[level], 256);
        }
        // DCT_CAT1: one extra bit at probability 159
        assert_eq!(VP8_LEVEL_FIXED_COSTS[5], 256 + VP8_ENTROPY_COST[159]);
        assert_eq!(VP8_LEVEL_FIXED_COSTS[6], 256 + VP8_ENTROPY_COST[256 - 159]);
        assert!(VP8_LEVEL_FIXED_COSTS[100] < VP8_LEVEL_FIXED_COSTS[MAX_LEVEL]);
    }
}
