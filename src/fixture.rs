//! Versioned flat serialization of a residual costing snapshot.
//!
//! A fixture pins down a probability table, one residual and the cost it must
//! produce, so cost regressions can be checked against files shared with other
//! implementations. All integers are little-endian.
//!
//! | offset | size | field |
//! |-------:|-----:|-------|
//! | 0      | 4    | magic `VP8R` |
//! | 4      | 2    | version (`u16`, currently 1) |
//! | 6      | 2    | reserved, zero |
//! | 8      | 1056 | probabilities `[type 4][band 8][ctx 3][node 11]`, `u8` |
//! | 1064   | 1    | coefficient type (0 = i16-AC, 1 = i16-DC, 2 = chroma, 3 = i4) |
//! | 1065   | 1    | first coded position (0 or 1) |
//! | 1066   | 1    | initial context `ctx0` (0..=2) |
//! | 1067   | 1    | reserved, zero |
//! | 1068   | 2    | last non-zero position (`i16`, -1 when all zero) |
//! | 1070   | 32   | 16 coefficients in scan order (`i16`) |
//! | 1102   | 4    | expected cost (`u32`, 1/256 bit) |

use alloc::vec;
use alloc::vec::Vec;
use byteorder_lite::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::common::types::{
    TokenProbTables, NUM_BANDS, NUM_COEFFS, NUM_CTX, NUM_PROBAS, NUM_TYPES,
};
use crate::encoder::cost::{CoeffType, CostModel, ProbabilityModel};
use crate::encoder::residual_cost::Residual;

/// File magic.
pub const FIXTURE_MAGIC: [u8; 4] = *b"VP8R";
/// Layout version written by [`ResidualFixture::to_bytes`].
pub const FIXTURE_VERSION: u16 = 1;

const PROBAS_OFFSET: usize = 8;
const PROBAS_LEN: usize = NUM_TYPES * NUM_BANDS * NUM_CTX * NUM_PROBAS;
const RESIDUAL_OFFSET: usize = PROBAS_OFFSET + PROBAS_LEN;
const COEFFS_OFFSET: usize = RESIDUAL_OFFSET + 6;
const COST_OFFSET: usize = COEFFS_OFFSET + 2 * NUM_COEFFS;

/// Size in bytes of a version 1 fixture.
pub const FIXTURE_LEN: usize = COST_OFFSET + 4;

/// Errors that can occur while decoding a fixture.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FixtureError {
    /// The data does not start with [`FIXTURE_MAGIC`].
    #[error("Invalid fixture magic")]
    BadMagic,

    /// The layout version is not understood.
    #[error("Unsupported fixture version: {0}")]
    UnsupportedVersion(u16),

    /// The data has the wrong size for its version.
    #[error("Fixture is {actual} bytes, expected {expected}")]
    InvalidLength {
        /// Size required by the layout.
        expected: usize,
        /// Size of the data supplied.
        actual: usize,
    },

    /// A field holds a value outside its range.
    #[error("Invalid {field}: {value}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The value found.
        value: i64,
    },

    /// The recorded last position disagrees with the coefficients.
    #[error("Recorded last position {recorded} but coefficients end at {actual}")]
    LastMismatch {
        /// Value stored in the fixture.
        recorded: i32,
        /// Value recomputed from the coefficients.
        actual: i32,
    },
}

/// A probability table, one residual and its expected cost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResidualFixture {
    /// Probabilities the cost table is rebuilt from.
    pub probas: ProbabilityModel,
    /// Coefficient type of the residual.
    pub coeff_type: CoeffType,
    /// First coded position.
    pub first: usize,
    /// Initial context class.
    pub ctx0: usize,
    /// Coefficients in scan order.
    pub coeffs: [i16; NUM_COEFFS],
    /// Last non-zero position, -1 when all zero.
    pub last: i32,
    /// Cost the residual must evaluate to.
    pub expected_cost: u32,
}

impl ResidualFixture {
    /// Record `res`, costed in context `ctx0` against `model`.
    ///
    /// `res` must have been initialized from `model`.
    pub fn capture(model: &CostModel, res: &Residual<'_>, ctx0: usize) -> Self {
        Self {
            probas: model.probabilities().clone(),
            coeff_type: res.coeff_type(),
            first: res.first(),
            ctx0,
            coeffs: *res.coeffs(),
            last: res.last(),
            expected_cost: res.residual_cost(ctx0),
        }
    }

    /// Rebuild the cost model and re-cost the residual.
    pub fn evaluate(&self) -> u32 {
        let model = CostModel::new(self.probas.clone());
        let mut res = Residual::new(self.coeff_type, &model);
        res.init(self.first, self.coeff_type, &model);
        res.set_coeffs(&self.coeffs);
        res.residual_cost(self.ctx0)
    }

    /// Serialize using the version 1 layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; FIXTURE_LEN];
        buf[..4].copy_from_slice(&FIXTURE_MAGIC);
        LittleEndian::write_u16(&mut buf[4..6], FIXTURE_VERSION);

        let probas = self.probas.tables().iter().flatten().flatten().flatten();
        for (dst, &p) in buf[PROBAS_OFFSET..RESIDUAL_OFFSET].iter_mut().zip(probas) {
            *dst = p;
        }

        buf[RESIDUAL_OFFSET] = self.coeff_type as u8;
        buf[RESIDUAL_OFFSET + 1] = self.first as u8;
        buf[RESIDUAL_OFFSET + 2] = self.ctx0 as u8;
        LittleEndian::write_i16(
            &mut buf[RESIDUAL_OFFSET + 4..COEFFS_OFFSET],
            self.last as i16,
        );
        for (dst, &c) in buf[COEFFS_OFFSET..COST_OFFSET]
            .chunks_exact_mut(2)
            .zip(self.coeffs.iter())
        {
            LittleEndian::write_i16(dst, c);
        }
        LittleEndian::write_u32(&mut buf[COST_OFFSET..], self.expected_cost);
        buf
    }

    /// Parse and validate a fixture.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FixtureError> {
        if data.len() < 8 {
            return Err(FixtureError::InvalidLength {
                expected: FIXTURE_LEN,
                actual: data.len(),
            });
        }
        if data[..4] != FIXTURE_MAGIC {
            return Err(FixtureError::BadMagic);
        }
        let version = LittleEndian::read_u16(&data[4..6]);
        if version != FIXTURE_VERSION {
            return Err(FixtureError::UnsupportedVersion(version));
        }
        if data.len() != FIXTURE_LEN {
            return Err(FixtureError::InvalidLength {
                expected: FIXTURE_LEN,
                actual: data.len(),
            });
        }
        check_reserved("header reserved", LittleEndian::read_u16(&data[6..8]).into())?;

        let mut tables: TokenProbTables = [[[[0; NUM_PROBAS]; NUM_CTX]; NUM_BANDS]; NUM_TYPES];
        let dst = tables.iter_mut().flatten().flatten().flatten();
        for (p, &src) in dst.zip(&data[PROBAS_OFFSET..RESIDUAL_OFFSET]) {
            *p = src;
        }

        let residual = &data[RESIDUAL_OFFSET..COEFFS_OFFSET];
        let coeff_type = CoeffType::from_index(residual[0] as usize).ok_or(
            FixtureError::InvalidField {
                field: "coefficient type",
                value: residual[0].into(),
            },
        )?;
        let first = residual[1] as usize;
        if first > 1 {
            return Err(FixtureError::InvalidField {
                field: "first",
                value: residual[1].into(),
            });
        }
        let ctx0 = residual[2] as usize;
        if ctx0 >= NUM_CTX {
            return Err(FixtureError::InvalidField {
                field: "ctx0",
                value: residual[2].into(),
            });
        }
        check_reserved("residual reserved", residual[3].into())?;
        let recorded = i32::from(LittleEndian::read_i16(&residual[4..6]));

        let mut coeffs = [0i16; NUM_COEFFS];
        for (c, src) in coeffs
            .iter_mut()
            .zip(data[COEFFS_OFFSET..COST_OFFSET].chunks_exact(2))
        {
            *c = LittleEndian::read_i16(src);
        }
        if first == 1 && coeffs[0] != 0 {
            return Err(FixtureError::InvalidField {
                field: "dc coefficient",
                value: coeffs[0].into(),
            });
        }
        let actual = coeffs
            .iter()
            .rposition(|&c| c != 0)
            .map(|i| i as i32)
            .unwrap_or(-1);
        if recorded != actual {
            return Err(FixtureError::LastMismatch { recorded, actual });
        }

        Ok(Self {
            probas: ProbabilityModel::from_tables(tables),
            coeff_type,
            first,
            ctx0,
            coeffs,
            last: actual,
            expected_cost: LittleEndian::read_u32(&data[COST_OFFSET..]),
        })
    }
}

fn check_reserved(field: &'static str, value: i64) -> Result<(), FixtureError> {
    if value != 0 {
        return Err(FixtureError::InvalidField { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COEFFS: [i16; 16] = [0, 4, -1, 0, 0, 19, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

    fn sample() -> ResidualFixture {
        let model = CostModel::new(ProbabilityModel::default().with_probability(
            CoeffType::I16AC,
            2,
            1,
            3,
            9,
        ));
        let mut res = Residual::new(CoeffType::I16AC, &model);
        res.set_coeffs(&COEFFS);
        ResidualFixture::capture(&model, &res, 1)
    }

    #[test]
    fn layout_size() {
        assert_eq!(FIXTURE_LEN, 1106);
        assert_eq!(sample().to_bytes().len(), FIXTURE_LEN);
    }

    #[test]
    fn decode_restores_capture() {
        let fixture = sample();
        let bytes = fixture.to_bytes();
        assert_eq!(&bytes[..4], b"VP8R");
        assert_eq!(bytes[RESIDUAL_OFFSET], 0);
        assert_eq!(bytes[RESIDUAL_OFFSET + 1], 1);
        let decoded = ResidualFixture::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, fixture);
        assert_eq!(decoded.last, 5);
        assert_eq!(decoded.evaluate(), fixture.expected_cost);
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'X';
        assert_eq!(
            ResidualFixture::from_bytes(&bytes),
            Err(FixtureError::BadMagic)
        );

        let mut bytes = sample().to_bytes();
        bytes[4] = 2;
        assert_eq!(
            ResidualFixture::from_bytes(&bytes),
            Err(FixtureError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn rejects_truncation() {
        let bytes = sample().to_bytes();
        assert_eq!(
            ResidualFixture::from_bytes(&bytes[..FIXTURE_LEN - 1]),
            Err(FixtureError::InvalidLength {
                expected: FIXTURE_LEN,
                actual: FIXTURE_LEN - 1
            })
        );
        assert!(matches!(
            ResidualFixture::from_bytes(&bytes[..3]),
            Err(FixtureError::InvalidLength { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut bytes = sample().to_bytes();
        bytes[RESIDUAL_OFFSET] = 4;
        assert!(matches!(
            ResidualFixture::from_bytes(&bytes),
            Err(FixtureError::InvalidField {
                field: "coefficient type",
                ..
            })
        ));

        let mut bytes = sample().to_bytes();
        bytes[RESIDUAL_OFFSET + 2] = 3;
        assert!(matches!(
            ResidualFixture::from_bytes(&bytes),
            Err(FixtureError::InvalidField { field: "ctx0", .. })
        ));

        let mut bytes = sample().to_bytes();
        bytes[COEFFS_OFFSET] = 1;
        assert!(matches!(
            ResidualFixture::from_bytes(&bytes),
            Err(FixtureError::InvalidField {
                field: "dc coefficient",
                ..
            })
        ));
    }

    #[test]
    fn rejects_inconsistent_last() {
        let mut bytes = sample().to_bytes();
        LittleEndian::write_i16(&mut bytes[RESIDUAL_OFFSET + 4..COEFFS_OFFSET], 9);
        assert_eq!(
            ResidualFixture::from_bytes(&bytes),
            Err(FixtureError::LastMismatch {
                recorded: 9,
                actual: 5
            })
        );
    }
}
