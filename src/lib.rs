//! VP8 residual coefficient cost model for WebP rate-distortion search.
//!
//! The lossy WebP encoder compares candidate quantizations and predictions by
//! their estimated coding cost instead of running the entropy coder. This crate
//! provides that estimate: a probability snapshot ([`ProbabilityModel`]), the
//! bit costs derived from it ([`CostTable`]), and the per-block walk over the
//! quantized coefficients ([`Residual::residual_cost`]).
//!
//! # Features
//!
//! - `std` (default): Enable [`SharedCostModel`] for publishing snapshots to
//!   concurrent evaluators.
//! - `simd`: Enable SSE2 scanning and level precomputation on x86_64.
//!
//! # Example
//!
//! ```rust
//! use zenwebp_rdcost::{CoeffType, CostModel, Residual};
//!
//! let model = CostModel::default();
//! let mut res = Residual::new(CoeffType::I4, &model);
//! res.set_coeffs(&[110, 0, -2, 0, 0, 0, 0, 0, 0, -1, 0, 0, 0, 0, 0, 0]);
//! assert_eq!(res.last(), 9);
//! let bits = res.residual_cost(0) as f32 / 256.0;
//! assert!(bits > 0.0);
//! ```
//!
//! Costs are in 1/256 bit units and only meaningful relative to other costs
//! computed from the same [`CostTable`].
//!
//! # Safety
//!
//! This crate uses `#![forbid(unsafe_code)]`. With the `simd` feature the SSE2
//! paths rely on the [`archmage`] crate's token-based `#[arcane]` functions.
//!
//! [`archmage`]: https://docs.rs/archmage

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

pub mod common;
pub mod encoder;
pub mod fixture;

pub use common::types::{TokenProbTables, NUM_BANDS, NUM_COEFFS, NUM_CTX, NUM_PROBAS, NUM_TYPES};
#[cfg(feature = "std")]
pub use encoder::cost::SharedCostModel;
pub use encoder::cost::{
    entropy_cost, vp8_bit_cost, BranchCost, CoeffType, CostEntry, CostModel, CostTable,
    ProbabilityModel,
};
pub use encoder::residual_cost::{
    get_cost_luma16, get_cost_luma4, get_cost_uv, NzContext, Residual, ScanStrategy,
};
pub use fixture::{FixtureError, ResidualFixture};
