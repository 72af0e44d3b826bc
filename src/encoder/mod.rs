//! VP8 encoder-side cost estimation

pub mod cost;
/// Residual cost estimation (SIMD-optimized with the `simd` feature)
pub mod residual_cost;
pub mod tables;
