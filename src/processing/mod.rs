//! Video processing module
//!
//! Pixel work done by the in-process compositor:
//! - Nearest-neighbour scaling into a grid cell
//! - RGBA to BGRA swizzle while blitting

mod scale;

pub use scale::{blit_scaled, fill, Canvas};
