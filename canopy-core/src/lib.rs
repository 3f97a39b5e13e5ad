#![warn(clippy::all)]

//! Core data structures for airborne LiDAR forestry analysis
//!
//! This crate holds the leaf types the rest of the canopy workspace is built on:
//! the columnar [PointSet](crate::points::PointSet), axis-aligned bounds, the
//! affine transform used by every raster, and the crate-wide error type. All
//! algorithmic code (gridding, ground filtering, segmentation) lives in
//! `canopy-algorithms`.

pub extern crate nalgebra;

mod error;
pub use self::error::*;

/// Mathematical tools shared across the workspace
pub mod math;

mod points;
pub use self::points::*;
