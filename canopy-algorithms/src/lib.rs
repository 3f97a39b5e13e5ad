#![warn(clippy::all)]
//! Algorithms that turn an airborne point cloud into forestry products.
//!
//! The stages compose into the usual pipeline: bin the cloud into a
//! [grid::Grid], extract bare earth with [ground_filter], normalize the
//! returns against it, rasterize a canopy height model and segment crowns
//! with [watershed].

// 2D convex hull of a point set's xy-projection.
pub mod convex_hull;
// Square-lattice partition of a point set plus per-cell metric reduction.
pub mod grid;
// Progressive morphological ground filter and height normalization.
pub mod ground_filter;
// Delaunay-based filling of nodata raster cells.
pub mod interpolation;
// Grayscale erosion, dilation and opening on rasters.
pub mod morphology;
// Dense georeferenced raster with NaN nodata.
pub mod raster;
// 3D binning of a point cloud into cubic voxels.
pub mod voxel_grid;
// Treetop detection and marker-controlled watershed crown segmentation.
pub mod watershed;
