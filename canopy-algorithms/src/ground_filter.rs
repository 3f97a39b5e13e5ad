//! Progressive morphological ground filter (Zhang et al. 2003) and height
//! normalization.
//!
//! The filter runs on the per-cell minimum-elevation raster: the lowest return
//! in a cell is assumed closest to the true ground. Each pass opens the
//! working surface with a growing square window and suppresses cells that
//! stick out above the opened surface by more than the pass threshold. Small
//! early windows remove isolated vegetation spikes without flattening terrain
//! relief; later wide windows remove larger structures while the threshold cap
//! keeps legitimately sloped ground.
//!
//! Window and threshold schedule: pass `k` uses half-width `2^k` cells and
//! threshold `dh_k = min(dh_0 + k * (dh_max - dh_0) / (num_windows - 1),
//! dh_max)` (`dh_0` when there is a single window). Thresholds are in the
//! linear unit of the input coordinates.

use canopy_core::{CanopyError, CanopyResult, PointSet};
use itertools::izip;

use crate::grid::Grid;
use crate::interpolation::InterpolationMethod;
use crate::morphology::opening;
use crate::raster::Raster;

/// Parameters of the progressive morphological filter.
#[derive(Debug, Clone, Copy)]
pub struct GroundFilterParams {
    /// Number of opening passes; the window half-width doubles each pass.
    pub num_windows: usize,
    /// Cap on the elevation-difference threshold.
    pub dh_max: f64,
    /// Threshold of the first (smallest) window.
    pub dh_0: f64,
}

impl Default for GroundFilterParams {
    fn default() -> Self {
        Self {
            num_windows: 7,
            dh_max: 2.5,
            dh_0: 1.0,
        }
    }
}

impl GroundFilterParams {
    fn validate(&self) -> CanopyResult<()> {
        if self.num_windows < 1 {
            return Err(CanopyError::invalid_parameter(
                "num_windows",
                "at least one window is required".to_string(),
            ));
        }
        if !(self.dh_max > 0.0) {
            return Err(CanopyError::invalid_parameter(
                "dh_max",
                format!("threshold cap must be positive, got {}", self.dh_max),
            ));
        }
        if !(self.dh_0 >= 0.0) {
            return Err(CanopyError::invalid_parameter(
                "dh_0",
                format!("base threshold must be non-negative, got {}", self.dh_0),
            ));
        }
        Ok(())
    }

    fn threshold(&self, pass: usize) -> f64 {
        if self.num_windows == 1 {
            self.dh_0
        } else {
            let slope = (self.dh_max - self.dh_0) / (self.num_windows - 1) as f64;
            (self.dh_0 + pass as f64 * slope).min(self.dh_max)
        }
    }
}

/// Bare-earth surface produced by [ground_filter]: the filtered elevation
/// raster plus the per-cell ground classification.
#[derive(Debug, Clone)]
pub struct GroundSurface {
    /// Filtered elevation; suppressed cells hold the local opened (ground)
    /// estimate, cells that never held a point stay nodata.
    pub elevation: Raster,
    is_ground: Vec<bool>,
}

impl GroundSurface {
    /// True if cell `(row, col)` held a value and was never suppressed.
    pub fn is_ground(&self, row: usize, col: usize) -> bool {
        self.is_ground[row * self.elevation.cols() + col]
    }

    /// Number of cells accepted as ground.
    pub fn ground_cell_count(&self) -> usize {
        self.is_ground.iter().filter(|&&g| g).count()
    }
}

/// Runs the progressive morphological filter over a minimum-elevation surface.
///
/// An entirely empty lattice is not an error; it produces an all-nodata
/// surface with zero ground cells.
pub fn ground_filter(surface: &Raster, params: &GroundFilterParams) -> CanopyResult<GroundSurface> {
    params.validate()?;
    let rows = surface.rows();
    let cols = surface.cols();
    let mut working = surface.clone();
    let mut is_ground: Vec<bool> = surface.values().iter().map(|v| !v.is_nan()).collect();

    for pass in 0..params.num_windows {
        let radius = 1usize << pass;
        let dh = params.threshold(pass);
        let opened = opening(&working, radius);
        for row in 0..rows {
            for col in 0..cols {
                let value = working.get(row, col);
                if value.is_nan() {
                    continue;
                }
                let opened_value = opened.get(row, col);
                if opened_value.is_nan() {
                    continue;
                }
                if value - opened_value > dh {
                    is_ground[row * cols + col] = false;
                    working.set(row, col, opened_value);
                }
            }
        }
    }

    Ok(GroundSurface {
        elevation: working,
        is_ground,
    })
}

impl<'a> Grid<'a> {
    /// Bare-earth extraction over this grid's minimum-elevation raster.
    pub fn ground_filter(&self, params: &GroundFilterParams) -> CanopyResult<GroundSurface> {
        ground_filter(&self.min_z_surface(), params)
    }

    /// The same bare-earth surface with nodata cells filled by
    /// `interp_method`, ready to drive point normalization.
    pub fn normalize(
        &self,
        params: &GroundFilterParams,
        interp_method: InterpolationMethod,
    ) -> CanopyResult<Raster> {
        self.ground_filter(params)?.elevation.interpolate(interp_method)
    }
}

/// Subtracts the ground elevation under every point and returns the normalized
/// point set (ground-relative heights, bounds recomputed).
///
/// Ground elevation is sampled bilinearly from the bare-earth raster, falling
/// back to the containing cell where bilinear support is missing. Reapplying
/// against a non-trivial ground surface subtracts further; callers must not
/// double-normalize.
pub fn normalize_points(points: &PointSet, ground: &Raster) -> CanopyResult<PointSet> {
    let mut normalized_z = Vec::with_capacity(points.len());
    for (index, (&x, &y, &z)) in izip!(points.x(), points.y(), points.z()).enumerate() {
        let elevation = ground
            .sample_bilinear(x, y)
            .or_else(|| ground.sample_nearest_cell(x, y))
            .ok_or_else(|| {
                CanopyError::InsufficientData(format!(
                    "no ground elevation under point {} at ({}, {})",
                    index, x, y
                ))
            })?;
        normalized_z.push(z - elevation);
    }
    points.with_z(normalized_z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use canopy_core::math::GeoTransform;

    fn flat_surface(rows: usize, cols: usize, elevation: f64) -> Raster {
        Raster::from_values(
            vec![elevation; rows * cols],
            rows,
            cols,
            GeoTransform::new(1.0, 0.0, rows as f64),
        )
        .unwrap()
    }

    #[test]
    fn parameters_are_validated() {
        let surface = flat_surface(3, 3, 0.0);
        let bad_windows = GroundFilterParams {
            num_windows: 0,
            ..Default::default()
        };
        assert!(ground_filter(&surface, &bad_windows).is_err());
        let bad_cap = GroundFilterParams {
            dh_max: 0.0,
            ..Default::default()
        };
        assert!(ground_filter(&surface, &bad_cap).is_err());
        let bad_base = GroundFilterParams {
            dh_0: -0.5,
            ..Default::default()
        };
        assert!(ground_filter(&surface, &bad_base).is_err());
    }

    #[test]
    fn single_spike_is_suppressed_toward_ground() {
        let mut surface = flat_surface(7, 7, 0.0);
        surface.set(3, 3, 5.0);
        let params = GroundFilterParams {
            num_windows: 1,
            dh_max: 2.5,
            dh_0: 1.0,
        };
        let ground = ground_filter(&surface, &params).unwrap();
        assert_eq!(ground.elevation.get(3, 3), 0.0);
        assert!(!ground.is_ground(3, 3));
        for row in 0..7 {
            for col in 0..7 {
                if (row, col) != (3, 3) {
                    assert_eq!(ground.elevation.get(row, col), 0.0);
                    assert!(ground.is_ground(row, col));
                }
            }
        }
    }

    #[test]
    fn raising_dh_max_never_loses_ground_cells() {
        // gentle ramp with scattered bumps of varying height
        let mut surface = flat_surface(12, 12, 0.0);
        for row in 0..12 {
            for col in 0..12 {
                surface.set(row, col, 0.2 * row as f64);
            }
        }
        for &(row, col, bump) in &[(2, 3, 1.5), (5, 7, 2.5), (8, 2, 4.0), (10, 10, 0.8)] {
            let base = surface.get(row, col);
            surface.set(row, col, base + bump);
        }
        let counts: Vec<usize> = [1.0, 2.0, 3.0, 5.0]
            .iter()
            .map(|&dh_max| {
                let params = GroundFilterParams {
                    num_windows: 3,
                    dh_max,
                    dh_0: 0.5,
                };
                ground_filter(&surface, &params)
                    .unwrap()
                    .ground_cell_count()
            })
            .collect();
        for pair in counts.windows(2) {
            assert!(pair[0] <= pair[1], "ground count dropped: {:?}", counts);
        }
    }

    #[test]
    fn empty_lattice_produces_all_nodata_surface() {
        let surface = Raster::filled_with_nodata(4, 4, GeoTransform::new(1.0, 0.0, 4.0));
        let ground = ground_filter(&surface, &GroundFilterParams::default()).unwrap();
        assert_eq!(ground.ground_cell_count(), 0);
        assert!(ground.elevation.values().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn normalization_against_constant_ground_shifts_by_constant() {
        let points = PointSet::from_xyz(
            vec![0.5, 1.5, 2.5],
            vec![0.5, 1.5, 2.5],
            vec![10.0, 12.0, 9.0],
        )
        .unwrap();
        let ground = flat_surface(3, 3, 4.0);
        let normalized = normalize_points(&points, &ground).unwrap();
        for (&before, &after) in points.z().iter().zip(normalized.z().iter()) {
            assert_approx_eq!(after, before - 4.0);
        }
        // source is untouched (pure function)
        assert_eq!(points.z(), &[10.0, 12.0, 9.0]);
    }

    #[test]
    fn grid_normalize_fills_the_empty_cells() {
        // a cloud with ground returns everywhere and one tall tree
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for row in 0..8 {
            for col in 0..8 {
                // skip a hole so interpolation has something to fill
                if (row, col) == (4, 4) {
                    continue;
                }
                x.push(col as f64 + 0.5);
                y.push(row as f64 + 0.5);
                z.push(1.0);
            }
        }
        x.push(2.5);
        y.push(2.5);
        z.push(15.0);
        let points = PointSet::from_xyz(x, y, z).unwrap();
        let grid = Grid::new(&points, 1.0).unwrap();
        let dem = grid
            .normalize(
                &GroundFilterParams {
                    num_windows: 2,
                    dh_max: 2.0,
                    dh_0: 0.5,
                },
                InterpolationMethod::Nearest,
            )
            .unwrap();
        assert_eq!(dem.populated_cell_count(), dem.rows() * dem.cols());
        // every DEM cell sits at the ground level, tree or not
        for value in dem.values() {
            assert_approx_eq!(*value, 1.0);
        }
        let normalized = normalize_points(&points, &dem).unwrap();
        let max_height = normalized.bounds().unwrap().max().z;
        assert_approx_eq!(max_height, 14.0);
    }
}
