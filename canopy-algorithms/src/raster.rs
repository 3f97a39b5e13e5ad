use std::cmp::Ordering;

use canopy_core::math::GeoTransform;
use canopy_core::{CanopyError, CanopyResult};

/// A dense 2D grid of per-cell values (row-major). Origin is the top-left
/// corner of the covered extent (minimum x, maximum y), so row indices grow as
/// y decreases, matching the image convention.
///
/// Cells without a value hold NaN ("nodata"). Nodata is propagated distinctly
/// through every downstream filter; it never silently becomes zero.
#[derive(Debug, Clone)]
pub struct Raster {
    values: Vec<f64>,
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    crs: Option<String>,
}

impl Raster {
    /// Creates an all-nodata raster of the given shape.
    pub fn filled_with_nodata(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self {
            values: vec![f64::NAN; rows * cols],
            rows,
            cols,
            transform,
            crs: None,
        }
    }

    /// Creates a raster from an existing row-major value buffer.
    pub fn from_values(
        values: Vec<f64>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
    ) -> CanopyResult<Self> {
        if values.len() != rows * cols {
            return Err(CanopyError::invalid_parameter(
                "values",
                format!(
                    "buffer length {} does not match shape {}x{}",
                    values.len(),
                    rows,
                    cols
                ),
            ));
        }
        Ok(Self {
            values,
            rows,
            cols,
            transform,
            crs: None,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// The raw row-major value buffer, for the raster-export collaborator.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row * self.cols + col] = value;
    }

    /// Value at signed indices; `None` out of bounds or at nodata cells.
    #[inline]
    pub fn get_opt(&self, row: isize, col: isize) -> Option<f64> {
        if row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols {
            let value = self.values[row as usize * self.cols + col as usize];
            if value.is_nan() {
                None
            } else {
                Some(value)
            }
        } else {
            None
        }
    }

    #[inline]
    pub fn is_nodata(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_nan()
    }

    /// Number of cells holding a value.
    pub fn populated_cell_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// Value of the cell containing the world position `(x, y)`, `None`
    /// outside the raster or at nodata.
    pub fn sample_nearest_cell(&self, x: f64, y: f64) -> Option<f64> {
        let (row, col) = self.transform.world_to_cell(x, y);
        self.get_opt(row, col)
    }

    /// Bilinear sample at the world position `(x, y)` over the four
    /// surrounding cell centers. Nodata neighbors are dropped and the weights
    /// renormalized; `None` when no neighbor holds a value.
    pub fn sample_bilinear(&self, x: f64, y: f64) -> Option<f64> {
        let cell = self.transform.cell_size();
        // continuous cell-center coordinates
        let fc = (x - self.transform.x_origin()) / cell - 0.5;
        let fr = (self.transform.y_origin() - y) / cell - 0.5;
        let r0 = fr.floor();
        let c0 = fc.floor();
        let tr = fr - r0;
        let tc = fc - c0;

        let mut sum = 0.0;
        let mut weight_sum = 0.0;
        for (dr, dc, weight) in [
            (0.0, 0.0, (1.0 - tr) * (1.0 - tc)),
            (0.0, 1.0, (1.0 - tr) * tc),
            (1.0, 0.0, tr * (1.0 - tc)),
            (1.0, 1.0, tr * tc),
        ] {
            if weight == 0.0 {
                continue;
            }
            if let Some(value) = self.get_opt((r0 + dr) as isize, (c0 + dc) as isize) {
                sum += value * weight;
                weight_sum += weight;
            }
        }
        if weight_sum > 0.0 {
            Some(sum / weight_sum)
        } else {
            None
        }
    }

    /// Suppresses spurious single-cell depressions ("pits") in a canopy
    /// surface by passing a NaN-aware median filter of the given odd kernel
    /// size over the raster. Nodata cells stay nodata.
    pub fn pit_filter(&self, kernel_size: usize) -> CanopyResult<Raster> {
        if kernel_size < 3 || kernel_size % 2 == 0 {
            return Err(CanopyError::invalid_parameter(
                "kernel_size",
                format!("median kernel must be odd and >= 3, got {}", kernel_size),
            ));
        }
        let half = (kernel_size / 2) as isize;
        let mut out = self.clone();
        let mut buf = Vec::with_capacity(kernel_size * kernel_size);
        for row in 0..self.rows {
            for col in 0..self.cols {
                if self.is_nodata(row, col) {
                    continue;
                }
                buf.clear();
                for dr in -half..=half {
                    for dc in -half..=half {
                        if let Some(value) = self.get_opt(row as isize + dr, col as isize + dc) {
                            buf.push(value);
                        }
                    }
                }
                buf.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                out.set(row, col, buf[buf.len() / 2]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn unit_transform() -> GeoTransform {
        GeoTransform::new(1.0, 0.0, 10.0)
    }

    fn flat_raster(rows: usize, cols: usize, value: f64) -> Raster {
        Raster::from_values(vec![value; rows * cols], rows, cols, unit_transform()).unwrap()
    }

    #[test]
    fn from_values_rejects_shape_mismatch() {
        assert!(Raster::from_values(vec![0.0; 5], 2, 3, unit_transform()).is_err());
    }

    #[test]
    fn pit_filter_validates_kernel_size() {
        let raster = flat_raster(5, 5, 1.0);
        assert!(raster.pit_filter(2).is_err());
        assert!(raster.pit_filter(1).is_err());
        assert!(raster.pit_filter(4).is_err());
        assert!(raster.pit_filter(3).is_ok());
    }

    #[test]
    fn pit_filter_removes_single_cell_pit() {
        let mut raster = flat_raster(5, 5, 10.0);
        raster.set(2, 2, 1.0);
        let filtered = raster.pit_filter(3).unwrap();
        assert_eq!(filtered.get(2, 2), 10.0);
        assert_eq!(filtered.get(0, 0), 10.0);
    }

    #[test]
    fn pit_filter_keeps_nodata_nodata() {
        let mut raster = flat_raster(3, 3, 5.0);
        raster.set(1, 1, f64::NAN);
        let filtered = raster.pit_filter(3).unwrap();
        assert!(filtered.is_nodata(1, 1));
        assert_eq!(filtered.get(0, 0), 5.0);
    }

    #[test]
    fn bilinear_interpolates_between_cell_centers() {
        let raster = Raster::from_values(
            vec![0.0, 1.0, 2.0, 3.0],
            2,
            2,
            GeoTransform::new(1.0, 0.0, 2.0),
        )
        .unwrap();
        // dead center between the four cell centers
        assert_approx_eq!(raster.sample_bilinear(1.0, 1.0).unwrap(), 1.5);
        // exactly on the top-left cell center
        assert_approx_eq!(raster.sample_bilinear(0.5, 1.5).unwrap(), 0.0);
    }

    #[test]
    fn bilinear_renormalizes_around_nodata() {
        let mut raster = flat_raster(2, 2, 4.0);
        raster.set(1, 1, f64::NAN);
        assert_approx_eq!(raster.sample_bilinear(1.0, 9.0).unwrap(), 4.0);
    }

    #[test]
    fn nearest_cell_sampling_respects_bounds() {
        let raster = flat_raster(2, 2, 7.0);
        assert_eq!(raster.sample_nearest_cell(0.5, 9.5), Some(7.0));
        assert_eq!(raster.sample_nearest_cell(-1.0, 9.5), None);
    }
}
