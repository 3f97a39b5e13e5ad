//! Scattered-data interpolation over the populated cells of a raster.
//!
//! The populated cell centers are triangulated once (Delaunay, stable bulk
//! load) and nodata cells are filled by querying the triangulation. "nearest"
//! fills every nodata cell from the nearest sample; "linear" (barycentric) and
//! "cubic" (Sibson natural neighbor) are only defined inside the convex hull
//! of the samples and leave outside cells as nodata.

use std::str::FromStr;

use canopy_core::{CanopyError, CanopyResult};
use spade::{DelaunayTriangulation, FloatTriangulation, HasPosition, Point2, Triangulation};

use crate::raster::Raster;

/// Closed set of interpolation methods, resolved once at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMethod {
    Nearest,
    Linear,
    Cubic,
}

impl FromStr for InterpolationMethod {
    type Err = CanopyError;

    fn from_str(s: &str) -> CanopyResult<Self> {
        match s {
            "nearest" => Ok(InterpolationMethod::Nearest),
            "linear" => Ok(InterpolationMethod::Linear),
            "cubic" => Ok(InterpolationMethod::Cubic),
            other => Err(CanopyError::UnsupportedMethod(format!(
                "unknown interpolation method '{}'",
                other
            ))),
        }
    }
}

struct CellSample {
    position: Point2<f64>,
    value: f64,
}

impl HasPosition for CellSample {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

impl Raster {
    /// Fills nodata cells by interpolating over the populated cell centers.
    ///
    /// Fails with `InsufficientData` when fewer than 3 non-collinear sample
    /// cells exist, since no triangulation can be built from them.
    pub fn interpolate(&self, method: InterpolationMethod) -> CanopyResult<Raster> {
        let mut samples = Vec::with_capacity(self.populated_cell_count());
        for row in 0..self.rows() {
            for col in 0..self.cols() {
                let value = self.get(row, col);
                if value.is_nan() {
                    continue;
                }
                let (x, y) = self.transform().cell_center(row, col);
                samples.push(CellSample {
                    position: Point2::new(x, y),
                    value,
                });
            }
        }
        if samples.len() < 3 {
            return Err(CanopyError::InsufficientData(format!(
                "interpolation needs at least 3 sampled cells, found {}",
                samples.len()
            )));
        }

        let triangulation = DelaunayTriangulation::<CellSample>::bulk_load_stable(samples)
            .map_err(|e| {
                CanopyError::InsufficientData(format!("cell centers not triangulable: {}", e))
            })?;
        if triangulation.num_inner_faces() == 0 {
            return Err(CanopyError::InsufficientData(
                "sampled cells are collinear, cannot triangulate".into(),
            ));
        }

        let mut out = self.clone();
        let nodata_cells = (0..self.rows())
            .flat_map(|row| (0..self.cols()).map(move |col| (row, col)))
            .filter(|&(row, col)| self.is_nodata(row, col));
        match method {
            InterpolationMethod::Nearest => {
                for (row, col) in nodata_cells {
                    let (x, y) = self.transform().cell_center(row, col);
                    if let Some(vertex) = triangulation.nearest_neighbor(Point2::new(x, y)) {
                        out.set(row, col, vertex.data().value);
                    }
                }
            }
            InterpolationMethod::Linear => {
                let barycentric = triangulation.barycentric();
                for (row, col) in nodata_cells {
                    let (x, y) = self.transform().cell_center(row, col);
                    if let Some(value) =
                        barycentric.interpolate(|v| v.data().value, Point2::new(x, y))
                    {
                        out.set(row, col, value);
                    }
                }
            }
            InterpolationMethod::Cubic => {
                let natural_neighbor = triangulation.natural_neighbor();
                for (row, col) in nodata_cells {
                    let (x, y) = self.transform().cell_center(row, col);
                    if let Some(value) =
                        natural_neighbor.interpolate(|v| v.data().value, Point2::new(x, y))
                    {
                        out.set(row, col, value);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Name-resolving convenience form of [Raster::interpolate].
    pub fn interpolate_by_name(&self, method: &str) -> CanopyResult<Raster> {
        self.interpolate(method.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use canopy_core::math::GeoTransform;

    // 5x5 raster sampling the plane z = x + 2y at cell centers, with holes
    fn plane_with_holes() -> Raster {
        let transform = GeoTransform::new(1.0, 0.0, 5.0);
        let mut raster = Raster::filled_with_nodata(5, 5, transform);
        for row in 0..5 {
            for col in 0..5 {
                // leave an interior hole block
                if (1..=2).contains(&row) && (1..=3).contains(&col) {
                    continue;
                }
                let (x, y) = transform.cell_center(row, col);
                raster.set(row, col, x + 2.0 * y);
            }
        }
        raster
    }

    #[test]
    fn unknown_method_is_rejected_at_the_boundary() {
        assert!(matches!(
            "spline".parse::<InterpolationMethod>(),
            Err(CanopyError::UnsupportedMethod(_))
        ));
        assert_eq!(
            "cubic".parse::<InterpolationMethod>().unwrap(),
            InterpolationMethod::Cubic
        );
    }

    #[test]
    fn linear_recovers_a_plane_inside_the_hull() {
        let raster = plane_with_holes();
        let transform = *raster.transform();
        let filled = raster.interpolate(InterpolationMethod::Linear).unwrap();
        for row in 1..=2 {
            for col in 1..=3 {
                let (x, y) = transform.cell_center(row, col);
                assert_approx_eq!(filled.get(row, col), x + 2.0 * y, 1e-9);
            }
        }
        // populated cells are untouched
        assert_eq!(filled.get(0, 0), raster.get(0, 0));
    }

    #[test]
    fn cubic_recovers_a_plane_inside_the_hull() {
        let raster = plane_with_holes();
        let transform = *raster.transform();
        let filled = raster.interpolate(InterpolationMethod::Cubic).unwrap();
        for row in 1..=2 {
            for col in 1..=3 {
                let (x, y) = transform.cell_center(row, col);
                assert_approx_eq!(filled.get(row, col), x + 2.0 * y, 1e-6);
            }
        }
    }

    #[test]
    fn nearest_fills_everything() {
        let raster = plane_with_holes();
        let filled = raster.interpolate(InterpolationMethod::Nearest).unwrap();
        assert_eq!(filled.populated_cell_count(), 25);
    }

    #[test]
    fn too_few_samples_is_insufficient_data() {
        let mut raster = Raster::filled_with_nodata(3, 3, GeoTransform::new(1.0, 0.0, 3.0));
        raster.set(0, 0, 1.0);
        raster.set(2, 2, 2.0);
        assert!(matches!(
            raster.interpolate(InterpolationMethod::Nearest),
            Err(CanopyError::InsufficientData(_))
        ));
    }

    #[test]
    fn collinear_samples_are_insufficient_data() {
        let mut raster = Raster::filled_with_nodata(3, 3, GeoTransform::new(1.0, 0.0, 3.0));
        for col in 0..3 {
            raster.set(1, col, col as f64);
        }
        assert!(matches!(
            raster.interpolate(InterpolationMethod::Linear),
            Err(CanopyError::InsufficientData(_))
        ));
    }
}
