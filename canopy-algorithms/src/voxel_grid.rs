//! 3D analogue of the 2D grid: bins points into a cubic voxel lattice for
//! volumetric metrics (count, density). Shares the binning conventions of
//! [Grid](crate::grid::Grid) (clamped floor indices, image-convention rows),
//! extended by a layer axis that grows upward from the minimum elevation.

use canopy_core::{Attribute, CanopyError, CanopyResult, PointSet};

use crate::grid::Reduction;

/// Dense 3D array of per-voxel values, NaN for empty voxels.
#[derive(Debug, Clone)]
pub struct VoxelModel {
    values: Vec<f64>,
    layers: usize,
    rows: usize,
    cols: usize,
}

impl VoxelModel {
    /// Shape as `(layers, rows, cols)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.layers, self.rows, self.cols)
    }

    pub fn get(&self, layer: usize, row: usize, col: usize) -> f64 {
        self.values[(layer * self.rows + row) * self.cols + col]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Partition of a point set's full 3D extent into cubic voxels of side
/// `cell_size`, with the same eager, immutable assignment as the 2D grid.
pub struct VoxelGrid<'a> {
    points: &'a PointSet,
    cell_size: f64,
    layers: usize,
    rows: usize,
    cols: usize,
    voxel_offsets: Vec<usize>,
    point_order: Vec<usize>,
}

impl<'a> VoxelGrid<'a> {
    pub fn new(points: &'a PointSet, cell_size: f64) -> CanopyResult<Self> {
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(CanopyError::invalid_parameter(
                "cell_size",
                format!("cell size must be a positive number, got {}", cell_size),
            ));
        }
        let bounds = points
            .bounds()
            .ok_or_else(|| CanopyError::InsufficientData("empty point set".into()))?;
        let extent = bounds.extent();
        let layers = ((extent.z / cell_size).ceil() as usize).max(1);
        let rows = ((extent.y / cell_size).ceil() as usize).max(1);
        let cols = ((extent.x / cell_size).ceil() as usize).max(1);

        let min = *bounds.min();
        let max_y = bounds.max().y;
        let voxel_of = |x: f64, y: f64, z: f64| {
            let layer = (((z - min.z) / cell_size).floor() as usize).min(layers - 1);
            let row = (((max_y - y) / cell_size).floor() as usize).min(rows - 1);
            let col = (((x - min.x) / cell_size).floor() as usize).min(cols - 1);
            (layer * rows + row) * cols + col
        };

        let mut voxel_offsets = vec![0usize; layers * rows * cols + 1];
        for i in 0..points.len() {
            let p = points.position(i);
            voxel_offsets[voxel_of(p.x, p.y, p.z) + 1] += 1;
        }
        for i in 1..voxel_offsets.len() {
            voxel_offsets[i] += voxel_offsets[i - 1];
        }
        let mut cursor = voxel_offsets.clone();
        let mut point_order = vec![0usize; points.len()];
        for i in 0..points.len() {
            let p = points.position(i);
            let voxel = voxel_of(p.x, p.y, p.z);
            point_order[cursor[voxel]] = i;
            cursor[voxel] += 1;
        }

        Ok(Self {
            points,
            cell_size,
            layers,
            rows,
            cols,
            voxel_offsets,
            point_order,
        })
    }

    pub fn layers(&self) -> usize {
        self.layers
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Indices of the points in voxel `(layer, row, col)`.
    pub fn voxel_point_indices(&self, layer: usize, row: usize, col: usize) -> &[usize] {
        let voxel = (layer * self.rows + row) * self.cols + col;
        &self.point_order[self.voxel_offsets[voxel]..self.voxel_offsets[voxel + 1]]
    }

    /// Reduces one attribute per voxel; empty voxels become nodata, the
    /// reduction never sees an empty value slice.
    pub fn voxel_raster(&self, reduction: Reduction, attribute: Attribute) -> VoxelModel {
        let voxel_count = self.layers * self.rows * self.cols;
        let mut values = vec![f64::NAN; voxel_count];
        let mut cell_values = Vec::new();
        for voxel in 0..voxel_count {
            let indices = &self.point_order[self.voxel_offsets[voxel]..self.voxel_offsets[voxel + 1]];
            if indices.is_empty() {
                continue;
            }
            cell_values.clear();
            cell_values.extend(
                indices
                    .iter()
                    .map(|&i| self.points.attribute_value(attribute, i)),
            );
            values[voxel] = reduction.apply(&cell_values);
        }
        VoxelModel {
            values,
            layers: self.layers,
            rows: self.rows,
            cols: self.cols,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn column_cloud() -> PointSet {
        // a vertical column of points over a 2x2 m footprint, 0..4 m tall
        PointSet::from_xyz(
            vec![0.5, 0.5, 0.5, 1.5, 2.0],
            vec![0.5, 0.5, 0.5, 1.5, 2.0],
            vec![0.5, 1.5, 3.5, 0.5, 4.0],
        )
        .unwrap()
    }

    #[test]
    fn shape_follows_all_three_extents() {
        let points = column_cloud();
        let grid = VoxelGrid::new(&points, 1.0).unwrap();
        assert_eq!((grid.layers(), grid.rows(), grid.cols()), (4, 2, 2));
    }

    #[test]
    fn rejects_bad_cell_size_and_empty_input() {
        let points = column_cloud();
        assert!(VoxelGrid::new(&points, 0.0).is_err());
        let empty = PointSet::from_xyz(vec![], vec![], vec![]).unwrap();
        assert!(VoxelGrid::new(&empty, 1.0).is_err());
    }

    #[test]
    fn every_point_lands_in_exactly_one_voxel() {
        let points = column_cloud();
        let grid = VoxelGrid::new(&points, 1.0).unwrap();
        let mut seen = HashSet::new();
        for layer in 0..grid.layers() {
            for row in 0..grid.rows() {
                for col in 0..grid.cols() {
                    for &index in grid.voxel_point_indices(layer, row, col) {
                        assert!(seen.insert(index));
                    }
                }
            }
        }
        assert_eq!(seen.len(), points.len());
    }

    #[test]
    fn count_raster_exposes_density() {
        let points = column_cloud();
        let grid = VoxelGrid::new(&points, 1.0).unwrap();
        let counts = grid.voxel_raster(Reduction::Count, Attribute::Z);
        // the column cell (row 1, col 0) holds one point per occupied layer
        assert_eq!(counts.get(0, 1, 0), 1.0);
        assert_eq!(counts.get(1, 1, 0), 1.0);
        assert_eq!(counts.get(3, 1, 0), 1.0);
        // empty voxels are nodata, not zero
        assert!(counts.get(2, 1, 0).is_nan());
    }
}
