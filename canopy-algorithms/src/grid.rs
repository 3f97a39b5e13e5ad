use std::str::FromStr;

use canopy_core::math::GeoTransform;
use canopy_core::{Attribute, CanopyError, CanopyResult, PointSet};
use rayon::prelude::*;

use crate::interpolation::InterpolationMethod;
use crate::raster::Raster;

/// Per-cell reduction over the values of one point attribute. The set is
/// closed; string names are resolved once at the boundary via [FromStr], and a
/// caller-supplied function can be passed through [Reduction::Custom].
///
/// A reduction is never invoked on an empty cell; empty cells become nodata.
#[derive(Debug, Clone, Copy)]
pub enum Reduction {
    Min,
    Max,
    Mean,
    Median,
    Sum,
    Count,
    StdDev,
    Custom(fn(&[f64]) -> f64),
}

impl Reduction {
    pub fn name(&self) -> &'static str {
        match self {
            Reduction::Min => "min",
            Reduction::Max => "max",
            Reduction::Mean => "mean",
            Reduction::Median => "median",
            Reduction::Sum => "sum",
            Reduction::Count => "count",
            Reduction::StdDev => "std",
            Reduction::Custom(_) => "custom",
        }
    }

    /// Reduces the (non-empty) per-cell value slice to a single value.
    pub fn apply(&self, values: &[f64]) -> f64 {
        debug_assert!(!values.is_empty());
        match self {
            Reduction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reduction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reduction::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reduction::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by_key(|&v| float_ord::FloatOrd(v));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            Reduction::Sum => values.iter().sum(),
            Reduction::Count => values.len() as f64,
            Reduction::StdDev => {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
                    / values.len() as f64;
                variance.sqrt()
            }
            Reduction::Custom(f) => f(values),
        }
    }
}

impl FromStr for Reduction {
    type Err = CanopyError;

    fn from_str(s: &str) -> CanopyResult<Self> {
        match s {
            "min" => Ok(Reduction::Min),
            "max" => Ok(Reduction::Max),
            "mean" => Ok(Reduction::Mean),
            "median" => Ok(Reduction::Median),
            "sum" => Ok(Reduction::Sum),
            "count" => Ok(Reduction::Count),
            "std" => Ok(Reduction::StdDev),
            other => Err(CanopyError::UnsupportedMethod(format!(
                "unknown reduction '{}'",
                other
            ))),
        }
    }
}

/// One attribute and the reductions to compute over it, the unit of a
/// [Grid::metrics] request.
#[derive(Debug, Clone)]
pub struct MetricSpec {
    pub attribute: Attribute,
    pub reductions: Vec<Reduction>,
}

/// Tabular metric output: one record per non-empty cell, one value column per
/// (attribute, reduction) pair.
#[derive(Debug, Clone)]
pub struct MetricTable {
    labels: Vec<String>,
    records: Vec<CellRecord>,
}

#[derive(Debug, Clone)]
pub struct CellRecord {
    pub row: usize,
    pub col: usize,
    pub values: Vec<f64>,
}

impl MetricTable {
    /// Column labels, `<attribute>_<reduction>`, in request order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Records in row-major cell order.
    pub fn records(&self) -> &[CellRecord] {
        &self.records
    }
}

/// Partition of a point set's (x, y) extent into a regular lattice of square
/// cells of side `cell_size`.
///
/// The lattice has `m = ceil(extent_y / cell_size)` rows and
/// `n = ceil(extent_x / cell_size)` columns (at least 1 each), anchored at the
/// top-left (minimum x, maximum y). Every point is assigned to exactly one
/// cell at construction; points exactly on the upper or right boundary are
/// absorbed into the last row/column. The assignment is immutable, so one
/// `Grid` serves any number of metric computations.
pub struct Grid<'a> {
    points: &'a PointSet,
    cell_size: f64,
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    // CSR grouping: point_order[cell_offsets[c]..cell_offsets[c + 1]] are the
    // indices of the points in cell c (row-major cell ids)
    cell_offsets: Vec<usize>,
    point_order: Vec<usize>,
}

impl<'a> Grid<'a> {
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
        let rows = ((extent.y / cell_size).ceil() as usize).max(1);
        let cols = ((extent.x / cell_size).ceil() as usize).max(1);
        let transform = GeoTransform::new(cell_size, bounds.min().x, bounds.max().y);

        let min_x = bounds.min().x;
        let max_y = bounds.max().y;
        let cell_of = |x: f64, y: f64| {
            let row = (((max_y - y) / cell_size).floor() as usize).min(rows - 1);
            let col = (((x - min_x) / cell_size).floor() as usize).min(cols - 1);
            row * cols + col
        };

        // counting sort into CSR form, one pass to count and one to scatter
        let mut cell_offsets = vec![0usize; rows * cols + 1];
        for (&x, &y) in points.x().iter().zip(points.y().iter()) {
            cell_offsets[cell_of(x, y) + 1] += 1;
        }
        for i in 1..cell_offsets.len() {
            cell_offsets[i] += cell_offsets[i - 1];
        }
        let mut cursor = cell_offsets.clone();
        let mut point_order = vec![0usize; points.len()];
        for (index, (&x, &y)) in points.x().iter().zip(points.y().iter()).enumerate() {
            let cell = cell_of(x, y);
            point_order[cursor[cell]] = index;
            cursor[cell] += 1;
        }

        Ok(Self {
            points,
            cell_size,
            rows,
            cols,
            transform,
            cell_offsets,
            point_order,
        })
    }

    /// Number of lattice rows (`m`).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of lattice columns (`n`).
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn points(&self) -> &PointSet {
        self.points
    }

    /// Indices of the points that fell into cell `(row, col)`.
    pub fn cell_point_indices(&self, row: usize, col: usize) -> &[usize] {
        let cell = row * self.cols + col;
        &self.point_order[self.cell_offsets[cell]..self.cell_offsets[cell + 1]]
    }

    /// Coordinates of the cells containing zero points, in row-major order.
    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        (0..self.rows * self.cols)
            .filter(|&cell| self.cell_offsets[cell] == self.cell_offsets[cell + 1])
            .map(|cell| (cell / self.cols, cell % self.cols))
            .collect()
    }

    /// Reduces one attribute per cell into a dense raster. Empty cells become
    /// nodata; the reduction never sees an empty value slice.
    pub fn raster(&self, reduction: Reduction, attribute: Attribute) -> Raster {
        let mut out = Raster::filled_with_nodata(self.rows, self.cols, self.transform);
        let mut values = Vec::new();
        for cell in 0..self.rows * self.cols {
            let indices = &self.point_order[self.cell_offsets[cell]..self.cell_offsets[cell + 1]];
            if indices.is_empty() {
                continue;
            }
            values.clear();
            values.extend(
                indices
                    .iter()
                    .map(|&i| self.points.attribute_value(attribute, i)),
            );
            out.set(cell / self.cols, cell % self.cols, reduction.apply(&values));
        }
        match self.points.crs() {
            Some(crs) => out.with_crs(crs),
            None => out,
        }
    }

    /// Single-metric convenience form resolving both names at the boundary,
    /// e.g. `grid.raster_by_name("max", "z")`.
    pub fn raster_by_name(&self, reduction: &str, attribute: &str) -> CanopyResult<Raster> {
        let reduction = reduction.parse::<Reduction>()?;
        let attribute = attribute.parse::<Attribute>()?;
        Ok(self.raster(reduction, attribute))
    }

    /// Computes every requested (attribute, reduction) pair into one table
    /// with a record per non-empty cell.
    pub fn metrics(&self, specs: &[MetricSpec]) -> MetricTable {
        let pairs = flatten_specs(specs);
        let labels = pairs
            .iter()
            .map(|(attribute, reduction)| format!("{}_{}", attribute.name(), reduction.name()))
            .collect();
        let mut records = Vec::new();
        let mut values = Vec::new();
        for cell in 0..self.rows * self.cols {
            let indices = &self.point_order[self.cell_offsets[cell]..self.cell_offsets[cell + 1]];
            if indices.is_empty() {
                continue;
            }
            let record_values = pairs
                .iter()
                .map(|(attribute, reduction)| {
                    values.clear();
                    values.extend(
                        indices
                            .iter()
                            .map(|&i| self.points.attribute_value(*attribute, i)),
                    );
                    reduction.apply(&values)
                })
                .collect();
            records.push(CellRecord {
                row: cell / self.cols,
                col: cell % self.cols,
                values: record_values,
            });
        }
        MetricTable { labels, records }
    }

    /// Computes every requested (attribute, reduction) pair as its own raster.
    /// The rasters are independent and the grid is immutable, so the pairs are
    /// computed in parallel.
    pub fn metrics_as_rasters(&self, specs: &[MetricSpec]) -> Vec<Raster> {
        flatten_specs(specs)
            .par_iter()
            .map(|(attribute, reduction)| self.raster(*reduction, *attribute))
            .collect()
    }

    /// The per-cell minimum-elevation surface the ground filter starts from.
    pub fn min_z_surface(&self) -> Raster {
        self.raster(Reduction::Min, Attribute::Z)
    }
}

fn flatten_specs(specs: &[MetricSpec]) -> Vec<(Attribute, Reduction)> {
    specs
        .iter()
        .flat_map(|spec| {
            spec.reductions
                .iter()
                .map(move |&reduction| (spec.attribute, reduction))
        })
        .collect()
}

/// Canopy height model in one call: bin, take the per-cell maximum elevation,
/// then optionally fill nodata and suppress pits with a median filter.
pub fn chm(
    points: &PointSet,
    cell_size: f64,
    interp_method: Option<InterpolationMethod>,
    pit_kernel_size: Option<usize>,
) -> CanopyResult<Raster> {
    let grid = Grid::new(points, cell_size)?;
    let mut raster = grid.raster(Reduction::Max, Attribute::Z);
    if let Some(method) = interp_method {
        raster = raster.interpolate(method)?;
    }
    if let Some(kernel_size) = pit_kernel_size {
        raster = raster.pit_filter(kernel_size)?;
    }
    Ok(raster)
}
