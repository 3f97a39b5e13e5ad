/// Affine transform mapping raster array indices to world coordinates.
///
/// Rasters are anchored at their top-left corner (minimum x, maximum y) with
/// square cells, so the transform is fully described by the cell size and the
/// origin: `x = x_origin + col * cell_size`, `y = y_origin - row * cell_size`.
/// [GeoTransform::coefficients] exposes the conventional 6-coefficient form
/// `(cell_size, 0, x_origin, 0, -cell_size, y_origin)` for export collaborators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    cell_size: f64,
    x_origin: f64,
    y_origin: f64,
}

impl GeoTransform {
    pub fn new(cell_size: f64, x_origin: f64, y_origin: f64) -> Self {
        Self {
            cell_size,
            x_origin,
            y_origin,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn x_origin(&self) -> f64 {
        self.x_origin
    }

    pub fn y_origin(&self) -> f64 {
        self.y_origin
    }

    /// The 6 affine coefficients in GDAL order.
    pub fn coefficients(&self) -> [f64; 6] {
        [
            self.cell_size,
            0.0,
            self.x_origin,
            0.0,
            -self.cell_size,
            self.y_origin,
        ]
    }

    /// World coordinates of the top-left corner of cell `(row, col)`.
    pub fn cell_corner(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.x_origin + col as f64 * self.cell_size,
            self.y_origin - row as f64 * self.cell_size,
        )
    }

    /// World coordinates of the center of cell `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.x_origin + (col as f64 + 0.5) * self.cell_size,
            self.y_origin - (row as f64 + 0.5) * self.cell_size,
        )
    }

    /// Signed cell indices of the world position `(x, y)`. May lie outside the
    /// raster; callers clamp or bounds-check as appropriate.
    pub fn world_to_cell(&self, x: f64, y: f64) -> (isize, isize) {
        let col = ((x - self.x_origin) / self.cell_size).floor() as isize;
        let row = ((self.y_origin - y) / self.cell_size).floor() as isize;
        (row, col)
    }
}
