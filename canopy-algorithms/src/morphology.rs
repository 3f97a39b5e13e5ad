//! NaN-aware grayscale morphology with a square structuring element.
//!
//! A square element of half-width `radius` is separable into a horizontal and
//! a vertical pass, so erosion and dilation run in two sweeps instead of one
//! `(2r+1)^2` window scan. Nodata cells do not contribute to their neighbors'
//! extrema; a window that sees only nodata yields nodata.

use crate::raster::Raster;

#[derive(Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

impl Extreme {
    #[inline]
    fn fold(self, current: Option<f64>, value: f64) -> Option<f64> {
        Some(match (self, current) {
            (_, None) => value,
            (Extreme::Min, Some(best)) => best.min(value),
            (Extreme::Max, Some(best)) => best.max(value),
        })
    }
}

/// One directional sweep: for every cell, the extreme over the `2 * radius + 1`
/// run centered on it, along rows (`horizontal`) or columns.
fn sweep(raster: &Raster, radius: usize, extreme: Extreme, horizontal: bool) -> Raster {
    let rows = raster.rows();
    let cols = raster.cols();
    let mut out = raster.clone();
    let radius = radius as isize;
    for row in 0..rows {
        for col in 0..cols {
            let mut acc = None;
            for offset in -radius..=radius {
                let (r, c) = if horizontal {
                    (row as isize, col as isize + offset)
                } else {
                    (row as isize + offset, col as isize)
                };
                if let Some(value) = raster.get_opt(r, c) {
                    acc = extreme.fold(acc, value);
                }
            }
            out.set(row, col, acc.unwrap_or(f64::NAN));
        }
    }
    out
}

fn apply(raster: &Raster, radius: usize, extreme: Extreme) -> Raster {
    if radius == 0 {
        return raster.clone();
    }
    let horizontal = sweep(raster, radius, extreme, true);
    sweep(&horizontal, radius, extreme, false)
}

/// Grayscale erosion: per-cell minimum over the square window.
pub fn erode(raster: &Raster, radius: usize) -> Raster {
    apply(raster, radius, Extreme::Min)
}

/// Grayscale dilation: per-cell maximum over the square window.
pub fn dilate(raster: &Raster, radius: usize) -> Raster {
    apply(raster, radius, Extreme::Max)
}

/// Morphological opening: erosion followed by dilation. Removes features
/// narrower than the window while keeping the broad surface.
pub fn opening(raster: &Raster, radius: usize) -> Raster {
    dilate(&erode(raster, radius), radius)
}
