//! Planimetric convex hull of a point set, used as the footprint polygon of a
//! plot or an extracted tree.

use canopy_core::nalgebra::Point2;
use canopy_core::{CanopyError, CanopyResult, PointSet};
use float_ord::FloatOrd;

/// Convex hull of the xy-projection of `points`, by Andrew's monotone chain.
///
/// Returns the hull vertices counter-clockwise as a closed ring (first vertex
/// repeated at the end), or `InsufficientData` when fewer than 3 distinct
/// non-collinear points exist.
pub fn convex_hull(points: &PointSet) -> CanopyResult<Vec<Point2<f64>>> {
    if points.len() < 3 {
        return Err(CanopyError::InsufficientData(format!(
            "convex hull needs at least 3 points, found {}",
            points.len()
        )));
    }

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by_key(|&i| (FloatOrd(points.x()[i]), FloatOrd(points.y()[i])));
    order.dedup_by(|&mut a, &mut b| {
        points.x()[a] == points.x()[b] && points.y()[a] == points.y()[b]
    });

    let cross = |o: usize, a: usize, b: usize| {
        (points.x()[a] - points.x()[o]) * (points.y()[b] - points.y()[o])
            - (points.y()[a] - points.y()[o]) * (points.x()[b] - points.x()[o])
    };

    let mut lower: Vec<usize> = Vec::new();
    for &i in &order {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], i) <= 0.0 {
            lower.pop();
        }
        lower.push(i);
    }
    let mut upper: Vec<usize> = Vec::new();
    for &i in order.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], i) <= 0.0 {
            upper.pop();
        }
        upper.push(i);
    }

    // last vertex of each chain is the first of the other
    lower.pop();
    upper.pop();
    let hull: Vec<usize> = lower.into_iter().chain(upper).collect();
    if hull.len() < 3 {
        return Err(CanopyError::InsufficientData(
            "all points are collinear, hull is degenerate".into(),
        ));
    }

    let mut ring: Vec<Point2<f64>> = hull
        .into_iter()
        .map(|i| Point2::new(points.x()[i], points.y()[i]))
        .collect();
    ring.push(ring[0]);
    Ok(ring)
}

/// Area enclosed by a closed ring, by the shoelace formula. Positive for
/// counter-clockwise rings such as the ones [convex_hull] produces.
pub fn ring_area(ring: &[Point2<f64>]) -> f64 {
    ring.windows(2)
        .map(|pair| pair[0].x * pair[1].y - pair[1].x * pair[0].y)
        .sum::<f64>()
        / 2.0
}
