use nalgebra::{Point3, Vector3};

/// 3D axis-aligned bounding box over f64 coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3 {
    min: Point3<f64>,
    max: Point3<f64>,
}

impl Bounds3 {
    /// Creates new bounds from the given minimum and maximum coordinates. Panics if the minimum
    /// position is not less than or equal to the maximum position
    /// ```
    /// # use canopy_core::math::Bounds3;
    /// let bounds = Bounds3::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// ```
    pub fn from_min_max(min: Point3<f64>, max: Point3<f64>) -> Self {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            panic!("Bounds3::from_min_max: Minimum position must be <= maximum position!");
        }
        Self { min, max }
    }

    /// Computes the bounds of all points yielded by `positions`. Returns `None` for an empty
    /// iterator
    /// ```
    /// # use canopy_core::math::Bounds3;
    /// # use nalgebra::Point3;
    /// let bounds = Bounds3::from_points([Point3::new(0.0, 2.0, 1.0), Point3::new(3.0, 1.0, 0.0)].into_iter()).unwrap();
    /// assert_eq!(*bounds.min(), Point3::new(0.0, 1.0, 0.0));
    /// assert_eq!(*bounds.max(), Point3::new(3.0, 2.0, 1.0));
    /// ```
    pub fn from_points(positions: impl Iterator<Item = Point3<f64>>) -> Option<Self> {
        let mut bounds: Option<Bounds3> = None;
        for position in positions {
            bounds = Some(match bounds {
                None => Bounds3 {
                    min: position,
                    max: position,
                },
                Some(current) => Bounds3::extend_with_point(&current, &position),
            });
        }
        bounds
    }

    /// Returns the minimum point of these bounds
    pub fn min(&self) -> &Point3<f64> {
        &self.min
    }

    /// Returns the maximum point of these bounds
    pub fn max(&self) -> &Point3<f64> {
        &self.max
    }

    /// Returns the extent of these bounds, i.e. the size between the minimum and maximum position
    /// ```
    /// # use canopy_core::math::Bounds3;
    /// let bounds = Bounds3::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(2.0, 1.0, 1.0));
    /// assert_eq!(bounds.extent(), nalgebra::Vector3::new(2.0, 1.0, 1.0));
    /// ```
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Returns true if the given point is contained within these bounds. Points right on the
    /// boundary count as contained
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Extends the given bounds so that they contain the given point
    pub fn extend_with_point(bounds: &Bounds3, point: &Point3<f64>) -> Bounds3 {
        Bounds3 {
            min: Point3::new(
                bounds.min.x.min(point.x),
                bounds.min.y.min(point.y),
                bounds.min.z.min(point.z),
            ),
            max: Point3::new(
                bounds.max.x.max(point.x),
                bounds.max.y.max(point.y),
                bounds.max.z.max(point.z),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_single_point_has_zero_extent() {
        let bounds =
            Bounds3::from_points([Point3::new(1.0, 2.0, 3.0)].into_iter()).unwrap();
        assert_eq!(bounds.extent(), Vector3::new(0.0, 0.0, 0.0));
        assert!(bounds.contains(&Point3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn from_points_empty_is_none() {
        assert!(Bounds3::from_points(std::iter::empty()).is_none());
    }

    #[test]
    #[should_panic]
    fn from_min_max_rejects_inverted_bounds() {
        Bounds3::from_min_max(Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 1.0));
    }
}
