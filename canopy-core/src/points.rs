use std::str::FromStr;

use nalgebra::Point3;

use crate::math::Bounds3;
use crate::{CanopyError, CanopyResult};

/// The per-point attributes a decoded point record carries, besides the
/// position itself. The schema is fixed: it matches what the point-I/O
/// collaborator decodes from an LAS-style record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    X,
    Y,
    Z,
    Intensity,
    ReturnNumber,
    Classification,
    FlagByte,
    ScanAngleRank,
    UserData,
    PointSourceId,
}

impl Attribute {
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::X => "x",
            Attribute::Y => "y",
            Attribute::Z => "z",
            Attribute::Intensity => "intensity",
            Attribute::ReturnNumber => "return_num",
            Attribute::Classification => "classification",
            Attribute::FlagByte => "flag_byte",
            Attribute::ScanAngleRank => "scan_angle_rank",
            Attribute::UserData => "user_data",
            Attribute::PointSourceId => "pt_src_id",
        }
    }
}

impl FromStr for Attribute {
    type Err = CanopyError;

    fn from_str(s: &str) -> CanopyResult<Self> {
        match s {
            "x" => Ok(Attribute::X),
            "y" => Ok(Attribute::Y),
            "z" => Ok(Attribute::Z),
            "intensity" => Ok(Attribute::Intensity),
            "return_num" => Ok(Attribute::ReturnNumber),
            "classification" => Ok(Attribute::Classification),
            "flag_byte" => Ok(Attribute::FlagByte),
            "scan_angle_rank" => Ok(Attribute::ScanAngleRank),
            "user_data" => Ok(Attribute::UserData),
            "pt_src_id" => Ok(Attribute::PointSourceId),
            other => Err(CanopyError::invalid_parameter(
                "attribute",
                format!("unknown point attribute '{}'", other),
            )),
        }
    }
}

/// Raw columnar point data, one `Vec` per attribute, all indexed by the same
/// point index. This is the exchange type between the point-I/O collaborator
/// and [PointSet].
#[derive(Debug, Clone, Default)]
pub struct PointColumns {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub intensity: Vec<u16>,
    pub return_number: Vec<u8>,
    pub classification: Vec<u8>,
    pub flag_byte: Vec<u8>,
    pub scan_angle_rank: Vec<i8>,
    pub user_data: Vec<u8>,
    pub point_source_id: Vec<u16>,
}

impl PointColumns {
    fn column_lengths(&self) -> [usize; 10] {
        [
            self.x.len(),
            self.y.len(),
            self.z.len(),
            self.intensity.len(),
            self.return_number.len(),
            self.classification.len(),
            self.flag_byte.len(),
            self.scan_angle_rank.len(),
            self.user_data.len(),
            self.point_source_id.len(),
        ]
    }
}

/// In-memory columnar representation of a point cloud.
///
/// All attribute columns share the same length; the 3D bounds are computed at
/// construction and only change when a new `PointSet` is derived. Deriving
/// operations ([filter](PointSet::filter), [clip](PointSet::clip),
/// [with_z](PointSet::with_z)) are pure: they return a new instance with
/// recomputed bounds and leave `self` untouched.
///
/// An opaque CRS string can ride along for the export collaborators; the core
/// never interprets it.
#[derive(Debug, Clone)]
pub struct PointSet {
    columns: PointColumns,
    bounds: Option<Bounds3>,
    crs: Option<String>,
}

impl PointSet {
    /// Creates a point set from full decoded columns. Fails if the columns do
    /// not all have the same length.
    pub fn from_columns(columns: PointColumns) -> CanopyResult<Self> {
        let lengths = columns.column_lengths();
        if lengths.iter().any(|&len| len != lengths[0]) {
            return Err(CanopyError::invalid_parameter(
                "columns",
                format!("attribute columns differ in length: {:?}", lengths),
            ));
        }
        let bounds = Bounds3::from_points(
            columns
                .x
                .iter()
                .zip(columns.y.iter())
                .zip(columns.z.iter())
                .map(|((&x, &y), &z)| Point3::new(x, y, z)),
        );
        Ok(Self {
            columns,
            bounds,
            crs: None,
        })
    }

    /// Creates a point set from bare coordinates, zero-filling the auxiliary
    /// attribute columns. Fails if the coordinate columns differ in length.
    pub fn from_xyz(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> CanopyResult<Self> {
        let count = x.len();
        Self::from_columns(PointColumns {
            intensity: vec![0; count],
            return_number: vec![0; count],
            classification: vec![0; count],
            flag_byte: vec![0; count],
            scan_angle_rank: vec![0; count],
            user_data: vec![0; count],
            point_source_id: vec![0; count],
            x,
            y,
            z,
        })
    }

    pub fn len(&self) -> usize {
        self.columns.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.x.is_empty()
    }

    /// The 3D bounds of the point set, `None` when empty.
    pub fn bounds(&self) -> Option<&Bounds3> {
        self.bounds.as_ref()
    }

    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    pub fn x(&self) -> &[f64] {
        &self.columns.x
    }

    pub fn y(&self) -> &[f64] {
        &self.columns.y
    }

    pub fn z(&self) -> &[f64] {
        &self.columns.z
    }

    pub fn columns(&self) -> &PointColumns {
        &self.columns
    }

    pub fn position(&self, index: usize) -> Point3<f64> {
        Point3::new(
            self.columns.x[index],
            self.columns.y[index],
            self.columns.z[index],
        )
    }

    /// The value of `attribute` at `index`, widened to f64 so reductions can
    /// treat every attribute uniformly.
    pub fn attribute_value(&self, attribute: Attribute, index: usize) -> f64 {
        match attribute {
            Attribute::X => self.columns.x[index],
            Attribute::Y => self.columns.y[index],
            Attribute::Z => self.columns.z[index],
            Attribute::Intensity => self.columns.intensity[index] as f64,
            Attribute::ReturnNumber => self.columns.return_number[index] as f64,
            Attribute::Classification => self.columns.classification[index] as f64,
            Attribute::FlagByte => self.columns.flag_byte[index] as f64,
            Attribute::ScanAngleRank => self.columns.scan_angle_rank[index] as f64,
            Attribute::UserData => self.columns.user_data[index] as f64,
            Attribute::PointSourceId => self.columns.point_source_id[index] as f64,
        }
    }

    /// Returns a new point set containing the points whose `attribute` value
    /// lies strictly between `min` and `max`.
    pub fn filter(&self, attribute: Attribute, min: f64, max: f64) -> CanopyResult<Self> {
        if min >= max {
            return Err(CanopyError::invalid_parameter(
                "min",
                format!("filter range is empty: min {} >= max {}", min, max),
            ));
        }
        let keep = (0..self.len()).filter(|&i| {
            let value = self.attribute_value(attribute, i);
            value > min && value < max
        });
        Ok(self.select(keep))
    }

    /// Returns a new point set containing the points whose mask entry is true.
    /// The mask comes from the clip collaborator (point-in-polygon test) and
    /// must have one entry per point.
    pub fn clip(&self, keep_mask: &[bool]) -> CanopyResult<Self> {
        if keep_mask.len() != self.len() {
            return Err(CanopyError::invalid_parameter(
                "keep_mask",
                format!(
                    "mask length {} does not match point count {}",
                    keep_mask.len(),
                    self.len()
                ),
            ));
        }
        let keep = (0..self.len()).filter(|&i| keep_mask[i]);
        Ok(self.select(keep))
    }

    /// Returns a new point set with the z column replaced (all other columns
    /// carried over) and bounds recomputed. Used by height normalization.
    pub fn with_z(&self, z: Vec<f64>) -> CanopyResult<Self> {
        if z.len() != self.len() {
            return Err(CanopyError::invalid_parameter(
                "z",
                format!(
                    "replacement column length {} does not match point count {}",
                    z.len(),
                    self.len()
                ),
            ));
        }
        let mut columns = self.columns.clone();
        columns.z = z;
        let mut derived = Self::from_columns(columns)?;
        derived.crs = self.crs.clone();
        Ok(derived)
    }

    // Builds the derived point set directly from the index iterator, without an
    // intermediate full copy.
    fn select(&self, indices: impl Iterator<Item = usize>) -> Self {
        let mut columns = PointColumns::default();
        for i in indices {
            columns.x.push(self.columns.x[i]);
            columns.y.push(self.columns.y[i]);
            columns.z.push(self.columns.z[i]);
            columns.intensity.push(self.columns.intensity[i]);
            columns.return_number.push(self.columns.return_number[i]);
            columns.classification.push(self.columns.classification[i]);
            columns.flag_byte.push(self.columns.flag_byte[i]);
            columns.scan_angle_rank.push(self.columns.scan_angle_rank[i]);
            columns.user_data.push(self.columns.user_data[i]);
            columns.point_source_id.push(self.columns.point_source_id[i]);
        }
        let bounds = Bounds3::from_points(
            columns
                .x
                .iter()
                .zip(columns.y.iter())
                .zip(columns.z.iter())
                .map(|((&x, &y), &z)| Point3::new(x, y, z)),
        );
        Self {
            columns,
            bounds,
            crs: self.crs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_point_set(count: usize) -> PointSet {
        let mut rng = rand::thread_rng();
        let x = (0..count).map(|_| rng.gen_range(0.0..100.0)).collect();
        let y = (0..count).map(|_| rng.gen_range(0.0..100.0)).collect();
        let z = (0..count).map(|_| rng.gen_range(0.0..40.0)).collect();
        PointSet::from_xyz(x, y, z).unwrap()
    }

    #[test]
    fn from_columns_rejects_ragged_input() {
        let columns = PointColumns {
            x: vec![0.0, 1.0],
            y: vec![0.0],
            z: vec![0.0, 1.0],
            ..Default::default()
        };
        assert!(matches!(
            PointSet::from_columns(columns),
            Err(CanopyError::InvalidParameter { param: "columns", .. })
        ));
    }

    #[test]
    fn bounds_track_the_data() {
        let points = PointSet::from_xyz(
            vec![0.0, 4.0, 2.0],
            vec![1.0, 3.0, 5.0],
            vec![-1.0, 7.0, 2.0],
        )
        .unwrap();
        let bounds = points.bounds().unwrap();
        assert_eq!(*bounds.min(), Point3::new(0.0, 1.0, -1.0));
        assert_eq!(*bounds.max(), Point3::new(4.0, 5.0, 7.0));
    }

    #[test]
    fn filter_is_exclusive_and_pure() {
        let points =
            PointSet::from_xyz(vec![0.0; 4], vec![0.0; 4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let filtered = points.filter(Attribute::Z, 1.0, 4.0).unwrap();
        assert_eq!(filtered.z(), &[2.0, 3.0]);
        // the source is untouched
        assert_eq!(points.len(), 4);
    }

    #[test]
    fn filter_rejects_empty_range() {
        let points = PointSet::from_xyz(vec![0.0], vec![0.0], vec![0.0]).unwrap();
        assert!(points.filter(Attribute::Z, 2.0, 2.0).is_err());
    }

    #[test]
    fn clip_requires_matching_mask_length() {
        let points = random_point_set(10);
        assert!(points.clip(&[true; 9]).is_err());
        let clipped = points.clip(&[true; 10]).unwrap();
        assert_eq!(clipped.len(), 10);
    }

    #[test]
    fn clip_keeps_masked_points_only() {
        let points =
            PointSet::from_xyz(vec![1.0, 2.0, 3.0], vec![0.0; 3], vec![5.0, 6.0, 7.0]).unwrap();
        let clipped = points.clip(&[true, false, true]).unwrap();
        assert_eq!(clipped.x(), &[1.0, 3.0]);
        assert_eq!(clipped.z(), &[5.0, 7.0]);
    }

    #[test]
    fn with_z_recomputes_bounds_and_keeps_crs() {
        let points = PointSet::from_xyz(vec![0.0, 1.0], vec![0.0, 1.0], vec![10.0, 20.0])
            .unwrap()
            .with_crs("+proj=utm +zone=10");
        let normalized = points.with_z(vec![0.0, 5.0]).unwrap();
        assert_eq!(normalized.bounds().unwrap().max().z, 5.0);
        assert_eq!(normalized.crs(), Some("+proj=utm +zone=10"));
    }

    #[test]
    fn attribute_names_roundtrip() {
        for attribute in [
            Attribute::X,
            Attribute::Z,
            Attribute::Intensity,
            Attribute::ReturnNumber,
            Attribute::PointSourceId,
        ] {
            assert_eq!(attribute.name().parse::<Attribute>().unwrap(), attribute);
        }
        assert!("color".parse::<Attribute>().is_err());
    }
}
