//! Camera pose conversion into the trainer's coordinate convention

use nalgebra::{Matrix3, Matrix4, Quaternion, Vector3, Vector4};

use crate::error::PoseError;

/// One image line of a reconstruction, before any conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEntry {
    pub image_id: u32,
    /// qw, qx, qy, qz
    pub rotation: [f64; 4],
    pub translation: [f64; 3],
    pub camera_id: String,
    pub name: String,
}

impl ImageEntry {
    pub fn quaternion(&self) -> Quaternion<f64> {
        let [w, x, y, z] = self.rotation;
        Quaternion::new(w, x, y, z)
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::from(self.translation)
    }
}

/// A reconstructed image with its converted transform and focus score
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePose {
    pub image_id: u32,
    pub name: String,
    pub camera_id: String,
    pub orientation: Quaternion<f64>,
    pub position: Vector3<f64>,
    /// Camera-to-world in the trainer convention
    pub transform: Matrix4<f64>,
    pub sharpness: f64,
}

impl ImagePose {
    /// Convert a parsed image line
    pub fn from_entry(entry: ImageEntry, sharpness: f64) -> Result<Self, PoseError> {
        let orientation = entry.quaternion();
        let position = entry.position();
        let transform = compose(&orientation, &position)?;

        Ok(Self {
            image_id: entry.image_id,
            name: entry.name,
            camera_id: entry.camera_id,
            orientation,
            position,
            transform,
            sharpness,
        })
    }

    /// Translation column of the transform
    pub fn translation(&self) -> Vector3<f64> {
        self.transform.fixed_view::<3, 1>(0, 3).into_owned()
    }
}

/// Rotation matrix of a quaternion, normalizing it first.
pub fn quaternion_to_rotation(q: &Quaternion<f64>) -> Result<Matrix3<f64>, PoseError> {
    let norm = q.norm();
    if !norm.is_finite() || norm < f64::EPSILON {
        return Err(PoseError::InvalidOrientation);
    }

    let w = q.w / norm;
    let x = q.i / norm;
    let y = q.j / norm;
    let z = q.k / norm;

    Ok(Matrix3::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - w * z),
        2.0 * (x * z + w * y),
        2.0 * (x * y + w * z),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - w * x),
        2.0 * (x * z - w * y),
        2.0 * (y * z + w * x),
        1.0 - 2.0 * (x * x + y * y),
    ))
}

/// Homogeneous transform from a rotation block and a translation column
pub fn homogeneous(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Matrix4<f64> {
    let mut transform = Matrix4::identity();
    transform.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    transform.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    transform
}

/// Basis change from the reconstruction camera frame (X right, Y down) to the
/// trainer camera frame (X left, Y up), applied on the right.
pub fn axis_flip() -> Matrix4<f64> {
    Matrix4::from_diagonal(&Vector4::new(-1.0, -1.0, 1.0, 1.0))
}

/// Convert a transform from the reconstruction camera convention to the trainer's.
///
/// Negates the first two basis columns; the translation column and the
/// determinant of the rotation block are unchanged.
pub fn colmap_to_nerf(transform: &Matrix4<f64>) -> Matrix4<f64> {
    transform * axis_flip()
}

/// Build the trainer-convention transform of a camera pose
pub fn compose(q: &Quaternion<f64>, position: &Vector3<f64>) -> Result<Matrix4<f64>, PoseError> {
    let rotation = quaternion_to_rotation(q)?;
    Ok(colmap_to_nerf(&homogeneous(&rotation, position)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_orthonormal(r: &Matrix3<f64>) {
        for i in 0..3 {
            assert!((r.column(i).norm() - 1.0).abs() < 1e-12);
            for j in (i + 1)..3 {
                assert!(r.column(i).dot(&r.column(j)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_identity_quaternion() {
        let r = quaternion_to_rotation(&Quaternion::new(1.0, 0.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(r, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_about_z() {
        // 90 degrees about +Z
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let r = quaternion_to_rotation(&Quaternion::new(h, 0.0, 0.0, h)).unwrap();
        let v = r * Vector3::x();
        assert_relative_eq!(v, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_matches_nalgebra_unit_quaternion() {
        let q = Quaternion::new(0.3, -0.5, 0.7, 0.1);
        let r = quaternion_to_rotation(&q).unwrap();
        let expected = nalgebra::UnitQuaternion::from_quaternion(q)
            .to_rotation_matrix()
            .into_inner();
        assert_relative_eq!(r, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_unnormalized_quaternion_is_orthonormal() {
        let quats = [
            Quaternion::new(2.0, 0.0, 0.0, 0.0),
            Quaternion::new(0.1, 0.2, 0.3, 0.4),
            Quaternion::new(-3.0, 1.0, -7.0, 0.5),
            Quaternion::new(0.0, 0.0, 1e-3, 0.0),
        ];
        for q in quats {
            let r = quaternion_to_rotation(&q).unwrap();
            assert_orthonormal(&r);
            assert!((r.determinant() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_quaternion() {
        let q = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(quaternion_to_rotation(&q), Err(PoseError::InvalidOrientation));
        assert_eq!(
            compose(&q, &Vector3::new(1.0, 2.0, 3.0)),
            Err(PoseError::InvalidOrientation)
        );
    }

    #[test]
    fn test_nan_quaternion() {
        let q = Quaternion::new(f64::NAN, 0.0, 0.0, 0.0);
        assert_eq!(quaternion_to_rotation(&q), Err(PoseError::InvalidOrientation));
    }

    #[test]
    fn test_axis_flip_negates_first_two_columns() {
        let r = quaternion_to_rotation(&Quaternion::new(0.9, 0.1, -0.3, 0.2)).unwrap();
        let t = Vector3::new(4.0, -5.0, 6.0);
        let raw = homogeneous(&r, &t);
        let flipped = colmap_to_nerf(&raw);

        for c in 0..4 {
            let sign = if c < 2 { -1.0 } else { 1.0 };
            let expected = raw.column(c).into_owned() * sign;
            assert_relative_eq!(flipped.column(c).into_owned(), expected, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_axis_flip_preserves_handedness() {
        let r = quaternion_to_rotation(&Quaternion::new(0.2, 0.4, -0.1, 0.8)).unwrap();
        let flipped = colmap_to_nerf(&homogeneous(&r, &Vector3::zeros()));
        let block = flipped.fixed_view::<3, 3>(0, 0).into_owned();
        assert_orthonormal(&block);
        assert!((block.determinant() - r.determinant()).abs() < 1e-12);
    }

    #[test]
    fn test_axis_flip_twice_is_identity() {
        let m = homogeneous(
            &quaternion_to_rotation(&Quaternion::new(0.5, 0.5, 0.5, 0.5)).unwrap(),
            &Vector3::new(1.0, 1.0, 1.0),
        );
        assert_relative_eq!(colmap_to_nerf(&colmap_to_nerf(&m)), m, epsilon = 1e-15);
    }

    #[test]
    fn test_compose_identity() {
        let q = Quaternion::new(1.0, 0.0, 0.0, 0.0);
        let t = compose(&q, &Vector3::new(1.0, 2.0, 3.0)).unwrap();
        let expected = Matrix4::new(
            -1.0, 0.0, 0.0, 1.0, //
            0.0, -1.0, 0.0, 2.0, //
            0.0, 0.0, 1.0, 3.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        assert_relative_eq!(t, expected, epsilon = 1e-15);
    }

    #[test]
    fn test_compose_bottom_row() {
        let q = Quaternion::new(0.1, 0.7, -0.2, 0.3);
        let t = compose(&q, &Vector3::new(-8.0, 0.5, 2.0)).unwrap();
        assert_eq!(t.row(3).into_owned(), nalgebra::RowVector4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_pose_from_entry() {
        let entry = ImageEntry {
            image_id: 1,
            rotation: [1.0, 0.0, 0.0, 0.0],
            translation: [1.0, 2.0, 3.0],
            camera_id: "1".to_string(),
            name: "img.png".to_string(),
        };
        let pose = ImagePose::from_entry(entry, 42.0).unwrap();
        assert_eq!(pose.translation(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(pose.sharpness, 42.0);
        assert_eq!(pose.name, "img.png");
    }
}
