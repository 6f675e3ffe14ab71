//! Scene normalization: up-alignment, recentering on the rig's point of
//! convergence, and rescaling to a canonical camera distance.

use log::{debug, info, warn};
use nalgebra::{Matrix3, Matrix4, Vector3};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;

use crate::error::NormalizeError;
use crate::pose::{ImagePose, homogeneous};

/// Mean camera distance from the origin after rescaling
pub const DEFAULT_TARGET_DISTANCE: f64 = 4.0;

/// Pairs of rays whose weight falls at or below this are ignored
pub const DEFAULT_MIN_PAIR_WEIGHT: f64 = 1e-5;

/// Guards divisions by the squared sine of nearly parallel vectors
const DENOM_EPS: f64 = 1e-10;

/// Where the scene's "up" direction comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpAxis {
    /// Sum of every camera's up column
    MeanCameraUp,
    /// A direction given by the caller
    Fixed(Vector3<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub up: UpAxis,
    pub target_distance: f64,
    pub min_pair_weight: f64,
    /// Seed for the perturbation used when `up` points straight down
    pub seed: u64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            up: UpAxis::MeanCameraUp,
            target_distance: DEFAULT_TARGET_DISTANCE,
            min_pair_weight: DEFAULT_MIN_PAIR_WEIGHT,
            seed: 0,
        }
    }
}

/// What the normalization pass did
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeReport {
    /// Normalized up vector that was rotated onto +Z
    pub up: Vector3<f64>,
    /// Convergence point subtracted from every translation, if one was found
    pub center: Option<Vector3<f64>>,
    /// Mean camera distance from the origin before rescaling
    pub mean_distance: f64,
    /// Factor applied to every translation
    pub scale: f64,
}

/// Viewing axis of a converted camera. The axis flip leaves Z untouched.
pub fn look_direction(transform: &Matrix4<f64>) -> Vector3<f64> {
    transform.fixed_view::<3, 1>(0, 2).into_owned()
}

fn camera_up(transform: &Matrix4<f64>) -> Vector3<f64> {
    transform.fixed_view::<3, 1>(0, 1).into_owned()
}

fn camera_center(transform: &Matrix4<f64>) -> Vector3<f64> {
    transform.fixed_view::<3, 1>(0, 3).into_owned()
}

/// Sum of the up columns of all cameras, normalized
pub fn mean_camera_up(transforms: &[Matrix4<f64>]) -> Vector3<f64> {
    let sum = transforms
        .iter()
        .fold(Vector3::zeros(), |acc, t| acc + camera_up(t));
    sum.normalize()
}

/// Rotation taking direction `a` onto direction `b` (Rodrigues).
///
/// When `a` and `b` are opposite the rotation axis is undefined, so `a` is
/// nudged by a small random offset drawn from `rng` and the construction retried.
pub fn rotation_between<R: Rng>(a: &Vector3<f64>, b: &Vector3<f64>, rng: &mut R) -> Matrix3<f64> {
    let b = b.normalize();
    let mut a = a.normalize();

    loop {
        let v = a.cross(&b);
        let c = a.dot(&b);
        if c < -1.0 + DENOM_EPS {
            let jitter = Vector3::from_fn(|_, _| rng.random_range(-0.01..0.01));
            a = (a + jitter).normalize();
            continue;
        }

        let s = v.norm();
        let k = v.cross_matrix();
        return Matrix3::identity() + k + k * k * ((1.0 - c) / (s * s + DENOM_EPS));
    }
}

/// Point closest to two forward rays `o + t*d` (`t >= 0`) and a weight that
/// vanishes as the rays become parallel.
pub fn closest_point_between_rays(
    oa: &Vector3<f64>,
    da: &Vector3<f64>,
    ob: &Vector3<f64>,
    db: &Vector3<f64>,
) -> (Vector3<f64>, f64) {
    let da = da.normalize();
    let db = db.normalize();
    let c = da.cross(&db);
    let denom = c.norm_squared();
    let t = ob - oa;

    let ta = (t.dot(&db.cross(&c)) / (denom + DENOM_EPS)).max(0.0);
    let tb = (t.dot(&da.cross(&c)) / (denom + DENOM_EPS)).max(0.0);

    ((oa + da * ta + ob + db * tb) * 0.5, denom)
}

/// Weighted sum of closest points and total weight for every pair `(i, j)`, `j > i`
fn pair_row(transforms: &[Matrix4<f64>], i: usize, min_weight: f64) -> (Vector3<f64>, f64) {
    let oa = camera_center(&transforms[i]);
    let da = look_direction(&transforms[i]);

    transforms[i + 1..]
        .iter()
        .map(|other| {
            closest_point_between_rays(&oa, &da, &camera_center(other), &look_direction(other))
        })
        .filter(|(_, w)| *w > min_weight)
        .fold((Vector3::zeros(), 0.0), |(acc, total), (p, w)| (acc + p * w, total + w))
}

/// Point the camera rays agree on looking toward.
///
/// `None` when no pair of rays is informative (all cameras parallel, or fewer
/// than two cameras).
pub fn convergence_point(
    transforms: &[Matrix4<f64>],
    min_pair_weight: f64,
) -> Option<Vector3<f64>> {
    // rows are reduced in index order so the result does not depend on scheduling
    let rows: Vec<_> = (0..transforms.len())
        .into_par_iter()
        .map(|i| pair_row(transforms, i, min_pair_weight))
        .collect();

    let (sum, total) = rows
        .into_iter()
        .fold((Vector3::zeros(), 0.0), |(acc, total), (p, w)| (acc + p, total + w));

    if total > 0.0 && total.is_finite() {
        Some(sum / total)
    } else {
        None
    }
}

fn check_finite(transforms: &[Matrix4<f64>]) -> Result<(), NormalizeError> {
    match transforms.iter().position(|t| t.iter().any(|v| !v.is_finite())) {
        Some(i) => Err(NormalizeError::NumericDegeneracy(format!(
            "non-finite value in transform {i}"
        ))),
        None => Ok(()),
    }
}

/// Re-orient, recenter and rescale a camera rig in place.
///
/// The input is only modified if every resulting transform is finite; on error
/// the transforms are left exactly as they were.
pub fn normalize(
    transforms: &mut [Matrix4<f64>],
    options: &NormalizeOptions,
) -> Result<NormalizeReport, NormalizeError> {
    if transforms.is_empty() {
        return Err(NormalizeError::NumericDegeneracy(
            "no camera transforms to normalize".to_string(),
        ));
    }
    if !options.target_distance.is_finite() || options.target_distance <= 0.0 {
        return Err(NormalizeError::NumericDegeneracy(format!(
            "target distance must be positive, got {}",
            options.target_distance
        )));
    }

    let up = match options.up {
        UpAxis::MeanCameraUp => mean_camera_up(transforms),
        UpAxis::Fixed(v) => v.normalize(),
    };
    if up.iter().any(|v| !v.is_finite()) {
        return Err(NormalizeError::NumericDegeneracy(
            "up vector has zero length".to_string(),
        ));
    }
    info!("up vector was [{:.6}, {:.6}, {:.6}]", up.x, up.y, up.z);

    let mut rng = StdRng::seed_from_u64(options.seed);
    let rotation = homogeneous(&rotation_between(&up, &Vector3::z(), &mut rng), &Vector3::zeros());
    let mut work: Vec<Matrix4<f64>> = transforms.iter().map(|t| rotation * t).collect();

    let center = convergence_point(&work, options.min_pair_weight);
    match center {
        Some(c) => {
            info!("center of attention [{:.6}, {:.6}, {:.6}]", c.x, c.y, c.z);
            for t in work.iter_mut() {
                let mut translation = t.fixed_view_mut::<3, 1>(0, 3);
                translation -= c;
            }
        }
        None => warn!("camera rays never converge, skipping recentering"),
    }

    let mean_distance =
        work.iter().map(|t| camera_center(t).norm()).sum::<f64>() / work.len() as f64;
    info!("avg camera distance from origin {mean_distance:.6}");

    let scale = if mean_distance > 0.0 {
        options.target_distance / mean_distance
    } else {
        warn!("all cameras sit at the origin, skipping rescale");
        1.0
    };
    for t in work.iter_mut() {
        let mut translation = t.fixed_view_mut::<3, 1>(0, 3);
        translation *= scale;
    }

    check_finite(&work)?;
    transforms.copy_from_slice(&work);
    debug!("normalized {} transforms, scale {scale:.6}", transforms.len());

    Ok(NormalizeReport {
        up,
        center,
        mean_distance,
        scale,
    })
}

/// Normalize the transforms of a set of poses in place
pub fn normalize_poses(
    poses: &mut [ImagePose],
    options: &NormalizeOptions,
) -> Result<NormalizeReport, NormalizeError> {
    let mut transforms: Vec<_> = poses.iter().map(|p| p.transform).collect();
    let report = normalize(&mut transforms, options)?;
    for (pose, transform) in poses.iter_mut().zip(transforms) {
        pose.transform = transform;
    }
    Ok(report)
}
