use std::collections::HashMap;

use super::{CameraModelKind, Distortion};
use crate::error::CameraError;

/// Intrinsic parameters of one physical camera
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntrinsics {
    id: String,
    model: CameraModelKind,
    width: u32,
    height: u32,
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    distortion: Distortion,
}

impl CameraIntrinsics {
    /// Build intrinsics from the parameter list of a camera line.
    ///
    /// Single-focal models use the same focal length on both axes.
    pub fn from_params(
        id: impl Into<String>,
        model: CameraModelKind,
        width: u32,
        height: u32,
        params: &[f64],
    ) -> Result<Self, CameraError> {
        if params.len() < model.num_params() {
            return Err(CameraError::TooFewParams {
                model: model.as_str(),
                expected: model.num_params(),
                found: params.len(),
            });
        }
        if width == 0 {
            return Err(CameraError::NonPositive("width", 0.0));
        }
        if height == 0 {
            return Err(CameraError::NonPositive("height", 0.0));
        }

        let (fx, fy, cx, cy) = if model.has_single_focal() {
            (params[0], params[0], params[1], params[2])
        } else {
            (params[0], params[1], params[2], params[3])
        };

        if !fx.is_finite() || fx <= 0.0 {
            return Err(CameraError::NonPositive("fx", fx));
        }
        if !fy.is_finite() || fy <= 0.0 {
            return Err(CameraError::NonPositive("fy", fy));
        }

        Ok(Self {
            id: id.into(),
            model,
            width,
            height,
            fx,
            fy,
            cx,
            cy,
            distortion: Distortion::from_params(model, params),
        })
    }

    /// Ideal pinhole camera with the principal point at the image center
    #[cfg(test)]
    fn new_ideal(id: impl Into<String>, width: u32, height: u32, fx: f64, fy: f64) -> Self {
        Self {
            id: id.into(),
            model: CameraModelKind::Pinhole,
            width,
            height,
            fx,
            fy,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            distortion: Distortion::none(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> CameraModelKind {
        self.model
    }

    /// Get focal lengths
    pub fn focal_length(&self) -> (f64, f64) {
        (self.fx, self.fy)
    }

    /// Get principal point
    pub fn principal_point(&self) -> (f64, f64) {
        (self.cx, self.cy)
    }

    /// Get image dimensions (width, height)
    pub fn image_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn distortion(&self) -> &Distortion {
        &self.distortion
    }

    pub fn is_fisheye(&self) -> bool {
        self.model == CameraModelKind::OpencvFisheye
    }

    /// Whether the principal point lies inside the image
    pub fn principal_point_in_bounds(&self) -> bool {
        (0.0..=self.width as f64).contains(&self.cx)
            && (0.0..=self.height as f64).contains(&self.cy)
    }
}

/// Cameras of one reconstruction, keyed by camera id
#[derive(Debug, Clone, Default)]
pub struct CameraTable {
    cameras: HashMap<String, CameraIntrinsics>,
}

impl CameraTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a camera, returning the one it replaced if the id was already taken
    pub fn insert(&mut self, camera: CameraIntrinsics) -> Option<CameraIntrinsics> {
        self.cameras.insert(camera.id.clone(), camera)
    }

    pub fn get(&self, id: &str) -> Option<&CameraIntrinsics> {
        self.cameras.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cameras.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

impl FromIterator<CameraIntrinsics> for CameraTable {
    fn from_iter<I: IntoIterator<Item = CameraIntrinsics>>(iter: I) -> Self {
        let mut table = Self::new();
        for camera in iter {
            table.insert(camera);
        }
        table
    }
}
