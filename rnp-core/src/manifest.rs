//! The `transforms.json` scene descriptor

use std::path::Path;

use nalgebra::Matrix4;
use serde::Serialize;

use crate::camera::{CameraIntrinsics, CameraTable};
use crate::error::{Result, RnpError};
use crate::pose::ImagePose;

/// Bounding box scale the trainer uses unless told otherwise
pub const DEFAULT_AABB_SCALE: u32 = 16;

/// Largest bounding box scale the trainer accepts
pub const MAX_AABB_SCALE: u32 = 128;

/// One image as the trainer sees it.
///
/// Every field is a copy; editing the source intrinsics afterwards does not
/// change a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    pub file_path: String,
    pub sharpness: f32,
    /// Row-major camera-to-world
    pub transform_matrix: [[f32; 4]; 4],
    pub camera_angle_x: f32,
    pub camera_angle_y: f32,
    pub fl_x: f32,
    pub fl_y: f32,
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub k4: f32,
    pub p1: f32,
    pub p2: f32,
    pub is_fisheye: bool,
    pub cx: f32,
    pub cy: f32,
    pub w: u32,
    pub h: u32,
}

impl FrameRecord {
    pub fn new(
        file_path: impl Into<String>,
        transform: &Matrix4<f64>,
        camera: &CameraIntrinsics,
        sharpness: f64,
    ) -> Self {
        let (fx, fy) = camera.focal_length();
        let (cx, cy) = camera.principal_point();
        let (w, h) = camera.image_size();
        let d = camera.distortion();

        Self {
            file_path: file_path.into(),
            sharpness: sharpness as f32,
            transform_matrix: std::array::from_fn(|r| {
                std::array::from_fn(|c| transform[(r, c)] as f32)
            }),
            camera_angle_x: 0.0,
            camera_angle_y: 0.0,
            fl_x: fx as f32,
            fl_y: fy as f32,
            k1: d.k1 as f32,
            k2: d.k2 as f32,
            k3: d.k3 as f32,
            k4: d.k4 as f32,
            p1: d.p1 as f32,
            p2: d.p2 as f32,
            is_fisheye: camera.is_fisheye(),
            cx: cx as f32,
            cy: cy as f32,
            w,
            h,
        }
    }

    fn scalar_fields(&self) -> [(&'static str, f32); 13] {
        [
            ("sharpness", self.sharpness),
            ("camera_angle_x", self.camera_angle_x),
            ("camera_angle_y", self.camera_angle_y),
            ("fl_x", self.fl_x),
            ("fl_y", self.fl_y),
            ("k1", self.k1),
            ("k2", self.k2),
            ("k3", self.k3),
            ("k4", self.k4),
            ("p1", self.p1),
            ("p2", self.p2),
            ("cx", self.cx),
            ("cy", self.cy),
        ]
    }

    /// Name of the first non-finite field, if any
    fn first_non_finite(&self) -> Option<String> {
        if let Some((name, _)) = self.scalar_fields().iter().find(|(_, v)| !v.is_finite()) {
            return Some(name.to_string());
        }
        for (r, row) in self.transform_matrix.iter().enumerate() {
            if let Some(c) = row.iter().position(|v| !v.is_finite()) {
                return Some(format!("transform_matrix[{r}][{c}]"));
            }
        }
        None
    }
}

/// Scene-level descriptor consumed by the trainer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneManifest {
    pub aabb_scale: u32,
    pub frames: Vec<FrameRecord>,
}

impl Default for SceneManifest {
    fn default() -> Self {
        Self::new(DEFAULT_AABB_SCALE)
    }
}

impl SceneManifest {
    pub fn new(aabb_scale: u32) -> Self {
        Self {
            aabb_scale,
            frames: Vec::new(),
        }
    }

    /// Snapshot every pose, in order, together with its camera.
    ///
    /// `file_prefix` is joined with each image name to form `file_path`.
    pub fn from_poses(
        aabb_scale: u32,
        poses: &[ImagePose],
        cameras: &CameraTable,
        file_prefix: &Path,
    ) -> Result<Self> {
        let frames = poses
            .iter()
            .map(|pose| {
                let camera = cameras.get(&pose.camera_id).ok_or_else(|| {
                    RnpError::MissingCameraReference {
                        image: pose.name.clone(),
                        camera_id: pose.camera_id.clone(),
                    }
                })?;
                let file_path = file_prefix.join(&pose.name);
                Ok(FrameRecord::new(
                    file_path.to_string_lossy(),
                    &pose.transform,
                    camera,
                    pose.sharpness,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { aabb_scale, frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Reject anything the trainer cannot load
    pub fn validate(&self) -> Result<()> {
        if !self.aabb_scale.is_power_of_two() || self.aabb_scale > MAX_AABB_SCALE {
            return Err(RnpError::SerializationRejected(format!(
                "aabb_scale must be a power of two up to {MAX_AABB_SCALE}, got {}",
                self.aabb_scale
            )));
        }

        for (i, frame) in self.frames.iter().enumerate() {
            if let Some(field) = frame.first_non_finite() {
                return Err(RnpError::SerializationRejected(format!(
                    "frame {i} ({}) has non-finite {field}",
                    frame.file_path
                )));
            }
        }
        Ok(())
    }

    /// Pretty-printed JSON. Identical input always gives identical bytes.
    pub fn to_json(&self) -> Result<String> {
        self.validate()?;
        serde_json::to_string_pretty(self)
            .map_err(|e| RnpError::SerializationRejected(e.to_string()))
    }
}
