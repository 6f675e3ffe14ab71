use std::path::PathBuf;

use thiserror::Error;

/// Common errors across the conversion pipeline
#[derive(Error, Debug)]
pub enum RnpError {
    #[error("Pose error: {0}")]
    Pose(#[from] PoseError),

    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Image {image} references unknown camera {camera_id}")]
    MissingCameraReference { image: String, camera_id: String },

    #[error("Image unreadable: {}: {reason}", .path.display())]
    ImageUnreadable { path: PathBuf, reason: String },

    #[error("Serialization rejected: {0}")]
    SerializationRejected(String),

    #[error("Write permission denied: {}", .0.display())]
    WritePermissionDenied(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("{model} expects {expected} parameters, found {found}")]
    TooFewParams {
        model: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{0} must be positive, got {1}")]
    NonPositive(&'static str, f64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("Invalid orientation: quaternion has zero or non-finite norm")]
    InvalidOrientation,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("Numeric degeneracy: {0}")]
    NumericDegeneracy(String),
}

pub type Result<T> = std::result::Result<T, RnpError>;
