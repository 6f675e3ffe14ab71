//! Camera intrinsics as described by a sparse reconstruction

mod distortion;
mod intrinsics;

pub use distortion::Distortion;
pub use intrinsics::{CameraIntrinsics, CameraTable};

/// Camera models understood by the reconstruction reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraModelKind {
    /// f, cx, cy
    SimplePinhole,
    /// fx, fy, cx, cy
    Pinhole,
    /// f, cx, cy, k
    SimpleRadial,
    /// f, cx, cy, k1, k2
    Radial,
    /// fx, fy, cx, cy, k1, k2, p1, p2
    Opencv,
    /// fx, fy, cx, cy, k1, k2, k3, k4
    OpencvFisheye,
}

impl CameraModelKind {
    /// Parse the model token of a camera line, `None` for models we do not handle
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "SIMPLE_PINHOLE" => Some(Self::SimplePinhole),
            "PINHOLE" => Some(Self::Pinhole),
            "SIMPLE_RADIAL" => Some(Self::SimpleRadial),
            "RADIAL" => Some(Self::Radial),
            "OPENCV" => Some(Self::Opencv),
            "OPENCV_FISHEYE" => Some(Self::OpencvFisheye),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimplePinhole => "SIMPLE_PINHOLE",
            Self::Pinhole => "PINHOLE",
            Self::SimpleRadial => "SIMPLE_RADIAL",
            Self::Radial => "RADIAL",
            Self::Opencv => "OPENCV",
            Self::OpencvFisheye => "OPENCV_FISHEYE",
        }
    }

    /// Number of parameters following `WIDTH HEIGHT` on a camera line
    pub fn num_params(&self) -> usize {
        match self {
            Self::SimplePinhole => 3,
            Self::Pinhole => 4,
            Self::SimpleRadial => 4,
            Self::Radial => 5,
            Self::Opencv => 8,
            Self::OpencvFisheye => 8,
        }
    }

    /// Whether the model carries a single focal length
    pub fn has_single_focal(&self) -> bool {
        matches!(self, Self::SimplePinhole | Self::SimpleRadial | Self::Radial)
    }
}
