pub mod camera;
pub mod error;
pub mod focus;
pub mod manifest;
pub mod normalize;
pub mod pose;

pub use camera::{CameraIntrinsics, CameraModelKind, CameraTable, Distortion};
pub use error::{CameraError, NormalizeError, PoseError, Result, RnpError};
pub use focus::{FocusPolicy, NEUTRAL_SHARPNESS, laplacian_variance};
pub use manifest::{DEFAULT_AABB_SCALE, FrameRecord, SceneManifest};
pub use normalize::{NormalizeOptions, NormalizeReport, UpAxis, normalize, normalize_poses};
pub use pose::{ImageEntry, ImagePose, colmap_to_nerf, compose};
