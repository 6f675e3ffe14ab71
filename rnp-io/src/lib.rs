//! File I/O for the reconstruction-to-manifest pipeline

pub mod colmap;
pub mod convert;
mod error;
pub mod image;
pub mod manifest;

pub use colmap::{Reconstruction, read_cameras_txt, read_images_txt, read_reconstruction};
pub use convert::{ConvertOptions, ConvertSummary, MANIFEST_FILE, build_manifest, convert};
pub use crate::image::{Image, load_luma, score_image, score_with_policy};
pub use manifest::write_manifest;
