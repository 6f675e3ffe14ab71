//! End-to-end conversion of a sparse reconstruction into a scene manifest

use std::path::{Component, Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;
use rnp_core::error::Result;
use rnp_core::focus::{FocusPolicy, NEUTRAL_SHARPNESS};
use rnp_core::manifest::{DEFAULT_AABB_SCALE, SceneManifest};
use rnp_core::normalize::{NormalizeOptions, NormalizeReport, normalize_poses};
use rnp_core::pose::ImagePose;

use crate::colmap::read_reconstruction;
use crate::image::score_with_policy;
use crate::manifest::write_manifest;

pub const MANIFEST_FILE: &str = "transforms.json";

/// Settings for one conversion run
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Directory holding the images named in `images.txt`
    pub image_dir: PathBuf,
    /// Manifest destination
    pub output: PathBuf,
    pub aabb_scale: u32,
    pub focus: FocusPolicy,
    /// Recenter and rescale the rig; `None` keeps raw transforms
    pub normalize: Option<NormalizeOptions>,
}

impl ConvertOptions {
    /// Images in `<dir>/images`, manifest written to `<dir>/transforms.json`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            image_dir: dir.join("images"),
            output: dir.join(MANIFEST_FILE),
            aabb_scale: DEFAULT_AABB_SCALE,
            focus: FocusPolicy::default(),
            normalize: None,
        }
    }
}

/// Outcome of a conversion
#[derive(Debug, Clone)]
pub struct ConvertSummary {
    pub frames: usize,
    pub output: PathBuf,
    /// Present when normalization ran and succeeded
    pub normalization: Option<NormalizeReport>,
}

/// `path` anchored at the working directory, with `.` and `..` resolved lexically
fn lexical_absolute(path: &Path) -> PathBuf {
    let path = if path.as_os_str().is_empty() { Path::new(".") } else { path };
    let anchored = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut out = PathBuf::new();
    for component in anchored.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Image directory as the trainer must see it, resolved against the manifest's directory.
///
/// Relative when the two share a directory, absolute otherwise.
fn file_prefix(image_dir: &Path, output: &Path) -> PathBuf {
    let base = lexical_absolute(output.parent().unwrap_or(Path::new("")));
    let images = lexical_absolute(image_dir);

    let base_parts: Vec<_> = base.components().collect();
    let image_parts: Vec<_> = images.components().collect();
    let shared = base_parts
        .iter()
        .zip(&image_parts)
        .take_while(|(a, b)| a == b)
        .count();

    if !base_parts[..shared].iter().any(|c| matches!(c, Component::Normal(_))) {
        return images;
    }

    let mut relative = PathBuf::new();
    for _ in shared..base_parts.len() {
        relative.push("..");
    }
    for part in &image_parts[shared..] {
        relative.push(part);
    }
    relative
}

/// Build the manifest for the reconstruction in `model_dir` without writing it
pub fn build_manifest(
    model_dir: impl AsRef<Path>,
    options: &ConvertOptions,
) -> Result<(SceneManifest, Option<NormalizeReport>)> {
    let recon = read_reconstruction(model_dir)?;
    if recon.is_empty() {
        warn!("reconstruction contains no images");
    }

    let mut poses = recon
        .images
        .into_par_iter()
        .map(|entry| {
            let mut pose = ImagePose::from_entry(entry, NEUTRAL_SHARPNESS)?;
            pose.sharpness = score_with_policy(options.image_dir.join(&pose.name), options.focus)?;
            Ok(pose)
        })
        .collect::<Result<Vec<_>>>()?;

    let report = match &options.normalize {
        Some(opts) => match normalize_poses(&mut poses, opts) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("{e}; keeping unnormalized transforms");
                None
            }
        },
        None => None,
    };

    let prefix = file_prefix(&options.image_dir, &options.output);
    let manifest =
        SceneManifest::from_poses(options.aabb_scale, &poses, &recon.cameras, &prefix)?;

    Ok((manifest, report))
}

/// Convert the reconstruction in `model_dir` and write the manifest
pub fn convert(model_dir: impl AsRef<Path>, options: &ConvertOptions) -> Result<ConvertSummary> {
    let model_dir = model_dir.as_ref();
    info!("converting {}", model_dir.display());

    let (manifest, normalization) = build_manifest(model_dir, options)?;
    write_manifest(&options.output, &manifest)?;

    Ok(ConvertSummary {
        frames: manifest.len(),
        output: options.output.clone(),
        normalization,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = ConvertOptions::new("scene");
        assert_eq!(opts.image_dir, Path::new("scene/images"));
        assert_eq!(opts.output, Path::new("scene/transforms.json"));
        assert_eq!(opts.aabb_scale, 16);
        assert_eq!(opts.focus, FocusPolicy::Strict);
        assert!(opts.normalize.is_none());
    }

    #[test]
    fn test_file_prefix_relative_to_manifest() {
        assert_eq!(
            file_prefix(Path::new("scene/images"), Path::new("scene/transforms.json")),
            Path::new("images")
        );
        assert_eq!(
            file_prefix(Path::new("/data/frames"), Path::new("/out/transforms.json")),
            Path::new("/data/frames")
        );
        assert_eq!(
            file_prefix(Path::new("images"), Path::new("transforms.json")),
            Path::new("images")
        );
    }

    #[test]
    fn test_file_prefix_normalizes_dot_segments() {
        assert_eq!(
            file_prefix(Path::new("./scene/images"), Path::new("scene/transforms.json")),
            Path::new("images")
        );
        assert_eq!(
            file_prefix(Path::new("scene/out/../images"), Path::new("scene/transforms.json")),
            Path::new("images")
        );
    }

    #[test]
    fn test_file_prefix_outside_manifest_dir() {
        // Resolved by the trainer as out/../frames
        assert_eq!(
            file_prefix(Path::new("frames"), Path::new("out/transforms.json")),
            Path::new("../frames")
        );
        assert_eq!(
            file_prefix(
                Path::new("/data/scene/frames"),
                Path::new("/data/scene/out/transforms.json")
            ),
            Path::new("../frames")
        );
    }

    #[test]
    fn test_file_prefix_same_dir() {
        assert_eq!(
            file_prefix(Path::new("scene"), Path::new("scene/transforms.json")),
            Path::new("")
        );
    }
}
